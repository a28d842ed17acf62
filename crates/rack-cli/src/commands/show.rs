use rack_core::LocalStore;

use crate::commands::common::{format_item_details, resolve_item};
use crate::error::CliError;

pub fn run_show(id: &str, as_json: bool, store: &LocalStore) -> Result<(), CliError> {
    let item = resolve_item(id, store)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        for line in format_item_details(&item) {
            println!("{line}");
        }
    }
    Ok(())
}
