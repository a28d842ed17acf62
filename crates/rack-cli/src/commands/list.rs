use rack_core::LocalStore;

use crate::commands::common::{format_item_lines, item_to_list_item, ItemListItem};
use crate::error::CliError;

pub fn run_list(limit: usize, as_json: bool, store: &LocalStore) -> Result<(), CliError> {
    let items = store.list().into_iter().take(limit).collect::<Vec<_>>();

    if as_json {
        let json_items = items
            .iter()
            .map(item_to_list_item)
            .collect::<Vec<ItemListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if items.is_empty() {
        println!("No items yet.");
    } else {
        for line in format_item_lines(&items) {
            println!("{line}");
        }
    }

    Ok(())
}
