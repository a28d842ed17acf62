use rack_core::LocalStore;

use crate::cli::ItemFields;
use crate::commands::common::{
    apply_fields, describe_outcome, normalize_name, resolve_item, save_edit,
};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    name: Option<&str>,
    fields: &ItemFields,
    local_only: bool,
    store: &LocalStore,
) -> Result<(), CliError> {
    let mut item = resolve_item(id, store)?;
    if let Some(name) = name {
        item.name = normalize_name(&[name.to_string()])?;
    }
    apply_fields(&mut item, fields)?;

    let id = item.id;
    let outcome = save_edit(item, local_only, store).await?;
    println!("{id} ({})", describe_outcome(&outcome));
    Ok(())
}
