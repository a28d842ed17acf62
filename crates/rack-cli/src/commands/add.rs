use rack_core::{ClothingItem, LocalStore};

use crate::cli::ItemFields;
use crate::commands::common::{apply_fields, describe_outcome, normalize_name, save_edit};
use crate::error::CliError;

pub async fn run_add(
    name_parts: &[String],
    fields: &ItemFields,
    local_only: bool,
    store: &LocalStore,
) -> Result<ClothingItem, CliError> {
    let mut item = ClothingItem::new(normalize_name(name_parts)?);
    apply_fields(&mut item, fields)?;

    let outcome = save_edit(item.clone(), local_only, store).await?;
    println!("{} ({})", item.id, describe_outcome(&outcome));
    Ok(store.get(item.id).unwrap_or(item))
}
