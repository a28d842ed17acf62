use rack_core::{ClothingId, LocalStore};

use crate::commands::common::{describe_outcome, resolve_item};
use crate::error::CliError;

pub async fn run_remove(
    id: &str,
    local_only: bool,
    store: &LocalStore,
) -> Result<ClothingId, CliError> {
    let item = resolve_item(id, store)?;

    let outcome = store.remove_item(item.id, !local_only).await?;
    println!("{} ({})", item.id, describe_outcome(&outcome));
    Ok(item.id)
}
