use rack_core::{ClothingId, LocalStore};

use crate::commands::common::{describe_outcome, resolve_item, save_edit};
use crate::error::CliError;

pub async fn run_duplicate(
    id: &str,
    local_only: bool,
    store: &LocalStore,
) -> Result<ClothingId, CliError> {
    let copy = resolve_item(id, store)?.with_new_id();
    let copy_id = copy.id;

    let outcome = save_edit(copy, local_only, store).await?;
    println!("{copy_id} ({})", describe_outcome(&outcome));
    Ok(copy_id)
}
