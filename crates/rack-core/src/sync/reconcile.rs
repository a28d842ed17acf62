//! Full-listing diff between local and remote state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{ClothingId, ClothingItem, Conflict, ConflictMap};
use crate::remote::{RejectedDocument, RemoteLink};
use crate::store::LocalStore;

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub conflicts: ConflictMap,
    /// Remote documents that could not be decoded and were left out.
    pub skipped: Vec<RejectedDocument>,
    /// The remote was unreachable; `conflicts` is empty, not "all clear".
    pub offline: bool,
}

impl ReconcileReport {
    fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_in_sync(&self) -> bool {
        !self.offline && self.conflicts.is_empty()
    }
}

/// Compare a local snapshot with a remote listing.
///
/// Records whose edit stamps are equal produce no entry.
pub fn diff(local: &HashMap<ClothingId, ClothingItem>, remote: Vec<ClothingItem>) -> ConflictMap {
    let mut unmatched = local.clone();
    let mut conflicts = ConflictMap::new();

    for server in remote {
        let Some(client) = unmatched.remove(&server.id) else {
            conflicts.insert(server.id, Conflict::MissingOnClient { server });
            continue;
        };

        if client.edited_at > server.edited_at {
            conflicts.insert(client.id, Conflict::ClientHasNewer { client, server });
        } else if client.edited_at < server.edited_at {
            conflicts.insert(client.id, Conflict::ServerHasNewer { client, server });
        }
    }

    for (id, client) in unmatched {
        conflicts.insert(id, Conflict::MissingOnServer { client });
    }

    conflicts
}

/// Runs reconciliation passes one at a time against a linked store.
#[derive(Debug)]
pub struct Reconciler {
    store: Arc<LocalStore>,
    remote: RemoteLink,
    pass: Mutex<()>,
}

impl Reconciler {
    pub fn new(store: Arc<LocalStore>, remote: RemoteLink) -> Self {
        Self {
            store,
            remote,
            pass: Mutex::new(()),
        }
    }

    /// Diff the store against a full remote listing.
    ///
    /// An unreachable remote yields an empty, `offline` report rather than a
    /// partial diff. Auth and rejection errors are returned.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let _pass = self.pass.lock().await;

        if !self.remote.adapter.is_online().await {
            tracing::info!("Remote unreachable, skipping reconciliation");
            return Ok(ReconcileReport::offline());
        }

        let listing = match self.remote.adapter.fetch_all(&self.remote.scope).await {
            Ok(listing) => listing,
            Err(error) if error.is_connectivity() => {
                tracing::info!("Listing failed, reporting nothing: {error}");
                return Ok(ReconcileReport::offline());
            }
            Err(error) => return Err(error),
        };

        let mut local = self.store.snapshot();
        for rejected in &listing.rejected {
            // The server holds something under this id; neither side can be judged.
            if let Ok(id) = rejected.id.parse::<ClothingId>() {
                local.remove(&id);
            }
        }
        let conflicts = diff(&local, listing.records);
        tracing::info!(
            "Reconciled {} local records: {} conflicts, {} skipped documents",
            local.len(),
            conflicts.len(),
            listing.rejected.len()
        );

        Ok(ReconcileReport {
            conflicts,
            skipped: listing.rejected,
            offline: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConflictReason;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn local_map(items: &[ClothingItem]) -> HashMap<ClothingId, ClothingItem> {
        items.iter().map(|item| (item.id, item.clone())).collect()
    }

    #[test]
    fn equal_stamps_are_in_sync() {
        let item = ClothingItem::new("Tee");
        assert!(diff(&local_map(&[item.clone()]), vec![item]).is_empty());
    }

    #[test]
    fn newer_side_wins_the_reason() {
        let local = ClothingItem::new("Tee");
        let mut remote = local.clone();
        remote.edited_at += Duration::seconds(5);

        let conflicts = diff(&local_map(&[local.clone()]), vec![remote.clone()]);
        assert_eq!(conflicts[&local.id].reason(), ConflictReason::ServerHasNewer);

        remote.edited_at -= Duration::seconds(10);
        let conflicts = diff(&local_map(&[local.clone()]), vec![remote]);
        assert_eq!(conflicts[&local.id].reason(), ConflictReason::ClientHasNewer);
    }

    #[test]
    fn one_sided_records_are_missing_on_the_other_side() {
        let only_local = ClothingItem::new("Local");
        let only_remote = ClothingItem::new("Remote");

        let conflicts = diff(&local_map(&[only_local.clone()]), vec![only_remote.clone()]);

        assert_eq!(conflicts.len(), 2);
        assert_eq!(
            conflicts[&only_local.id].reason(),
            ConflictReason::MissingOnServer
        );
        assert_eq!(
            conflicts[&only_remote.id].reason(),
            ConflictReason::MissingOnClient
        );
    }

    #[test]
    fn conflict_keeps_both_copies() {
        let local = ClothingItem::new("Tee");
        let mut remote = local.clone();
        remote.name = "Tee (edited elsewhere)".to_string();
        remote.edited_at += Duration::milliseconds(1);

        let conflicts = diff(&local_map(&[local.clone()]), vec![remote.clone()]);

        let conflict = &conflicts[&local.id];
        assert_eq!(conflict.client_copy(), Some(&local));
        assert_eq!(conflict.server_copy(), Some(&remote));
    }

    #[test]
    fn empty_sides_produce_nothing() {
        assert!(diff(&HashMap::new(), Vec::new()).is_empty());
    }
}
