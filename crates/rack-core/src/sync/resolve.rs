//! Applying a user's choice to one conflict.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{ClothingId, Conflict, ConflictMap, ConflictReason};
use crate::remote::RemoteLink;
use crate::store::LocalStore;

/// Direction chosen for a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Push the local copy to the remote.
    KeepLocal,
    /// Replace the local state with the remote one.
    KeepRemote,
    /// Remove a record that only exists remotely.
    DeleteFromServer,
}

impl Resolution {
    /// Choices that make sense for a conflict reason.
    #[must_use]
    pub const fn available_for(reason: ConflictReason) -> &'static [Self] {
        match reason {
            ConflictReason::ClientHasNewer
            | ConflictReason::ServerHasNewer
            | ConflictReason::MissingOnServer => &[Self::KeepLocal, Self::KeepRemote],
            ConflictReason::MissingOnClient => &[Self::KeepRemote, Self::DeleteFromServer],
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeepLocal => "keep-local",
            Self::KeepRemote => "keep-remote",
            Self::DeleteFromServer => "delete-remote",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keep-local" | "local" => Ok(Self::KeepLocal),
            "keep-remote" | "remote" => Ok(Self::KeepRemote),
            "delete-remote" | "delete" => Ok(Self::DeleteFromServer),
            other => Err(Error::InvalidInput(format!("Unknown resolution: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    conflict: Conflict,
    resolved: bool,
}

/// A caller's working copy of one reconciliation result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictSet {
    entries: BTreeMap<ClothingId, Entry>,
}

impl From<ConflictMap> for ConflictSet {
    fn from(conflicts: ConflictMap) -> Self {
        Self {
            entries: conflicts
                .into_iter()
                .map(|(id, conflict)| {
                    (
                        id,
                        Entry {
                            conflict,
                            resolved: false,
                        },
                    )
                })
                .collect(),
        }
    }
}

impl ConflictSet {
    pub fn get(&self, id: ClothingId) -> Option<&Conflict> {
        self.entries.get(&id).map(|entry| &entry.conflict)
    }

    pub fn is_resolved(&self, id: ClothingId) -> bool {
        self.entries.get(&id).is_some_and(|entry| entry.resolved)
    }

    /// Mark one entry settled. Returns false for unknown ids.
    pub fn mark_resolved(&mut self, id: ClothingId) -> bool {
        self.entries.get_mut(&id).is_some_and(|entry| {
            entry.resolved = true;
            true
        })
    }

    /// Conflicts still waiting for a decision.
    pub fn pending(&self) -> impl Iterator<Item = &Conflict> {
        self.entries
            .values()
            .filter(|entry| !entry.resolved)
            .map(|entry| &entry.conflict)
    }

    pub fn is_settled(&self) -> bool {
        self.entries.values().all(|entry| entry.resolved)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Applies resolutions against the store and the remote.
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    store: Arc<LocalStore>,
    remote: RemoteLink,
}

impl ConflictResolver {
    pub const fn new(store: Arc<LocalStore>, remote: RemoteLink) -> Self {
        Self { store, remote }
    }

    /// Apply one resolution. Never re-runs reconciliation.
    pub async fn resolve(&self, conflict: &Conflict, resolution: Resolution) -> Result<()> {
        let id = conflict.id();
        if !Resolution::available_for(conflict.reason()).contains(&resolution) {
            return Err(Error::InvalidInput(format!(
                "Cannot {resolution} for {id}: record is {}",
                conflict.reason()
            )));
        }

        match (resolution, conflict) {
            (Resolution::KeepLocal, _) => {
                let client = conflict
                    .client_copy()
                    .ok_or_else(|| Error::InvalidInput(format!("No local copy of {id}")))?;
                self.remote.adapter.upsert(&self.remote.scope, client).await?;
            }
            (Resolution::DeleteFromServer, _) => {
                if !self.remote.adapter.delete(&self.remote.scope, id).await? {
                    tracing::debug!("Remote record {id} was already gone");
                }
            }
            (Resolution::KeepRemote, Conflict::MissingOnServer { .. }) => {
                match self.store.remove_item(id, false).await {
                    Ok(_) => {}
                    Err(error) if error.is_not_found() => {}
                    Err(error) => return Err(error),
                }
            }
            (Resolution::KeepRemote, _) => {
                let server = conflict
                    .server_copy()
                    .ok_or_else(|| Error::InvalidInput(format!("No remote copy of {id}")))?;
                self.store.add_item(server.clone(), false).await?;
            }
        }

        // Whatever was queued for this id is superseded by the decision.
        self.store.pending().remove(id).await?;
        tracing::info!("Resolved {id} ({}) with {resolution}", conflict.reason());
        Ok(())
    }

    /// Resolve the entry for `id` in a working set and mark it settled.
    pub async fn resolve_in(
        &self,
        set: &mut ConflictSet,
        id: ClothingId,
        resolution: Resolution,
    ) -> Result<()> {
        let conflict = set
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Conflict for {id}")))?;
        if set.is_resolved(id) {
            return Err(Error::InvalidInput(format!("Conflict for {id} already resolved")));
        }

        self.resolve(&conflict, resolution).await?;
        set.mark_resolved(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncScope;
    use crate::db::LibSqlKeyValueStore;
    use crate::models::ClothingItem;
    use crate::notice::Notifier;
    use crate::remote::{MemoryRemote, RemoteAdapter};
    use crate::sync::reconcile::diff;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    struct Fixture {
        store: Arc<LocalStore>,
        remote: Arc<MemoryRemote>,
        resolver: ConflictResolver,
    }

    fn scope() -> SyncScope {
        SyncScope::new("closet").unwrap()
    }

    async fn fixture() -> Fixture {
        let remote = Arc::new(MemoryRemote::new());
        let link = RemoteLink::new(remote.clone(), scope());
        let backing = Arc::new(LibSqlKeyValueStore::open_in_memory().await.unwrap());
        let store = Arc::new(LocalStore::new(backing, Notifier::new()).with_remote(link.clone()));
        Fixture {
            resolver: ConflictResolver::new(Arc::clone(&store), link),
            store,
            remote,
        }
    }

    #[test]
    fn resolution_parses_cli_spellings() {
        assert_eq!("keep-local".parse::<Resolution>().unwrap(), Resolution::KeepLocal);
        assert_eq!("Remote".parse::<Resolution>().unwrap(), Resolution::KeepRemote);
        assert_eq!(
            "delete-remote".parse::<Resolution>().unwrap(),
            Resolution::DeleteFromServer
        );
        assert!("merge".parse::<Resolution>().is_err());
    }

    #[test]
    fn delete_is_only_offered_for_remote_only_records() {
        assert!(!Resolution::available_for(ConflictReason::ServerHasNewer)
            .contains(&Resolution::DeleteFromServer));
        assert!(!Resolution::available_for(ConflictReason::MissingOnClient)
            .contains(&Resolution::KeepLocal));
    }

    #[tokio::test]
    async fn keep_local_uploads_client_copy() {
        let fx = fixture().await;
        let client = ClothingItem::new("Blazer");
        let mut server = client.clone();
        server.edited_at -= Duration::minutes(5);
        let conflict = Conflict::ClientHasNewer {
            client: client.clone(),
            server,
        };

        fx.resolver.resolve(&conflict, Resolution::KeepLocal).await.unwrap();

        assert_eq!(fx.remote.get(&scope(), client.id).await.unwrap(), client);
    }

    #[tokio::test]
    async fn keep_remote_imports_server_copy_with_its_stamp() {
        let fx = fixture().await;
        let client = ClothingItem::new("Hoodie");
        fx.store.add_item(client.clone(), false).await.unwrap();
        let mut server = client.clone();
        server.edited_at += Duration::minutes(5);
        server.image_url = Some("https://images.example/hoodie.jpg".to_string());
        let conflict = Conflict::ServerHasNewer {
            client,
            server: server.clone(),
        };

        fx.resolver.resolve(&conflict, Resolution::KeepRemote).await.unwrap();

        assert_eq!(fx.store.get(server.id).unwrap(), server);
        assert_eq!(fx.remote.upsert_count(), 0);
    }

    #[tokio::test]
    async fn keep_local_is_invalid_for_remote_only_record() {
        let fx = fixture().await;
        let conflict = Conflict::MissingOnClient {
            server: ClothingItem::new("Stray"),
        };

        let error = fx
            .resolver
            .resolve(&conflict, Resolution::KeepLocal)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn failed_resolution_leaves_entry_pending() {
        let fx = fixture().await;
        let client = ClothingItem::new("Vest");
        fx.store.add_item(client.clone(), false).await.unwrap();
        fx.remote.set_online(false);
        let mut set = ConflictSet::from(diff(&fx.store.snapshot(), Vec::new()));

        let result = fx
            .resolver
            .resolve_in(&mut set, client.id, Resolution::KeepLocal)
            .await;

        assert!(result.unwrap_err().is_connectivity());
        assert!(!set.is_resolved(client.id));
        assert_eq!(set.pending().count(), 1);
    }

    #[tokio::test]
    async fn resolve_in_marks_only_that_entry() {
        let fx = fixture().await;
        let first = ClothingItem::new("First");
        let second = ClothingItem::new("Second");
        fx.store.add_item(first.clone(), false).await.unwrap();
        fx.store.add_item(second.clone(), false).await.unwrap();
        let mut set = ConflictSet::from(diff(&fx.store.snapshot(), Vec::new()));

        fx.resolver
            .resolve_in(&mut set, first.id, Resolution::KeepLocal)
            .await
            .unwrap();

        assert!(set.is_resolved(first.id));
        assert!(!set.is_resolved(second.id));
        assert!(!set.is_settled());

        let again = fx
            .resolver
            .resolve_in(&mut set, first.id, Resolution::KeepLocal)
            .await;
        assert!(again.is_err());
    }
}
