//! In-process [`RemoteAdapter`] used by tests and offline demos.
//!
//! Behaves like the document store, including the watermark side channel,
//! and lets callers flip connectivity or inject failures per record.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{RejectedDocument, RemoteAdapter, RemoteListing};
use crate::config::SyncScope;
use crate::error::{Error, Result};
use crate::models::{ClothingId, ClothingItem};
use crate::util::now;

#[derive(Debug, Default)]
struct ScopeState {
    records: BTreeMap<ClothingId, ClothingItem>,
    malformed: BTreeMap<String, String>,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    offline: bool,
    scopes: HashMap<String, ScopeState>,
    failing: HashSet<ClothingId>,
    rejecting: HashSet<ClothingId>,
    upserts: usize,
    deletes: usize,
}

/// Remote store held in memory.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate losing or regaining the network.
    pub fn set_online(&self, online: bool) {
        self.state().offline = !online;
    }

    /// Make every call touching `id` fail with a connectivity error.
    pub fn fail_record(&self, id: ClothingId) {
        self.state().failing.insert(id);
    }

    /// Make writes to `id` fail with a permanent rejection.
    pub fn reject_record(&self, id: ClothingId) {
        self.state().rejecting.insert(id);
    }

    /// Clear injected per-record failures.
    pub fn heal(&self) {
        let mut state = self.state();
        state.failing.clear();
        state.rejecting.clear();
    }

    /// Place a record directly, as another device would, without bumping counters.
    pub fn seed(&self, scope: &SyncScope, item: ClothingItem) {
        let mut state = self.state();
        let scope_state = state.scopes.entry(scope.to_string()).or_default();
        scope_state.last_updated = Some(item.edited_at);
        scope_state.records.insert(item.id, item);
    }

    /// Remove a record directly, as another device would.
    pub fn evict(&self, scope: &SyncScope, id: ClothingId) -> Option<ClothingItem> {
        self.state()
            .scopes
            .get_mut(scope.as_str())
            .and_then(|scope_state| scope_state.records.remove(&id))
    }

    /// Store a document that will not decode.
    pub fn seed_malformed(&self, scope: &SyncScope, id: &str, reason: &str) {
        self.state()
            .scopes
            .entry(scope.to_string())
            .or_default()
            .malformed
            .insert(id.to_string(), reason.to_string());
    }

    /// Current contents of a scope, for assertions.
    pub fn records(&self, scope: &SyncScope) -> BTreeMap<ClothingId, ClothingItem> {
        self.state()
            .scopes
            .get(scope.as_str())
            .map(|scope_state| scope_state.records.clone())
            .unwrap_or_default()
    }

    pub fn upsert_count(&self) -> usize {
        self.state().upserts
    }

    pub fn delete_count(&self) -> usize {
        self.state().deletes
    }
}

impl MemoryState {
    fn ensure_reachable(&self) -> Result<()> {
        if self.offline {
            return Err(Error::Connectivity("remote unreachable".to_string()));
        }
        Ok(())
    }

    fn ensure_record_ok(&self, id: ClothingId) -> Result<()> {
        self.ensure_reachable()?;
        if self.failing.contains(&id) {
            return Err(Error::Connectivity(format!("request for {id} timed out")));
        }
        Ok(())
    }

    fn ensure_writable(&self, id: ClothingId) -> Result<()> {
        self.ensure_record_ok(id)?;
        if self.rejecting.contains(&id) {
            return Err(Error::RemoteRejected {
                status: 403,
                message: format!("write to {id} denied"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteAdapter for MemoryRemote {
    async fn is_online(&self) -> bool {
        !self.state().offline
    }

    async fn fetch_all(&self, scope: &SyncScope) -> Result<RemoteListing> {
        let state = self.state();
        state.ensure_reachable()?;

        let Some(scope_state) = state.scopes.get(scope.as_str()) else {
            return Ok(RemoteListing::default());
        };
        Ok(RemoteListing {
            records: scope_state.records.values().cloned().collect(),
            rejected: scope_state
                .malformed
                .iter()
                .map(|(id, reason)| RejectedDocument {
                    id: id.clone(),
                    reason: reason.clone(),
                })
                .collect(),
        })
    }

    async fn get(&self, scope: &SyncScope, id: ClothingId) -> Result<ClothingItem> {
        let state = self.state();
        state.ensure_record_ok(id)?;
        state
            .scopes
            .get(scope.as_str())
            .and_then(|scope_state| scope_state.records.get(&id))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Remote record {id}")))
    }

    async fn upsert(&self, scope: &SyncScope, item: &ClothingItem) -> Result<()> {
        let mut state = self.state();
        state.ensure_writable(item.id)?;
        state.upserts += 1;

        let scope_state = state.scopes.entry(scope.to_string()).or_default();
        scope_state.records.insert(item.id, item.clone());
        scope_state.last_updated = Some(item.edited_at);
        Ok(())
    }

    async fn delete(&self, scope: &SyncScope, id: ClothingId) -> Result<bool> {
        let mut state = self.state();
        state.ensure_writable(id)?;
        state.deletes += 1;

        let Some(scope_state) = state.scopes.get_mut(scope.as_str()) else {
            return Ok(false);
        };
        let removed = scope_state.records.remove(&id).is_some();
        if removed {
            scope_state.last_updated = Some(now());
        }
        Ok(removed)
    }

    async fn last_updated(&self, scope: &SyncScope) -> Result<Option<DateTime<Utc>>> {
        let state = self.state();
        state.ensure_reachable()?;
        Ok(state
            .scopes
            .get(scope.as_str())
            .and_then(|scope_state| scope_state.last_updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> SyncScope {
        SyncScope::new("device-a").unwrap()
    }

    #[tokio::test]
    async fn upsert_then_get_returns_record() {
        let remote = MemoryRemote::new();
        let item = ClothingItem::new("Denim jacket");

        remote.upsert(&scope(), &item).await.unwrap();

        assert_eq!(remote.get(&scope(), item.id).await.unwrap(), item);
        assert_eq!(
            remote.last_updated(&scope()).await.unwrap(),
            Some(item.edited_at)
        );
        assert_eq!(remote.upsert_count(), 1);
    }

    #[tokio::test]
    async fn delete_reports_absence() {
        let remote = MemoryRemote::new();
        let item = ClothingItem::new("Scarf");
        remote.seed(&scope(), item.clone());

        assert!(remote.delete(&scope(), item.id).await.unwrap());
        assert!(!remote.delete(&scope(), item.id).await.unwrap());
        assert!(remote.get(&scope(), item.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn offline_calls_fail_with_connectivity() {
        let remote = MemoryRemote::new();
        remote.set_online(false);

        assert!(!remote.is_online().await);
        let error = remote.fetch_all(&scope()).await.unwrap_err();
        assert!(error.is_connectivity());
    }

    #[tokio::test]
    async fn injected_failures_are_per_record() {
        let remote = MemoryRemote::new();
        let flaky = ClothingItem::new("Flaky");
        let denied = ClothingItem::new("Denied");
        let fine = ClothingItem::new("Fine");
        remote.fail_record(flaky.id);
        remote.reject_record(denied.id);

        assert!(remote.upsert(&scope(), &flaky).await.unwrap_err().is_connectivity());
        assert!(remote.upsert(&scope(), &denied).await.unwrap_err().is_unrecoverable());
        remote.upsert(&scope(), &fine).await.unwrap();

        remote.heal();
        remote.upsert(&scope(), &flaky).await.unwrap();
        assert_eq!(remote.records(&scope()).len(), 2);
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let remote = MemoryRemote::new();
        let other = SyncScope::new("device-b").unwrap();
        remote.seed(&scope(), ClothingItem::new("Mine"));

        assert!(remote.fetch_all(&other).await.unwrap().records.is_empty());
        assert_eq!(remote.fetch_all(&scope()).await.unwrap().records.len(), 1);
    }

    #[tokio::test]
    async fn malformed_documents_are_listed_as_rejected() {
        let remote = MemoryRemote::new();
        remote.seed_malformed(&scope(), "bogus", "missing name");

        let listing = remote.fetch_all(&scope()).await.unwrap();
        assert!(listing.records.is_empty());
        assert_eq!(listing.rejected[0].id, "bogus");
    }
}
