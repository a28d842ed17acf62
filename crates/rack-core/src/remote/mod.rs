//! Remote document store boundary.
//!
//! Everything that talks to the network sits behind [`RemoteAdapter`].
//! Credential handling is private to the implementations.

mod credentials;
pub mod document;
mod firestore;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::SyncScope;
use crate::error::Result;
use crate::models::{ClothingId, ClothingItem};

pub use firestore::FirestoreRemote;
pub use memory::MemoryRemote;

/// A listed document that could not be mapped to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedDocument {
    pub id: String,
    pub reason: String,
}

/// Full listing of a scope, excluding the metadata sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteListing {
    pub records: Vec<ClothingItem>,
    /// Documents skipped because they could not be decoded
    pub rejected: Vec<RejectedDocument>,
}

/// Authenticated CRUD against the remote document store.
///
/// Errors follow one taxonomy: `Connectivity` for network trouble and
/// timeouts, `Auth` once the transparent credential retry is exhausted,
/// `NotFound` from [`RemoteAdapter::get`], and `RemoteRejected` for anything
/// the server refused.
#[async_trait]
pub trait RemoteAdapter: Send + Sync {
    /// Cheap reachability probe.
    async fn is_online(&self) -> bool;

    /// Every record in the scope.
    async fn fetch_all(&self, scope: &SyncScope) -> Result<RemoteListing>;

    /// One record, or `Error::NotFound`.
    async fn get(&self, scope: &SyncScope, id: ClothingId) -> Result<ClothingItem>;

    /// Create or fully replace a record, then bump the scope watermark.
    async fn upsert(&self, scope: &SyncScope, item: &ClothingItem) -> Result<()>;

    /// Delete a record and bump the watermark. `Ok(false)` when it was already gone.
    async fn delete(&self, scope: &SyncScope, id: ClothingId) -> Result<bool>;

    /// The scope's freshness stamp, if any write ever set it.
    async fn last_updated(&self, scope: &SyncScope) -> Result<Option<DateTime<Utc>>>;
}

/// A remote adapter bound to the scope it operates on.
#[derive(Clone)]
pub struct RemoteLink {
    pub adapter: Arc<dyn RemoteAdapter>,
    pub scope: SyncScope,
}

impl RemoteLink {
    pub fn new(adapter: Arc<dyn RemoteAdapter>, scope: SyncScope) -> Self {
        Self { adapter, scope }
    }
}

impl std::fmt::Debug for RemoteLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLink")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
