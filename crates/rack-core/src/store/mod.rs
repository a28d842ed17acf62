//! Local system of record for clothing items.
//!
//! Writes land in memory and in the durable backing store before any remote
//! call is made, so the local copy is always authoritative after a crash.
//! Remote failures never roll a local write back: connectivity errors queue
//! the id for a later drain, anything else is surfaced as an error notice.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::watch;

use crate::db::KeyValueStore;
use crate::error::{Error, Result};
use crate::models::{ClothingId, ClothingItem};
use crate::notice::Notifier;
use crate::remote::document::parse_timestamp;
use crate::remote::RemoteLink;
use crate::sync::pending::{PendingQueue, META_NAMESPACE};
use crate::util::now;

const RECORD_NAMESPACE: &str = "clothing";
const WATERMARK_KEY: &str = "last_edited";

pub(crate) const OFFLINE_NOTICE: &str =
    "No connection detected. Sync scheduled for when next connected.";

/// What happened to the remote side of a local write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// No remote call was requested or no remote is configured.
    LocalOnly,
    /// The remote accepted the write.
    Synced,
    /// The remote was unreachable and the id is queued for retry.
    Queued,
    /// The remote refused the write. The local copy is kept.
    Rejected(String),
}

/// In-memory items mirrored to a durable key-value store.
pub struct LocalStore {
    items: RwLock<HashMap<ClothingId, ClothingItem>>,
    watermark: RwLock<Option<DateTime<Utc>>>,
    backing: Arc<dyn KeyValueStore>,
    pending: PendingQueue,
    remote: Option<RemoteLink>,
    notifier: Notifier,
    revision: watch::Sender<u64>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

impl LocalStore {
    pub fn new(backing: Arc<dyn KeyValueStore>, notifier: Notifier) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            items: RwLock::new(HashMap::new()),
            watermark: RwLock::new(None),
            pending: PendingQueue::new(Arc::clone(&backing)),
            backing,
            remote: None,
            notifier,
            revision,
        }
    }

    /// Attach the remote that writes are pushed to.
    #[must_use]
    pub fn with_remote(mut self, remote: RemoteLink) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Restore items, watermark and pending ids from the backing store.
    ///
    /// Records that no longer deserialize are skipped with a warning.
    pub async fn load(&self) -> Result<usize> {
        let mut restored = HashMap::new();
        for (key, value) in self.backing.entries(RECORD_NAMESPACE).await? {
            match serde_json::from_str::<ClothingItem>(&value) {
                Ok(item) => {
                    restored.insert(item.id, item);
                }
                Err(error) => tracing::warn!("Skipping unreadable local record {key}: {error}"),
            }
        }

        let watermark = self
            .backing
            .get(META_NAMESPACE, WATERMARK_KEY)
            .await?
            .and_then(|raw| parse_timestamp(&raw));
        let pending = self.pending.load().await?;

        let count = restored.len();
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = restored;
        *self.watermark.write().unwrap_or_else(PoisonError::into_inner) = watermark;
        self.bump();

        tracing::info!("Loaded {count} local records ({pending} pending upload)");
        Ok(count)
    }

    /// Store a record, optionally pushing it to the remote.
    ///
    /// When `push_remote` is set the record is stamped with the current time
    /// first. Imports of records that already carry a trusted stamp pass
    /// `false` and keep theirs.
    pub async fn add_item(&self, mut item: ClothingItem, push_remote: bool) -> Result<WriteOutcome> {
        if push_remote {
            item.edited_at = now();
        }

        self.backing
            .put(
                RECORD_NAMESPACE,
                &item.id.to_string(),
                &serde_json::to_string(&item)?,
            )
            .await?;
        let stamp = item.edited_at;
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(item.id, item.clone());
        self.advance_watermark(stamp).await?;
        self.bump();
        tracing::debug!("Stored {} locally", item.id);

        let Some(remote) = self.remote.as_ref().filter(|_| push_remote) else {
            return Ok(WriteOutcome::LocalOnly);
        };
        let result = remote.adapter.upsert(&remote.scope, &item).await;
        self.settle(item.id, &item.name, result).await
    }

    /// Store a user edit without pushing it.
    ///
    /// The record is stamped like any other user mutation, so the edit wins
    /// the next reconcile against an older server copy.
    pub async fn commit_local_edit(&self, mut item: ClothingItem) -> Result<WriteOutcome> {
        item.edited_at = now();
        self.add_item(item, false).await
    }

    /// Remove a record, optionally deleting it remotely too.
    pub async fn remove_item(&self, id: ClothingId, delete_remote: bool) -> Result<WriteOutcome> {
        let Some(item) = self.get(id) else {
            return Err(Error::NotFound(format!("Record {id}")));
        };

        self.backing.remove(RECORD_NAMESPACE, &id.to_string()).await?;
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        self.bump();
        tracing::debug!("Removed {id} locally");

        let Some(remote) = self.remote.as_ref().filter(|_| delete_remote) else {
            return Ok(WriteOutcome::LocalOnly);
        };
        let result = remote.adapter.delete(&remote.scope, id).await.map(|_| ());
        self.settle(id, &item.name, result).await
    }

    async fn settle(&self, id: ClothingId, name: &str, result: Result<()>) -> Result<WriteOutcome> {
        match result {
            Ok(()) => {
                // The latest state is now remote, an older queued retry is moot.
                self.pending.remove(id).await?;
                Ok(WriteOutcome::Synced)
            }
            Err(error) if error.is_connectivity() => {
                tracing::debug!("Remote write for {id} deferred: {error}");
                self.pending.enqueue(id).await?;
                self.notifier.info(OFFLINE_NOTICE);
                Ok(WriteOutcome::Queued)
            }
            Err(error) => {
                self.notifier
                    .error(format!("Could not sync \"{name}\": {error}"));
                Ok(WriteOutcome::Rejected(error.to_string()))
            }
        }
    }

    async fn advance_watermark(&self, stamp: DateTime<Utc>) -> Result<()> {
        {
            let mut watermark = self.watermark.write().unwrap_or_else(PoisonError::into_inner);
            if watermark.is_some_and(|current| current >= stamp) {
                return Ok(());
            }
            *watermark = Some(stamp);
        }
        self.backing
            .put(
                META_NAMESPACE,
                WATERMARK_KEY,
                &stamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            )
            .await
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    pub fn get(&self, id: ClothingId) -> Option<ClothingItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// A point-in-time copy of every record.
    pub fn snapshot(&self) -> HashMap<ClothingId, ClothingItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All records, most recently edited first.
    pub fn list(&self) -> Vec<ClothingItem> {
        let mut items: Vec<ClothingItem> = self
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        items.sort_by(|a, b| b.edited_at.cmp(&a.edited_at).then(a.id.cmp(&b.id)));
        items
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Newest edit stamp ever committed locally.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        *self.watermark.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub const fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    pub const fn remote(&self) -> Option<&RemoteLink> {
        self.remote.as_ref()
    }

    pub const fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Observe changes. The value is a revision counter bumped on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
