//! Wiring of store, queue, reconciler and resolver into sync triggers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use super::pending::DrainReport;
use super::reconcile::{ReconcileReport, Reconciler};
use super::resolve::ConflictResolver;
use crate::error::{Error, Result};
use crate::models::ClothingId;
use crate::notice::SyncState;
use crate::remote::RemoteLink;
use crate::store::{LocalStore, OFFLINE_NOTICE};

/// Outcome of a manual sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub drained: DrainReport,
    pub reconciled: ReconcileReport,
}

/// Drives queue drains and reconciliation for one linked store.
///
/// Drains run after load, on an offline to online transition, and as the
/// first half of a manual sync.
#[derive(Debug)]
pub struct SyncSession {
    store: Arc<LocalStore>,
    remote: RemoteLink,
    reconciler: Reconciler,
    resolver: ConflictResolver,
    online: AtomicBool,
    state: watch::Sender<SyncState>,
}

impl SyncSession {
    /// Build a session for a store that has a remote attached.
    pub fn new(store: Arc<LocalStore>) -> Result<Self> {
        let remote = store
            .remote()
            .cloned()
            .ok_or_else(|| Error::InvalidInput("Store has no remote configured".to_string()))?;
        let (state, _) = watch::channel(SyncState::Offline);

        Ok(Self {
            reconciler: Reconciler::new(Arc::clone(&store), remote.clone()),
            resolver: ConflictResolver::new(Arc::clone(&store), remote.clone()),
            store,
            remote,
            online: AtomicBool::new(false),
            state,
        })
    }

    pub const fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub const fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: SyncState) {
        self.state.send_replace(state);
    }

    /// Restore local state, then retry whatever was left pending.
    pub async fn start(&self) -> Result<DrainReport> {
        self.store.load().await?;
        let online = self.remote.adapter.is_online().await;
        self.online.store(online, Ordering::SeqCst);
        self.set_state(if online { SyncState::Synced } else { SyncState::Offline });
        self.drain_pending().await
    }

    /// React to a connectivity event. Drains only when coming back online.
    pub async fn on_connectivity_change(&self, online: bool) -> Result<Option<DrainReport>> {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if !online {
            self.set_state(SyncState::Offline);
            return Ok(None);
        }
        if was_online {
            return Ok(None);
        }

        tracing::info!("Connection restored, retrying pending writes");
        self.set_state(SyncState::Synced);
        self.drain_pending().await.map(Some)
    }

    /// Retry every pending write, one id at a time.
    pub async fn drain_pending(&self) -> Result<DrainReport> {
        let pending = self.store.pending();
        if pending.is_empty().await {
            return Ok(DrainReport::default());
        }
        if !self.remote.adapter.is_online().await {
            tracing::debug!("Still offline, leaving pending writes queued");
            return Ok(DrainReport {
                remaining: pending.ids().await,
                ..DrainReport::default()
            });
        }

        let report = pending.drain(|id| self.retry(id)).await?;
        if !report.completed.is_empty() {
            self.store.notifier().success(format!(
                "Uploaded {} change(s) made while offline",
                report.completed.len()
            ));
        }
        Ok(report)
    }

    /// Bring the remote in line with the local state of one record.
    async fn retry(&self, id: ClothingId) -> Result<bool> {
        let adapter = &self.remote.adapter;
        let scope = &self.remote.scope;

        let Some(local) = self.store.get(id) else {
            adapter.delete(scope, id).await?;
            return Ok(true);
        };

        match adapter.get(scope, id).await {
            Ok(remote) if remote.edited_at >= local.edited_at => {
                // Left for reconciliation to surface.
                tracing::debug!("Remote copy of {id} is not older, nothing to upload");
            }
            Ok(_) => adapter.upsert(scope, &local).await?,
            Err(error) if error.is_not_found() => adapter.upsert(scope, &local).await?,
            Err(error) => return Err(error),
        }
        Ok(true)
    }

    /// A reconciliation pass on its own, without draining first.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        self.reconciler.reconcile().await
    }

    /// Drain the queue, then diff against a full remote listing.
    pub async fn sync_now(&self) -> Result<SyncReport> {
        self.set_state(SyncState::Syncing);
        self.store.notifier().info("Syncing inventory...");

        let drained = match self.drain_pending().await {
            Ok(report) => report,
            Err(error) => return Err(self.fail(error)),
        };
        let reconciled = match self.reconciler.reconcile().await {
            Ok(report) => report,
            Err(error) => return Err(self.fail(error)),
        };

        let notifier = self.store.notifier();
        if reconciled.offline {
            self.online.store(false, Ordering::SeqCst);
            self.set_state(SyncState::Offline);
            notifier.info(OFFLINE_NOTICE);
        } else if reconciled.conflicts.is_empty() {
            self.online.store(true, Ordering::SeqCst);
            self.set_state(SyncState::Synced);
            notifier.success("Inventory is in sync");
        } else {
            self.online.store(true, Ordering::SeqCst);
            self.set_state(SyncState::Conflicts);
            notifier.info(format!(
                "{} record(s) differ from the server",
                reconciled.conflicts.len()
            ));
        }
        if !reconciled.skipped.is_empty() {
            notifier.warning(format!(
                "Skipped {} unreadable record(s) on the server",
                reconciled.skipped.len()
            ));
        }

        Ok(SyncReport {
            drained,
            reconciled,
        })
    }

    fn fail(&self, error: Error) -> Error {
        self.set_state(SyncState::Error);
        self.store
            .notifier()
            .error(format!("Sync failed: {error}"));
        error
    }
}
