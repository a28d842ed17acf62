//! Durable queue of record ids whose remote write is still owed.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::KeyValueStore;
use crate::error::Result;
use crate::models::ClothingId;

pub(crate) const META_NAMESPACE: &str = "meta";
const PENDING_KEY: &str = "pending_upload";

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub completed: Vec<ClothingId>,
    pub remaining: Vec<ClothingId>,
    /// Another drain was already running, nothing was attempted.
    pub skipped: bool,
}

impl DrainReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.skipped && self.remaining.is_empty()
    }
}

/// Ordered, duplicate-free list of pending ids, persisted on every change.
pub struct PendingQueue {
    backing: Arc<dyn KeyValueStore>,
    ids: Mutex<Vec<ClothingId>>,
    /// Bumped on every enqueue, so a drain can tell that a newer write
    /// arrived while the retry for an id was in flight.
    generations: Mutex<HashMap<ClothingId, u64>>,
    drain_gate: Mutex<()>,
}

impl std::fmt::Debug for PendingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingQueue").finish_non_exhaustive()
    }
}

impl PendingQueue {
    pub fn new(backing: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backing,
            ids: Mutex::new(Vec::new()),
            generations: Mutex::new(HashMap::new()),
            drain_gate: Mutex::new(()),
        }
    }

    /// Restore the persisted list. Unparseable ids are dropped with a warning.
    pub async fn load(&self) -> Result<usize> {
        let raw = self.backing.get(META_NAMESPACE, PENDING_KEY).await?;
        let stored: Vec<String> = match raw {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };

        let mut restored = Vec::with_capacity(stored.len());
        for value in stored {
            match value.parse::<ClothingId>() {
                Ok(id) if !restored.contains(&id) => restored.push(id),
                Ok(_) => {}
                Err(error) => tracing::warn!("Dropping invalid pending id {value:?}: {error}"),
            }
        }

        let count = restored.len();
        *self.ids.lock().await = restored;
        Ok(count)
    }

    /// Queue an id. Returns false if it was already queued.
    pub async fn enqueue(&self, id: ClothingId) -> Result<bool> {
        let mut ids = self.ids.lock().await;
        *self.generations.lock().await.entry(id).or_default() += 1;
        if ids.contains(&id) {
            return Ok(false);
        }
        ids.push(id);
        self.persist(&ids).await?;
        tracing::debug!("Queued {id} for upload ({} pending)", ids.len());
        Ok(true)
    }

    /// Drop an id without retrying it.
    pub async fn remove(&self, id: ClothingId) -> Result<bool> {
        let mut ids = self.ids.lock().await;
        let before = ids.len();
        ids.retain(|queued| *queued != id);
        if ids.len() == before {
            return Ok(false);
        }
        self.generations.lock().await.remove(&id);
        self.persist(&ids).await?;
        Ok(true)
    }

    async fn generation(&self, id: ClothingId) -> u64 {
        self.generations.lock().await.get(&id).copied().unwrap_or_default()
    }

    /// Remove an id unless it was queued again after `seen` was read.
    async fn remove_settled(&self, id: ClothingId, seen: u64) -> Result<bool> {
        let mut ids = self.ids.lock().await;
        let mut generations = self.generations.lock().await;
        if generations.get(&id).copied().unwrap_or_default() != seen {
            return Ok(false);
        }
        generations.remove(&id);
        drop(generations);

        ids.retain(|queued| *queued != id);
        self.persist(&ids).await?;
        Ok(true)
    }

    pub async fn ids(&self) -> Vec<ClothingId> {
        self.ids.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.ids.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ids.lock().await.is_empty()
    }

    pub async fn contains(&self, id: ClothingId) -> bool {
        self.ids.lock().await.contains(&id)
    }

    /// Retry every queued id in order.
    ///
    /// An id leaves the queue only when its own retry returns `Ok(true)` and
    /// it was not queued again while that retry ran. Failures are logged and
    /// the id stays for the next drain. A drain that starts while another is
    /// running does nothing.
    pub async fn drain<F, Fut>(&self, mut retry: F) -> Result<DrainReport>
    where
        F: FnMut(ClothingId) -> Fut + Send,
        Fut: Future<Output = Result<bool>> + Send,
    {
        let Ok(_gate) = self.drain_gate.try_lock() else {
            tracing::debug!("Drain already in progress, skipping");
            return Ok(DrainReport {
                skipped: true,
                ..DrainReport::default()
            });
        };

        let queued = self.ids().await;
        let mut report = DrainReport::default();

        for id in queued {
            let seen = self.generation(id).await;
            match retry(id).await {
                Ok(true) => {
                    if self.remove_settled(id, seen).await? {
                        report.completed.push(id);
                    } else {
                        tracing::debug!("{id} was queued again during its retry, keeping it");
                        report.remaining.push(id);
                    }
                }
                Ok(false) => {
                    tracing::warn!("Retry for {id} did not complete, keeping it queued");
                    report.remaining.push(id);
                }
                Err(error) => {
                    tracing::warn!("Retry for {id} failed: {error}");
                    report.remaining.push(id);
                }
            }
        }

        if !report.completed.is_empty() {
            tracing::info!(
                "Drained {} pending writes, {} remain",
                report.completed.len(),
                report.remaining.len()
            );
        }
        Ok(report)
    }

    async fn persist(&self, ids: &[ClothingId]) -> Result<()> {
        let encoded: Vec<String> = ids.iter().map(ToString::to_string).collect();
        self.backing
            .put(META_NAMESPACE, PENDING_KEY, &serde_json::to_string(&encoded)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LibSqlKeyValueStore;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    async fn backing() -> Arc<dyn KeyValueStore> {
        Arc::new(LibSqlKeyValueStore::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn enqueue_is_idempotent() {
        let queue = PendingQueue::new(backing().await);
        let id = ClothingId::new();

        assert!(queue.enqueue(id).await.unwrap());
        assert!(!queue.enqueue(id).await.unwrap());
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn queue_survives_reload() {
        let backing = backing().await;
        let first = ClothingId::new();
        let second = ClothingId::new();
        {
            let queue = PendingQueue::new(Arc::clone(&backing));
            queue.enqueue(first).await.unwrap();
            queue.enqueue(second).await.unwrap();
        }

        let reloaded = PendingQueue::new(backing);
        assert_eq!(reloaded.load().await.unwrap(), 2);
        assert_eq!(reloaded.ids().await, vec![first, second]);
    }

    #[tokio::test]
    async fn drain_keeps_only_failed_ids() {
        let queue = PendingQueue::new(backing().await);
        let ids = [ClothingId::new(), ClothingId::new(), ClothingId::new()];
        for id in ids {
            queue.enqueue(id).await.unwrap();
        }

        let failing = ids[1];
        let report = queue
            .drain(|id| async move {
                if id == failing {
                    Err(Error::Connectivity("still offline".to_string()))
                } else {
                    Ok(true)
                }
            })
            .await
            .unwrap();

        assert_eq!(report.completed, vec![ids[0], ids[2]]);
        assert_eq!(report.remaining, vec![failing]);
        assert_eq!(queue.ids().await, vec![failing]);
    }

    #[tokio::test]
    async fn unsuccessful_retry_stays_queued() {
        let queue = PendingQueue::new(backing().await);
        let id = ClothingId::new();
        queue.enqueue(id).await.unwrap();

        let report = queue.drain(|_| async { Ok(false) }).await.unwrap();

        assert!(!report.is_clean());
        assert!(queue.contains(id).await);
    }

    #[tokio::test]
    async fn requeue_during_retry_keeps_the_id() {
        let queue = PendingQueue::new(backing().await);
        let id = ClothingId::new();
        queue.enqueue(id).await.unwrap();

        let report = queue
            .drain(|id| {
                let queue = &queue;
                async move {
                    // A newer edit failed offline while the older copy was uploading.
                    assert!(!queue.enqueue(id).await?);
                    Ok(true)
                }
            })
            .await
            .unwrap();

        assert!(report.completed.is_empty());
        assert_eq!(report.remaining, vec![id]);
        assert_eq!(queue.ids().await, vec![id]);

        let report = queue.drain(|_| async { Ok(true) }).await.unwrap();
        assert_eq!(report.completed, vec![id]);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn drained_state_is_persisted() {
        let backing = backing().await;
        let queue = PendingQueue::new(Arc::clone(&backing));
        queue.enqueue(ClothingId::new()).await.unwrap();

        queue.drain(|_| async { Ok(true) }).await.unwrap();

        let reloaded = PendingQueue::new(backing);
        assert_eq!(reloaded.load().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn invalid_persisted_ids_are_dropped() {
        let backing = backing().await;
        let id = ClothingId::new();
        backing
            .put(
                META_NAMESPACE,
                PENDING_KEY,
                &format!(r#"["not-a-uuid","{id}","{id}"]"#),
            )
            .await
            .unwrap();

        let queue = PendingQueue::new(backing);
        assert_eq!(queue.load().await.unwrap(), 1);
        assert_eq!(queue.ids().await, vec![id]);
    }
}
