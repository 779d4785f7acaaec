//! The dispatch worker (§4.7): drains the notifier's events through a
//! bounded drop-oldest queue and drives the remote-API client's three sync
//! modes.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use ses_remote::{ConversationProviderClient, SyncMode};

use crate::notifier::Notifier;

const QUEUE_CAPACITY: usize = 5;
const DRAIN_TICK: Duration = Duration::from_secs(5 * 60);
/// The "second subscription-less periodic fallback" (§4.7) — guarantees
/// progress even if the notifier never fires. Same cadence as the drain
/// tick; redundant by design, not a bug (both calls are idempotent at the
/// store layer).
const FALLBACK_TICK: Duration = Duration::from_secs(5 * 60);

/// Capacity-5, drop-oldest queue of pending uuid sets (§4.7, §8 property 9).
struct BoundedQueue {
    items: Mutex<VecDeque<HashSet<String>>>,
}

impl BoundedQueue {
    fn new() -> Self {
        Self { items: Mutex::new(VecDeque::with_capacity(QUEUE_CAPACITY)) }
    }

    async fn push(&self, uuids: HashSet<String>) {
        let mut items = self.items.lock().await;
        if items.len() >= QUEUE_CAPACITY {
            items.pop_front();
        }
        items.push_back(uuids);
    }

    async fn drain_merged(&self) -> HashSet<String> {
        let mut items = self.items.lock().await;
        let mut merged = HashSet::new();
        for set in items.drain(..) {
            merged.extend(set.into_iter().map(|u| u.to_ascii_lowercase()));
        }
        merged
    }

    async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

pub struct DispatchWorker {
    client: Arc<ConversationProviderClient>,
    pool: SqlitePool,
    notifier: Notifier,
}

impl DispatchWorker {
    pub fn new(client: Arc<ConversationProviderClient>, pool: SqlitePool, notifier: Notifier) -> Self {
        Self { client, pool, notifier }
    }

    /// Run the worker until `shutdown` fires. Spawns the independent
    /// fallback loop alongside the main event-drain loop.
    pub async fn run(self, shutdown: tokio::sync::watch::Receiver<bool>) {
        let queue = Arc::new(BoundedQueue::new());
        let notify = Arc::new(tokio::sync::Notify::new());

        let mut subscriber = self.notifier.subscribe();
        let collector_queue = queue.clone();
        let collector_notify = notify.clone();
        let mut collector_shutdown = shutdown.clone();
        let collector = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = collector_shutdown.changed() => {
                        if *collector_shutdown.borrow() {
                            break;
                        }
                    }
                    event = subscriber.recv() => {
                        match event {
                            Ok(event) => {
                                collector_queue.push(event.uuids).await;
                                collector_notify.notify_one();
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });

        let fallback_client = self.client.clone();
        let fallback_pool = self.pool.clone();
        let mut fallback_shutdown = shutdown.clone();
        let fallback = tokio::spawn(async move {
            let mut tick = tokio::time::interval(FALLBACK_TICK);
            tick.tick().await; // the main loop already runs an initial bulk pass
            loop {
                tokio::select! {
                    _ = fallback_shutdown.changed() => {
                        if *fallback_shutdown.borrow() {
                            break;
                        }
                    }
                    _ = tick.tick() => {
                        run_sync(&fallback_client, &fallback_pool, SyncMode::incremental_default()).await;
                    }
                }
            }
        });

        // First pass after process start always calls bulk-sync (§4.7).
        run_sync(&self.client, &self.pool, SyncMode::Bulk).await;

        let mut drain_tick = tokio::time::interval(DRAIN_TICK);
        drain_tick.tick().await; // consume the immediate first tick
        let mut main_shutdown = shutdown;

        loop {
            tokio::select! {
                _ = main_shutdown.changed() => {
                    if *main_shutdown.borrow() {
                        break;
                    }
                }
                _ = drain_tick.tick() => {
                    self.drain_and_sync(&queue).await;
                }
                _ = notify.notified() => {
                    if !queue.is_empty().await {
                        self.drain_and_sync(&queue).await;
                    }
                }
            }
        }

        let _ = collector.await;
        let _ = fallback.await;
    }

    async fn drain_and_sync(&self, queue: &BoundedQueue) {
        let merged = queue.drain_merged().await;
        if merged.is_empty() {
            run_sync(&self.client, &self.pool, SyncMode::incremental_default()).await;
        } else {
            debug!(count = merged.len(), "dispatching targeted sync");
            run_sync(&self.client, &self.pool, SyncMode::Targeted(merged)).await;
        }
    }
}

async fn run_sync(client: &ConversationProviderClient, pool: &SqlitePool, mode: SyncMode) {
    match client.sync(pool, mode).await {
        Ok(n) if n > 0 => info!(synced = n, "dispatch sync complete"),
        Ok(_) => {}
        Err(e) => warn!("dispatch sync failed (non-fatal): {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_queue_drop_oldest_keeps_only_the_five_most_recent() {
        let queue = BoundedQueue::new();
        for i in 0..8 {
            queue.push(HashSet::from([format!("uuid-{i}")])).await;
        }
        let merged = queue.drain_merged().await;
        assert_eq!(merged.len(), 5);
        for i in 3..8 {
            assert!(merged.contains(&format!("uuid-{i}")), "expected uuid-{i} to survive eviction");
        }
    }

    #[tokio::test]
    async fn drain_merged_lowercases_and_dedupes_case_insensitively() {
        let queue = BoundedQueue::new();
        queue.push(HashSet::from(["ABC".to_string()])).await;
        queue.push(HashSet::from(["abc".to_string(), "def".to_string()])).await;
        let merged = queue.drain_merged().await;
        assert_eq!(merged.len(), 2);
        assert!(merged.contains("abc"));
        assert!(merged.contains("def"));
    }

    #[tokio::test]
    async fn drain_merged_empties_the_queue() {
        let queue = BoundedQueue::new();
        queue.push(HashSet::from(["x".to_string()])).await;
        let _ = queue.drain_merged().await;
        assert!(queue.is_empty().await);
    }
}
