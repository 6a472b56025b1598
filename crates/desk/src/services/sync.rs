//! Keeping the local cache in step with the remote store.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use stockroom_core::OrderStatus;

use crate::cache::OrderCache;
use crate::error::DeskError;
use crate::remote::{ChildEvent, ORDERS, OrderRecords, RemoteStore};

const NOTICE_CAPACITY: usize = 16;

/// What a sync request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The pending set was refreshed.
    Synced { orders: usize },
    /// The previous sync is too recent.
    Skipped { retry_in: Duration },
}

/// User-facing sync notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    Synced { orders: usize },
    Failed { message: String },
}

/// Rate-limited sync of pending orders from the remote store into the cache.
///
/// A sync is skipped if the previous one started less than `interval` ago.
/// A failed sync clears that timestamp so the next request retries at once.
pub struct SyncOrchestrator<R, C> {
    remote: Arc<R>,
    cache: Arc<C>,
    interval: Duration,
    last_sync: Mutex<Option<Instant>>,
    notices: broadcast::Sender<SyncNotice>,
}

impl<R: RemoteStore, C: OrderCache> SyncOrchestrator<R, C> {
    #[must_use]
    pub fn new(remote: Arc<R>, cache: Arc<C>, interval: Duration) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            remote,
            cache,
            interval,
            last_sync: Mutex::new(None),
            notices,
        }
    }

    /// Receive sync notices from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.notices.subscribe()
    }

    /// Sync unless the previous sync is too recent.
    ///
    /// Concurrent calls are serialized; a call that waits behind a running
    /// sync sees that sync's timestamp and is skipped.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Sync` if the remote store or the cache fails. The
    /// failure has already been logged and published as a notice.
    #[instrument(skip(self))]
    pub async fn sync_now(&self) -> Result<SyncOutcome, DeskError> {
        let mut last_sync = self.last_sync.lock().await;
        let started = Instant::now();

        if let Some(previous) = *last_sync {
            let elapsed = started.saturating_duration_since(previous);
            if elapsed < self.interval {
                let retry_in = self.interval - elapsed;
                debug!(retry_in_secs = retry_in.as_secs(), "Sync skipped, last sync too recent");
                return Ok(SyncOutcome::Skipped { retry_in });
            }
        }

        *last_sync = Some(started);

        match self.refresh().await {
            Ok(orders) => {
                info!(orders, elapsed_ms = started.elapsed().as_millis(), "Pending orders synced");
                let _ = self.notices.send(SyncNotice::Synced { orders });
                Ok(SyncOutcome::Synced { orders })
            }
            Err(e) => {
                *last_sync = None;
                let error = DeskError::Sync(e.to_string());
                error.report("Order sync failed");
                let _ = self.notices.send(SyncNotice::Failed {
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Sync, swallowing failures. Used by timers and event handlers.
    pub async fn request_sync(&self) -> Option<SyncOutcome> {
        self.sync_now().await.ok()
    }

    async fn refresh(&self) -> Result<usize, DeskError> {
        let orders = OrderRecords::new(&*self.remote).pending_orders().await?;
        self.cache.replace_pending(&orders).await?;
        Ok(orders.len())
    }

    /// Sync on start, on every interval tick and whenever a pending order
    /// is added remotely, until `shutdown` turns true or its sender drops.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut events = match self.remote.subscribe_child_added(ORDERS).await {
            Ok(rx) => Some(rx),
            Err(e) => {
                DeskError::from(e).report("Failed to watch for new orders");
                None
            }
        };

        self.request_sync().await;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.request_sync().await;
                }
                event = next_event(&mut events) => match event {
                    Some(event) if is_pending(&event.value) => {
                        debug!(order_id = %event.key, "Pending order added remotely");
                        self.request_sync().await;
                    }
                    Some(_) => {}
                    None => {
                        warn!("New order subscription closed, relying on the interval");
                        events = None;
                    }
                },
            }
        }

        info!("Sync loop stopped");
    }
}

async fn next_event(events: &mut Option<mpsc::UnboundedReceiver<ChildEvent>>) -> Option<ChildEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn is_pending(value: &Value) -> bool {
    value.get("status").and_then(Value::as_str) == Some(OrderStatus::Pending.as_str())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use stockroom_core::{Order, OrderId};

    use super::*;
    use crate::cache::MemoryOrderCache;
    use crate::remote::{MemoryRemoteStore, PathUpdates, RemoteError};

    /// Memory store whose reads can be made to fail.
    #[derive(Default)]
    struct FlakyRemote {
        inner: MemoryRemoteStore,
        failing: AtomicBool,
    }

    impl FlakyRemote {
        fn check(&self) -> Result<(), RemoteError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(RemoteError::Stream("connection reset".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteStore for FlakyRemote {
        async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError> {
            self.check()?;
            self.inner.get(path).await
        }

        async fn query_equal(
            &self,
            path: &str,
            child: &str,
            value: &Value,
        ) -> Result<BTreeMap<String, Value>, RemoteError> {
            self.check()?;
            self.inner.query_equal(path, child, value).await
        }

        async fn push(&self, path: &str, value: Value) -> Result<String, RemoteError> {
            self.inner.push(path, value).await
        }

        async fn update(&self, updates: PathUpdates) -> Result<(), RemoteError> {
            self.inner.update(updates).await
        }

        async fn subscribe_child_added(
            &self,
            path: &str,
        ) -> Result<mpsc::UnboundedReceiver<ChildEvent>, RemoteError> {
            self.inner.subscribe_child_added(path).await
        }
    }

    fn pending(id: &str) -> Order {
        Order::new(OrderId::new(id), id, "Acme", Utc::now(), Vec::new())
    }

    async fn seed(remote: &FlakyRemote, ids: &[&str]) {
        let records = OrderRecords::new(remote);
        for id in ids {
            records.put_order(&pending(id)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_second_sync_within_interval_is_skipped() {
        let remote = Arc::new(FlakyRemote::default());
        seed(&remote, &["a", "b"]).await;
        let cache = Arc::new(MemoryOrderCache::new());
        let sync = SyncOrchestrator::new(remote, Arc::clone(&cache), Duration::from_secs(900));

        assert_eq!(sync.sync_now().await.unwrap(), SyncOutcome::Synced { orders: 2 });
        assert_eq!(cache.all_by_status(OrderStatus::Pending).await.unwrap().len(), 2);

        match sync.sync_now().await.unwrap() {
            SyncOutcome::Skipped { retry_in } => assert!(retry_in <= Duration::from_secs(900)),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_resets_rate_limit_and_notifies() {
        let remote = Arc::new(FlakyRemote::default());
        seed(&remote, &["a"]).await;
        let cache = Arc::new(MemoryOrderCache::new());
        let sync = SyncOrchestrator::new(Arc::clone(&remote), cache, Duration::from_secs(900));
        let mut notices = sync.subscribe();

        remote.failing.store(true, Ordering::SeqCst);
        assert!(matches!(sync.sync_now().await, Err(DeskError::Sync(_))));
        assert!(matches!(notices.recv().await.unwrap(), SyncNotice::Failed { .. }));

        remote.failing.store(false, Ordering::SeqCst);
        assert_eq!(sync.sync_now().await.unwrap(), SyncOutcome::Synced { orders: 1 });
        assert_eq!(notices.recv().await.unwrap(), SyncNotice::Synced { orders: 1 });
    }

    #[tokio::test]
    async fn test_sync_replaces_stale_pending_orders() {
        let remote = Arc::new(FlakyRemote::default());
        seed(&remote, &["fresh"]).await;
        let cache = Arc::new(MemoryOrderCache::new());
        cache.put(&[pending("stale")]).await.unwrap();

        let sync = SyncOrchestrator::new(remote, Arc::clone(&cache), Duration::from_secs(900));
        sync.sync_now().await.unwrap();

        assert!(cache.get(&OrderId::new("stale")).await.unwrap().is_none());
        assert!(cache.get(&OrderId::new("fresh")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_run_picks_up_new_orders_and_stops() {
        let remote = Arc::new(FlakyRemote::default());
        let cache = Arc::new(MemoryOrderCache::new());
        let sync = Arc::new(SyncOrchestrator::new(
            Arc::clone(&remote),
            Arc::clone(&cache),
            Duration::from_millis(20),
        ));
        let mut notices = sync.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.run(shutdown_rx).await }
        });

        assert_eq!(notices.recv().await.unwrap(), SyncNotice::Synced { orders: 0 });
        remote
            .push(ORDERS, json!({"orderNumber": "9", "dateTime": Utc::now(), "status": "Pending"}))
            .await
            .unwrap();

        let picked_up = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(SyncNotice::Synced { orders: 1 }) = notices.recv().await {
                    break;
                }
            }
        })
        .await;
        assert!(picked_up.is_ok());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_is_pending() {
        assert!(is_pending(&json!({"status": "Pending"})));
        assert!(!is_pending(&json!({"status": "billing"})));
        assert!(!is_pending(&json!({})));
    }
}
