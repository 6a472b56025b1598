//! Desk state shared across tasks.

use std::sync::Arc;

use crate::cache::OrderCache;
use crate::remote::{OrderRecords, RemoteStore};
use crate::services::{FulfillmentService, RetentionManager, SyncOrchestrator};

/// Services wired to one remote store and one local cache.
///
/// Cheap to clone; all clones share the same services.
pub struct DeskState<R, C> {
    inner: Arc<DeskStateInner<R, C>>,
}

struct DeskStateInner<R, C> {
    remote: Arc<R>,
    cache: Arc<C>,
    fulfillment: FulfillmentService<R, C>,
    retention: RetentionManager<R, C>,
    sync: SyncOrchestrator<R, C>,
}

impl<R, C> Clone for DeskState<R, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: RemoteStore, C: OrderCache> DeskState<R, C> {
    #[must_use]
    pub fn new(remote: R, cache: C, sync_interval: std::time::Duration) -> Self {
        let remote = Arc::new(remote);
        let cache = Arc::new(cache);
        Self {
            inner: Arc::new(DeskStateInner {
                fulfillment: FulfillmentService::new(Arc::clone(&remote), Arc::clone(&cache)),
                retention: RetentionManager::new(Arc::clone(&remote), Arc::clone(&cache)),
                sync: SyncOrchestrator::new(Arc::clone(&remote), Arc::clone(&cache), sync_interval),
                remote,
                cache,
            }),
        }
    }

    #[must_use]
    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    #[must_use]
    pub fn cache(&self) -> &C {
        &self.inner.cache
    }

    /// Typed access to the remote collections.
    #[must_use]
    pub fn records(&self) -> OrderRecords<'_, R> {
        OrderRecords::new(&*self.inner.remote)
    }

    #[must_use]
    pub fn fulfillment(&self) -> &FulfillmentService<R, C> {
        &self.inner.fulfillment
    }

    #[must_use]
    pub fn retention(&self) -> &RetentionManager<R, C> {
        &self.inner.retention
    }

    #[must_use]
    pub fn sync(&self) -> &SyncOrchestrator<R, C> {
        &self.inner.sync
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use stockroom_core::{Order, OrderId, OrderStatus};

    use super::*;
    use crate::cache::MemoryOrderCache;
    use crate::remote::MemoryRemoteStore;
    use crate::services::SyncOutcome;

    #[tokio::test]
    async fn test_clones_share_services() {
        let state = DeskState::new(
            MemoryRemoteStore::new(),
            MemoryOrderCache::new(),
            Duration::from_secs(900),
        );
        let order = Order::new(OrderId::new("o-1"), "1", "Acme", Utc::now(), Vec::new());
        state.records().put_order(&order).await.unwrap();

        let other = state.clone();
        assert_eq!(
            other.sync().sync_now().await.unwrap(),
            SyncOutcome::Synced { orders: 1 }
        );
        assert!(matches!(
            state.sync().sync_now().await.unwrap(),
            SyncOutcome::Skipped { .. }
        ));
        assert_eq!(
            state.cache().all_by_status(OrderStatus::Pending).await.unwrap().len(),
            1
        );
    }
}
