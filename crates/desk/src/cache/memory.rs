//! In-process order cache.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use stockroom_core::{Order, OrderId, OrderStatus};

use super::{CacheError, OrderCache, validate_all};

/// Order cache held in memory.
#[derive(Debug, Default)]
pub struct MemoryOrderCache {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl MemoryOrderCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached orders in any status.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderCache for MemoryOrderCache {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>, CacheError> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn put(&self, orders: &[Order]) -> Result<(), CacheError> {
        validate_all(orders)?;
        let mut cached = self.orders.write().await;
        for order in orders {
            cached.insert(order.id.clone(), order.clone());
        }
        Ok(())
    }

    async fn all_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, CacheError> {
        let cached = self.orders.read().await;
        let mut orders: Vec<Order> = cached
            .values()
            .filter(|order| order.status == status)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.date_time.cmp(&b.date_time).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn replace_pending(&self, orders: &[Order]) -> Result<(), CacheError> {
        validate_all(orders)?;
        let mut cached = self.orders.write().await;
        cached.retain(|_, order| order.status != OrderStatus::Pending);
        for order in orders {
            cached.insert(order.id.clone(), order.clone());
        }
        Ok(())
    }

    async fn remove(&self, id: &OrderId) -> Result<bool, CacheError> {
        Ok(self.orders.write().await.remove(id).is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn order(id: &str, status: OrderStatus) -> Order {
        let mut order = Order::new(OrderId::new(id), id, "Acme", Utc::now(), Vec::new());
        order.status = status;
        order
    }

    #[tokio::test]
    async fn test_put_rejects_whole_batch_on_missing_id() {
        let cache = MemoryOrderCache::new();
        let result = cache
            .put(&[order("a", OrderStatus::Pending), order("", OrderStatus::Pending)])
            .await;

        assert!(matches!(result, Err(CacheError::Validation(_))));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_replace_pending_keeps_other_statuses() {
        let cache = MemoryOrderCache::new();
        cache
            .put(&[
                order("a", OrderStatus::Pending),
                order("b", OrderStatus::WaitingForBilling),
            ])
            .await
            .unwrap();

        cache
            .replace_pending(&[order("c", OrderStatus::Pending)])
            .await
            .unwrap();

        assert!(cache.get(&OrderId::new("a")).await.unwrap().is_none());
        assert!(cache.get(&OrderId::new("b")).await.unwrap().is_some());
        let pending = cache.all_by_status(OrderStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id.as_str(), "c");
    }

    #[tokio::test]
    async fn test_all_by_status_is_oldest_first() {
        let cache = MemoryOrderCache::new();
        let mut older = order("z", OrderStatus::Pending);
        older.date_time -= Duration::days(1);
        cache
            .put(&[order("a", OrderStatus::Pending), older])
            .await
            .unwrap();

        let ids: Vec<_> = cache
            .all_by_status(OrderStatus::Pending)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, [OrderId::new("z"), OrderId::new("a")]);
    }

    #[tokio::test]
    async fn test_remove_reports_presence() {
        let cache = MemoryOrderCache::new();
        cache.put(&[order("a", OrderStatus::Pending)]).await.unwrap();

        assert!(cache.remove(&OrderId::new("a")).await.unwrap());
        assert!(!cache.remove(&OrderId::new("a")).await.unwrap());
    }
}
