//! Soft delete, revert and purge of pending orders.
//!
//! A deleted order is kept under `deletedOrders/` for
//! [`RETENTION_DAYS`](stockroom_core::RETENTION_DAYS) days. Within that window
//! it can be reverted to pending; after it, [`RetentionManager::purge_expired`]
//! removes it for good.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use stockroom_core::{DeletedOrder, OrderId};

use crate::cache::OrderCache;
use crate::error::DeskError;
use crate::remote::{OrderRecords, RemoteStore};

/// Moves orders between the pending and deleted collections.
pub struct RetentionManager<R, C> {
    remote: Arc<R>,
    cache: Arc<C>,
}

impl<R: RemoteStore, C: OrderCache> RetentionManager<R, C> {
    #[must_use]
    pub const fn new(remote: Arc<R>, cache: Arc<C>) -> Self {
        Self { remote, cache }
    }

    fn records(&self) -> OrderRecords<'_, R> {
        OrderRecords::new(&*self.remote)
    }

    /// Soft-delete a pending order.
    ///
    /// The order leaves `orders/` and lands in `deletedOrders/` in the same
    /// update, scheduled for purge `RETENTION_DAYS` after `now`.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Validation` for a blank reason (nothing is
    /// written), `DeskError::NotFound` if the order does not exist and
    /// `DeskError::Remote` if the store cannot be read or written.
    #[instrument(skip(self, reason), fields(order_id = %order_id))]
    pub async fn delete(
        &self,
        order_id: &OrderId,
        reason: &str,
        deleted_from: &str,
        now: DateTime<Utc>,
    ) -> Result<DeletedOrder, DeskError> {
        if reason.trim().is_empty() {
            return Err(stockroom_core::ValidationError::EmptyReason.into());
        }

        let records = self.records();
        let order = records
            .order(order_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("order {order_id}")))?;

        let deleted = DeletedOrder::schedule(order, reason, deleted_from, now)?;
        records.move_to_deleted(&deleted).await?;

        if let Err(e) = self.cache.remove(order_id).await {
            warn!(order_id = %order_id, error = %e, "Failed to drop deleted order from cache");
        }

        info!(
            order_id = %order_id,
            reason = %deleted.delete_reason,
            scheduled_deletion_date = %deleted.scheduled_deletion_date,
            "Order moved to deleted orders"
        );
        Ok(deleted)
    }

    /// Remove every deleted order whose retention window has passed.
    ///
    /// All due orders are removed in one update. Running it again with the
    /// same `now` removes nothing. Returns the ids removed.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Remote` if the store cannot be read or written.
    #[instrument(skip(self))]
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<OrderId>, DeskError> {
        let records = self.records();
        let due: Vec<OrderId> = records
            .deleted_orders()
            .await?
            .into_iter()
            .filter(|deleted| deleted.is_due(now))
            .map(|deleted| deleted.id().clone())
            .collect();

        if due.is_empty() {
            return Ok(due);
        }

        records.remove_deleted(&due).await?;
        info!(count = due.len(), "Purged expired deleted orders");
        Ok(due)
    }

    /// Bring a deleted order back to pending.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::NotFound` if no deleted order has this id and
    /// `DeskError::Remote` if the store cannot be read or written.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn revert(&self, order_id: &OrderId) -> Result<stockroom_core::Order, DeskError> {
        let records = self.records();
        let deleted = records
            .deleted_order(order_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("deleted order {order_id}")))?;

        let order = deleted.into_pending();
        records.restore(&order).await?;

        if let Err(e) = self.cache.put(std::slice::from_ref(&order)).await {
            warn!(order_id = %order_id, error = %e, "Failed to cache reverted order");
        }

        info!(order_id = %order_id, "Deleted order reverted to pending");
        Ok(order)
    }

    /// Remove a deleted order immediately, regardless of its schedule.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::NotFound` if no deleted order has this id and
    /// `DeskError::Remote` if the store cannot be read or written.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn permanent_delete(&self, order_id: &OrderId) -> Result<(), DeskError> {
        let records = self.records();
        if records.deleted_order(order_id).await?.is_none() {
            return Err(DeskError::NotFound(format!("deleted order {order_id}")));
        }

        records.remove_deleted(std::slice::from_ref(order_id)).await?;
        info!(order_id = %order_id, "Deleted order permanently removed");
        Ok(())
    }

    /// Deleted orders, most recently deleted first.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Remote` if the store cannot be read.
    pub async fn list_deleted(&self) -> Result<Vec<DeletedOrder>, DeskError> {
        let mut deleted = self.records().deleted_orders().await?;
        deleted.sort_by(|a, b| b.delete_date.cmp(&a.delete_date));
        Ok(deleted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};
    use stockroom_core::{DELETED_FROM_PENDING, FlatItem, Order, OrderStatus, ValidationError};

    use super::*;
    use crate::cache::MemoryOrderCache;
    use crate::remote::MemoryRemoteStore;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    async fn setup(ids: &[&str]) -> (RetentionManager<MemoryRemoteStore, MemoryOrderCache>, Arc<MemoryRemoteStore>) {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = Arc::new(MemoryOrderCache::new());
        let records = OrderRecords::new(&*remote);
        for id in ids {
            let mut order = Order::new(
                OrderId::new(*id),
                *id,
                "Acme",
                now() - Duration::days(3),
                vec![FlatItem::new("Shirt", "Red", [("M".to_string(), 5)]).into()],
            );
            order.status = OrderStatus::WaitingForBilling;
            records.put_order(&order).await.unwrap();
        }
        (
            RetentionManager::new(Arc::clone(&remote), cache),
            remote,
        )
    }

    #[tokio::test]
    async fn test_delete_requires_reason() {
        let (manager, remote) = setup(&["o-1"]).await;
        let result = manager
            .delete(&OrderId::new("o-1"), "  ", DELETED_FROM_PENDING, now())
            .await;

        assert!(matches!(
            result,
            Err(DeskError::Validation(ValidationError::EmptyReason))
        ));
        let records = OrderRecords::new(&*remote);
        assert!(records.order(&OrderId::new("o-1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_then_revert_restores_pending() {
        let (manager, remote) = setup(&["o-1"]).await;
        let id = OrderId::new("o-1");
        let records = OrderRecords::new(&*remote);
        let before = records.order(&id).await.unwrap().unwrap();

        let deleted = manager
            .delete(&id, "Duplicate order", DELETED_FROM_PENDING, now())
            .await
            .unwrap();
        assert_eq!(deleted.scheduled_deletion_date, now() + Duration::days(30));
        assert!(records.order(&id).await.unwrap().is_none());

        let restored = manager.revert(&id).await.unwrap();
        assert_eq!(restored.status, OrderStatus::Pending);
        assert_eq!(restored.items, before.items);
        assert!(records.deleted_order(&id).await.unwrap().is_none());
        assert_eq!(records.order(&id).await.unwrap().unwrap(), restored);
    }

    #[tokio::test]
    async fn test_purge_is_idempotent_and_respects_schedule() {
        let (manager, _) = setup(&["o-1", "o-2"]).await;
        manager
            .delete(&OrderId::new("o-1"), "Duplicate order", DELETED_FROM_PENDING, now())
            .await
            .unwrap();
        manager
            .delete(
                &OrderId::new("o-2"),
                "Order placed by mistake",
                DELETED_FROM_PENDING,
                now() + Duration::days(10),
            )
            .await
            .unwrap();

        let at = now() + Duration::days(30);
        assert_eq!(manager.purge_expired(at).await.unwrap(), [OrderId::new("o-1")]);
        assert!(manager.purge_expired(at).await.unwrap().is_empty());

        let remaining = manager.list_deleted().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id().as_str(), "o-2");
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_found() {
        let (manager, _) = setup(&[]).await;
        let id = OrderId::new("ghost");

        assert!(matches!(manager.revert(&id).await, Err(DeskError::NotFound(_))));
        assert!(matches!(
            manager.permanent_delete(&id).await,
            Err(DeskError::NotFound(_))
        ));
        assert!(matches!(
            manager.delete(&id, "Duplicate order", DELETED_FROM_PENDING, now()).await,
            Err(DeskError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_deleted_newest_first() {
        let (manager, _) = setup(&["o-1", "o-2"]).await;
        manager
            .delete(&OrderId::new("o-1"), "a", DELETED_FROM_PENDING, now())
            .await
            .unwrap();
        manager
            .delete(&OrderId::new("o-2"), "b", DELETED_FROM_PENDING, now() + Duration::hours(1))
            .await
            .unwrap();

        let ids: Vec<_> = manager
            .list_deleted()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.order.id)
            .collect();
        assert_eq!(ids, [OrderId::new("o-2"), OrderId::new("o-1")]);

        manager.permanent_delete(&OrderId::new("o-2")).await.unwrap();
        assert_eq!(manager.list_deleted().await.unwrap().len(), 1);
    }
}
