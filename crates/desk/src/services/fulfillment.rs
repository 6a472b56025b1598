//! Sending pending order quantities to billing.

use std::slice;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use stockroom_core::{
    FulfillmentMap, Order, OrderId, OrderItem, OrderStatus, ValidationError, parse_quantity,
};

use crate::cache::OrderCache;
use crate::error::DeskError;
use crate::ledger::{FulfillmentSession, Reconciliation, SrqEntry, extract, find_merge_target, reconcile};
use crate::remote::{OrderRecords, RemoteStore};

/// Reconciles fulfillment events against the remote store.
///
/// The remote store is written first and in one update; the local cache is
/// refreshed afterwards on a best-effort basis.
pub struct FulfillmentService<R, C> {
    remote: Arc<R>,
    cache: Arc<C>,
}

impl<R: RemoteStore, C: OrderCache> FulfillmentService<R, C> {
    #[must_use]
    pub const fn new(remote: Arc<R>, cache: Arc<C>) -> Self {
        Self { remote, cache }
    }

    fn records(&self) -> OrderRecords<'_, R> {
        OrderRecords::new(&*self.remote)
    }

    async fn load(&self, order_id: &OrderId) -> Result<Order, DeskError> {
        self.records()
            .order(order_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("order {order_id}")))
    }

    /// Move the quantities in `fulfillment` from a pending order to billing.
    ///
    /// Quantities merge into the billing order opened today for the same
    /// order number, if any; otherwise a new billing order is created.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::NotFound` if the order does not exist,
    /// `DeskError::Validation` if nothing would be billed, and
    /// `DeskError::Remote` if the remote store cannot be read or written.
    #[instrument(skip(self, fulfillment), fields(order_id = %order_id))]
    pub async fn send_to_billing(
        &self,
        order_id: &OrderId,
        fulfillment: &FulfillmentMap,
        now: DateTime<Utc>,
    ) -> Result<Reconciliation, DeskError> {
        let order = self.load(order_id).await?;
        self.commit(&order, fulfillment, now).await
    }

    /// Fulfill an order from raw SRQ entries.
    ///
    /// Entries are clamped to the ordered quantities before reconciling.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_to_billing`].
    #[instrument(skip(self, entries), fields(order_id = %order_id, entries = entries.len()))]
    pub async fn fulfill_from_entries(
        &self,
        order_id: &OrderId,
        entries: &[SrqEntry],
        now: DateTime<Utc>,
    ) -> Result<Reconciliation, DeskError> {
        let order = self.load(order_id).await?;
        let fulfillment = extract(&order, entries);
        self.commit(&order, &fulfillment, now).await
    }

    /// Fulfill an order from the entries recorded in `session`.
    ///
    /// The session forgets the order once the fulfillment is committed.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_to_billing`].
    pub async fn fulfill_from_session(
        &self,
        session: &mut FulfillmentSession,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> Result<Reconciliation, DeskError> {
        let order = self.load(order_id).await?;
        let fulfillment = session.fulfillment_for(&order);
        let result = self.commit(&order, &fulfillment, now).await?;
        session.clear(order_id);
        Ok(result)
    }

    async fn commit(
        &self,
        order: &Order,
        fulfillment: &FulfillmentMap,
        now: DateTime<Utc>,
    ) -> Result<Reconciliation, DeskError> {
        if fulfillment.is_empty() {
            return Err(ValidationError::NothingToFulfill(order.id.to_string()).into());
        }

        let records = self.records();
        let candidates = if order.order_number.trim().is_empty() {
            Vec::new()
        } else {
            records.billing_orders_for(&order.order_number).await?
        };
        let target = find_merge_target(&candidates, &order.order_number, now);

        let result = reconcile(order, fulfillment, target, now);
        if result.billed_quantity == 0 {
            return Err(ValidationError::NothingToFulfill(order.id.to_string()).into());
        }

        records
            .commit_fulfillment(&result.updated_order, &result.billing_order)
            .await?;

        info!(
            order_id = %order.id,
            billing_order_id = %result.billing_order.id,
            merged = result.merged,
            billed_quantity = result.billed_quantity,
            remaining_quantity = result.updated_order.total_quantity,
            "Order sent to billing"
        );

        if let Err(e) = self.cache.put(slice::from_ref(&result.updated_order)).await {
            warn!(order_id = %order.id, error = %e, "Failed to refresh cached order after billing");
        }

        Ok(result)
    }

    /// Flag an order as waiting for billing.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::NotFound` if the order does not exist and
    /// `DeskError::Remote` if the write fails.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_for_billing(&self, order_id: &OrderId) -> Result<Order, DeskError> {
        let mut order = self.load(order_id).await?;
        self.records()
            .set_status(order_id, OrderStatus::WaitingForBilling)
            .await?;
        order.status = OrderStatus::WaitingForBilling;

        if let Err(e) = self.cache.put(slice::from_ref(&order)).await {
            warn!(order_id = %order_id, error = %e, "Failed to refresh cached order status");
        }

        info!(order_id = %order_id, "Order marked for billing");
        Ok(order)
    }

    /// Save an entered SRQ value on the order's flat item, so it can be
    /// prefilled later. Returns the stored (clamped) quantity.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::NotFound` if the order or a flat item for the
    /// line does not exist and `DeskError::Remote` if the write fails.
    #[instrument(skip(self, raw), fields(order_id = %order_id))]
    pub async fn save_srq(
        &self,
        order_id: &OrderId,
        item: &str,
        color: &str,
        size: &str,
        raw: &str,
    ) -> Result<u32, DeskError> {
        let mut order = self.load(order_id).await?;

        let flat = order
            .items
            .iter_mut()
            .find_map(|candidate| match candidate {
                OrderItem::Flat(flat)
                    if flat.name == item
                        && flat.color() == color
                        && flat.quantities.contains_key(size) =>
                {
                    Some(flat)
                }
                _ => None,
            })
            .ok_or_else(|| {
                DeskError::NotFound(format!("line {item}/{color}/{size} on order {order_id}"))
            })?;

        let ordered = flat.quantities.get(size).copied().unwrap_or(0);
        let qty = parse_quantity(raw).min(ordered);
        let srq = flat.srq.get_or_insert_with(Default::default);
        if qty == 0 {
            srq.remove(size);
        } else {
            srq.insert(size.to_owned(), qty);
        }
        if srq.is_empty() {
            flat.srq = None;
        }

        self.records().put_order(&order).await?;
        if let Err(e) = self.cache.put(slice::from_ref(&order)).await {
            warn!(order_id = %order_id, error = %e, "Failed to refresh cached order SRQ");
        }

        Ok(qty)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};
    use stockroom_core::FlatItem;

    use super::*;
    use crate::cache::MemoryOrderCache;
    use crate::remote::MemoryRemoteStore;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    async fn setup() -> (
        FulfillmentService<MemoryRemoteStore, MemoryOrderCache>,
        Arc<MemoryRemoteStore>,
        Arc<MemoryOrderCache>,
    ) {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = Arc::new(MemoryOrderCache::new());
        let order = Order::new(
            OrderId::new("o-1"),
            "1042",
            "Acme",
            now() - Duration::days(1),
            vec![FlatItem::new("Shirt", "Red", [("M".to_string(), 10)]).into()],
        );
        OrderRecords::new(&*remote).put_order(&order).await.unwrap();
        (
            FulfillmentService::new(Arc::clone(&remote), Arc::clone(&cache)),
            remote,
            cache,
        )
    }

    fn request(qty: u32) -> FulfillmentMap {
        [("Shirt", "Red", "M", qty)].into_iter().collect()
    }

    #[tokio::test]
    async fn test_two_fulfillments_same_day_merge() {
        let (service, remote, cache) = setup().await;
        let id = OrderId::new("o-1");

        let first = service.send_to_billing(&id, &request(4), now()).await.unwrap();
        assert!(!first.merged);

        let later = now() + Duration::hours(2);
        let second = service.send_to_billing(&id, &request(6), later).await.unwrap();
        assert!(second.merged);
        assert_eq!(second.billing_order.id, first.billing_order.id);

        let records = OrderRecords::new(&*remote);
        let bills = records.billing_orders_for("1042").await.unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].quantity("Shirt", "Red", "M"), 10);
        assert_eq!(bills[0].total_quantity, 10);

        let pending = records.order(&id).await.unwrap().unwrap();
        assert!(pending.items.is_empty());
        assert_eq!(pending.total_quantity, 0);

        let cached = cache.get(&id).await.unwrap().unwrap();
        assert_eq!(cached, pending);
    }

    #[tokio::test]
    async fn test_next_day_opens_new_bill() {
        let (service, remote, _) = setup().await;
        let id = OrderId::new("o-1");

        service.send_to_billing(&id, &request(4), now()).await.unwrap();
        service
            .send_to_billing(&id, &request(2), now() + Duration::days(1))
            .await
            .unwrap();

        let bills = OrderRecords::new(&*remote)
            .billing_orders_for("1042")
            .await
            .unwrap();
        assert_eq!(bills.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_order_and_empty_request() {
        let (service, _, _) = setup().await;

        let missing = service
            .send_to_billing(&OrderId::new("nope"), &request(1), now())
            .await;
        assert!(matches!(missing, Err(DeskError::NotFound(_))));

        let empty = service
            .send_to_billing(&OrderId::new("o-1"), &FulfillmentMap::new(), now())
            .await;
        assert!(matches!(
            empty,
            Err(DeskError::Validation(ValidationError::NothingToFulfill(_)))
        ));

        let unknown: FulfillmentMap = [("Cap", "Red", "M", 1)].into_iter().collect();
        let unmatched = service
            .send_to_billing(&OrderId::new("o-1"), &unknown, now())
            .await;
        assert!(matches!(unmatched, Err(DeskError::Validation(_))));
    }

    #[tokio::test]
    async fn test_fulfill_from_entries_clamps() {
        let (service, _, _) = setup().await;
        let entries = [SrqEntry::new("Shirt", "Red", "M", "25")];

        let result = service
            .fulfill_from_entries(&OrderId::new("o-1"), &entries, now())
            .await
            .unwrap();
        assert_eq!(result.billed_quantity, 10);
    }

    #[tokio::test]
    async fn test_session_is_cleared_after_commit() {
        let (service, _, _) = setup().await;
        let id = OrderId::new("o-1");
        let mut session = FulfillmentSession::new();
        session.record(&id, SrqEntry::new("Shirt", "Red", "M", "3"));

        let result = service
            .fulfill_from_session(&mut session, &id, now())
            .await
            .unwrap();
        assert_eq!(result.billed_quantity, 3);
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_mark_for_billing() {
        let (service, remote, cache) = setup().await;
        let id = OrderId::new("o-1");

        service.mark_for_billing(&id).await.unwrap();

        let stored = OrderRecords::new(&*remote).order(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::WaitingForBilling);
        assert!(cache.all_by_status(OrderStatus::Pending).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_srq_round_trips_through_session() {
        let (service, remote, _) = setup().await;
        let id = OrderId::new("o-1");

        assert_eq!(service.save_srq(&id, "Shirt", "Red", "M", "12").await.unwrap(), 10);
        assert_eq!(service.save_srq(&id, "Shirt", "Red", "M", "7").await.unwrap(), 7);

        let stored = OrderRecords::new(&*remote).order(&id).await.unwrap().unwrap();
        let mut session = FulfillmentSession::new();
        session.seed_from_order(&stored);
        assert_eq!(session.fulfillment_for(&stored).get("Shirt", "Red", "M"), 7);

        let missing = service.save_srq(&id, "Shirt", "Blue", "M", "1").await;
        assert!(matches!(missing, Err(DeskError::NotFound(_))));
    }
}
