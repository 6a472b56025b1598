//! Typed access to order records in the remote store.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use stockroom_core::{BillingOrder, DeletedOrder, Order, OrderId, OrderStatus};

use super::{PathUpdates, RemoteError, RemoteStore};

/// Pending orders.
pub const ORDERS: &str = "orders";
/// Billing orders.
pub const BILLING_ORDERS: &str = "billingOrders";
/// Soft-deleted orders.
pub const DELETED_ORDERS: &str = "deletedOrders";

/// Repository for order, billing and deleted-order records.
///
/// Records are keyed by id; a record without an `id` field takes its key.
/// Records that fail to decode are logged and skipped in list reads.
pub struct OrderRecords<'a, R: ?Sized> {
    store: &'a R,
}

impl<'a, R: RemoteStore + ?Sized> OrderRecords<'a, R> {
    /// Create a new repository over `store`.
    #[must_use]
    pub const fn new(store: &'a R) -> Self {
        Self { store }
    }

    /// All orders with status `Pending`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn pending_orders(&self) -> Result<Vec<Order>, RemoteError> {
        let found = self
            .store
            .query_equal(ORDERS, "status", &Value::from(OrderStatus::Pending.as_str()))
            .await?;
        Ok(decode_all(ORDERS, found, normalize_order))
    }

    /// One order by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the record cannot be decoded.
    pub async fn order(&self, id: &OrderId) -> Result<Option<Order>, RemoteError> {
        let path = format!("{ORDERS}/{id}");
        let Some(value) = self.store.get(&path).await? else {
            return Ok(None);
        };
        let mut order: Order = decode(&path, value)?;
        normalize_order(&mut order, id.as_str());
        Ok(Some(order))
    }

    /// Billing orders for an order number, in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn billing_orders_for(
        &self,
        order_number: &str,
    ) -> Result<Vec<BillingOrder>, RemoteError> {
        let found = self
            .store
            .query_equal(BILLING_ORDERS, "orderNumber", &Value::from(order_number))
            .await?;
        Ok(decode_all(BILLING_ORDERS, found, |bill: &mut BillingOrder, key| {
            if bill.id.is_empty() {
                bill.id = key.into();
            }
            bill.total_quantity = bill.computed_total();
        }))
    }

    /// All deleted orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn deleted_orders(&self) -> Result<Vec<DeletedOrder>, RemoteError> {
        let children = match self.store.get(DELETED_ORDERS).await? {
            Some(Value::Object(children)) => children.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        Ok(decode_all(DELETED_ORDERS, children, |deleted: &mut DeletedOrder, key| {
            normalize_order(&mut deleted.order, key);
        }))
    }

    /// One deleted order by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the record cannot be decoded.
    pub async fn deleted_order(&self, id: &OrderId) -> Result<Option<DeletedOrder>, RemoteError> {
        let path = format!("{DELETED_ORDERS}/{id}");
        let Some(value) = self.store.get(&path).await? else {
            return Ok(None);
        };
        let mut deleted: DeletedOrder = decode(&path, value)?;
        normalize_order(&mut deleted.order, id.as_str());
        Ok(Some(deleted))
    }

    /// Add a new order under a generated key and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn push_order(&self, order: &Order) -> Result<OrderId, RemoteError> {
        let key = self.store.push(ORDERS, encode(order)?).await?;
        Ok(OrderId::new(key))
    }

    /// Write one order.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn put_order(&self, order: &Order) -> Result<(), RemoteError> {
        let mut updates = PathUpdates::new();
        updates.insert(format!("{ORDERS}/{}", order.id), Some(encode(order)?));
        self.store.update(updates).await
    }

    /// Change only an order's status field.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn set_status(&self, id: &OrderId, status: OrderStatus) -> Result<(), RemoteError> {
        let mut updates = PathUpdates::new();
        updates.insert(
            format!("{ORDERS}/{id}/status"),
            Some(Value::from(status.as_str())),
        );
        self.store.update(updates).await
    }

    /// Write a billing order and the reconciled pending order together.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; neither record is written then.
    pub async fn commit_fulfillment(
        &self,
        updated: &Order,
        billing: &BillingOrder,
    ) -> Result<(), RemoteError> {
        let mut updates = PathUpdates::new();
        updates.insert(format!("{BILLING_ORDERS}/{}", billing.id), Some(encode(billing)?));
        updates.insert(format!("{ORDERS}/{}", updated.id), Some(encode(updated)?));
        self.store.update(updates).await
    }

    /// Move an order from pending to deleted in one update.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn move_to_deleted(&self, deleted: &DeletedOrder) -> Result<(), RemoteError> {
        let id = deleted.id();
        let mut updates = PathUpdates::new();
        updates.insert(format!("{DELETED_ORDERS}/{id}"), Some(encode(deleted)?));
        updates.insert(format!("{ORDERS}/{id}"), None);
        self.store.update(updates).await
    }

    /// Move an order from deleted back to pending in one update.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn restore(&self, order: &Order) -> Result<(), RemoteError> {
        let mut updates = PathUpdates::new();
        updates.insert(format!("{ORDERS}/{}", order.id), Some(encode(order)?));
        updates.insert(format!("{DELETED_ORDERS}/{}", order.id), None);
        self.store.update(updates).await
    }

    /// Remove deleted orders for good. An empty list writes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn remove_deleted(&self, ids: &[OrderId]) -> Result<(), RemoteError> {
        if ids.is_empty() {
            return Ok(());
        }
        let updates = ids
            .iter()
            .map(|id| (format!("{DELETED_ORDERS}/{id}"), None))
            .collect();
        self.store.update(updates).await
    }
}

/// Fill a missing id from the record key and derive the total from the items.
fn normalize_order(order: &mut Order, key: &str) {
    if order.id.is_empty() {
        order.id = OrderId::new(key);
    }
    order.recompute_total();
}

fn encode<T: Serialize>(record: &T) -> Result<Value, RemoteError> {
    serde_json::to_value(record)
        .map_err(|e| RemoteError::Parse(format!("Failed to encode record: {e}")))
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, RemoteError> {
    serde_json::from_value(value)
        .map_err(|e| RemoteError::Parse(format!("Failed to decode {path}: {e}")))
}

fn decode_all<T, F>(collection: &str, children: BTreeMap<String, Value>, mut fix: F) -> Vec<T>
where
    T: DeserializeOwned,
    F: FnMut(&mut T, &str),
{
    children
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<T>(value) {
            Ok(mut record) => {
                fix(&mut record, &key);
                Some(record)
            }
            Err(e) => {
                warn!(collection, key = %key, error = %e, "Skipping undecodable record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use stockroom_core::{BillingOrderId, FlatItem};

    use super::*;
    use crate::remote::MemoryRemoteStore;

    fn order(id: &str) -> Order {
        Order::new(
            OrderId::new(id),
            "1042",
            "Acme",
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            vec![FlatItem::new("Shirt", "Red", [("M".to_string(), 10)]).into()],
        )
    }

    #[tokio::test]
    async fn test_pending_orders_take_key_and_skip_bad_records() {
        let store = MemoryRemoteStore::with_tree(json!({
            "orders": {
                "k1": {
                    "orderNumber": "1", "partyName": "Acme",
                    "dateTime": "2024-05-01T09:00:00Z", "status": "Pending",
                    "items": [{"name": "Shirt", "color": "Red", "quantities": {"M": 3}}]
                },
                "k2": {"status": "Pending", "dateTime": "not a date"},
                "k3": {
                    "orderNumber": "3", "dateTime": "2024-05-01T09:00:00Z",
                    "status": "billing"
                }
            }
        }));
        let records = OrderRecords::new(&store);
        let pending = records.pending_orders().await.unwrap();

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id.as_str(), "k1");
        assert_eq!(pending[0].ordered_quantity("Shirt", "Red", "M"), 3);
    }

    #[tokio::test]
    async fn test_commit_fulfillment_writes_both_records() {
        let store = MemoryRemoteStore::new();
        let records = OrderRecords::new(&store);
        let updated = order("o-1");
        let bill = BillingOrder::new(BillingOrderId::new("b-1"), "1042", "Acme", Utc::now());

        records.commit_fulfillment(&updated, &bill).await.unwrap();

        assert_eq!(records.order(&updated.id).await.unwrap(), Some(updated));
        let bills = records.billing_orders_for("1042").await.unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].id.as_str(), "b-1");
    }

    #[tokio::test]
    async fn test_move_to_deleted_and_restore() {
        let store = MemoryRemoteStore::new();
        let records = OrderRecords::new(&store);
        let original = order("o-1");
        records.put_order(&original).await.unwrap();

        let deleted = DeletedOrder::schedule(original.clone(), "Duplicate order", "Pending", Utc::now())
            .unwrap();
        records.move_to_deleted(&deleted).await.unwrap();

        assert!(records.order(&original.id).await.unwrap().is_none());
        assert_eq!(records.deleted_orders().await.unwrap().len(), 1);

        records.restore(&original).await.unwrap();
        assert!(records.deleted_order(&original.id).await.unwrap().is_none());
        assert!(records.order(&original.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_set_status_touches_only_status() {
        let store = MemoryRemoteStore::new();
        let records = OrderRecords::new(&store);
        let original = order("o-1");
        records.put_order(&original).await.unwrap();

        records
            .set_status(&original.id, OrderStatus::WaitingForBilling)
            .await
            .unwrap();

        let stored = records.order(&original.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::WaitingForBilling);
        assert_eq!(stored.items, original.items);
    }

    #[tokio::test]
    async fn test_push_order_returns_key() {
        let store = MemoryRemoteStore::new();
        let records = OrderRecords::new(&store);
        let mut fresh = order("");
        fresh.id = OrderId::default();

        let id = records.push_order(&fresh).await.unwrap();
        let stored = records.order(&id).await.unwrap().unwrap();
        assert_eq!(stored.id, id);
    }
}
