//! Billing order records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::{BillingOrderId, OrderId};
use super::item::NestedItem;
use super::quantity::lenient_quantity;
use super::status::OrderStatus;

const fn billing_status() -> OrderStatus {
    OrderStatus::Billing
}

/// Accumulated fulfillments for one order number and billing day, stored
/// under `billingOrders/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingOrder {
    /// Record key.
    #[serde(default)]
    pub id: BillingOrderId,
    /// Order number shared with the originating pending orders.
    #[serde(default)]
    pub order_number: String,
    /// Customer (party) name.
    #[serde(default)]
    pub party_name: String,
    /// Start-of-billing timestamp; its UTC calendar day is the merge key.
    pub sob_date: DateTime<Utc>,
    /// When the first contributing order was placed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,
    /// Expiry of the first contributing order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
    /// Always `billing` for records written by this crate.
    #[serde(default = "billing_status")]
    pub status: OrderStatus,
    /// Billed items.
    #[serde(default)]
    pub items: Vec<NestedItem>,
    /// Sum of all billed quantities.
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub total_quantity: u32,
    /// Pending orders that contributed to this bill.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_order_ids: Vec<OrderId>,
    /// Fields written by other clients, kept so rewrites do not drop them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BillingOrder {
    /// Create an empty billing order.
    #[must_use]
    pub fn new(
        id: BillingOrderId,
        order_number: impl Into<String>,
        party_name: impl Into<String>,
        sob_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_number: order_number.into(),
            party_name: party_name.into(),
            sob_date,
            date_time: None,
            expiry_date: None,
            status: OrderStatus::Billing,
            items: Vec::new(),
            total_quantity: 0,
            source_order_ids: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Calendar day (UTC) of the start of billing.
    #[must_use]
    pub fn sob_day(&self) -> NaiveDate {
        self.sob_date.date_naive()
    }

    /// Whether a fulfillment of `order_number` on `day` merges into this bill.
    #[must_use]
    pub fn is_merge_target(&self, order_number: &str, day: NaiveDate) -> bool {
        self.order_number == order_number && self.sob_day() == day
    }

    /// Billed item with the given name, inserted at the end if missing.
    pub fn item_mut(&mut self, name: &str) -> &mut NestedItem {
        let index = match self.items.iter().position(|item| item.name == name) {
            Some(index) => index,
            None => {
                self.items.push(NestedItem::new(name));
                self.items.len() - 1
            }
        };
        #[allow(clippy::indexing_slicing)] // index was just found or pushed
        let item = &mut self.items[index];
        item
    }

    /// Sum of all billed line quantities, ignoring stored totals.
    #[must_use]
    pub fn computed_total(&self) -> u32 {
        self.items
            .iter()
            .map(NestedItem::computed_total)
            .fold(0, u32::saturating_add)
    }

    /// Billed quantity for a `(name, color, size)` line.
    #[must_use]
    pub fn quantity(&self, name: &str, color: &str, size: &str) -> u32 {
        self.items
            .iter()
            .filter(|item| item.name == name)
            .map(|item| item.quantity(color, size))
            .fold(0, u32::saturating_add)
    }

    /// Record a contributing pending order.
    pub fn note_source(&mut self, order_id: &OrderId) {
        if !self.source_order_ids.contains(order_id) {
            self.source_order_ids.push(order_id.clone());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn bill() -> BillingOrder {
        BillingOrder::new(
            BillingOrderId::new("b-1"),
            "1042",
            "Acme Traders",
            Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 0).unwrap(),
        )
    }

    #[test]
    fn test_merge_target_uses_number_and_day() {
        let bill = bill();
        let same_day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let next_day = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();

        assert!(bill.is_merge_target("1042", same_day));
        assert!(!bill.is_merge_target("1042", next_day));
        assert!(!bill.is_merge_target("1043", same_day));
    }

    #[test]
    fn test_item_mut_reuses_existing() {
        let mut bill = bill();
        bill.item_mut("Shirt").add("Red", "M", 4);
        bill.item_mut("Shirt").add("Red", "M", 6);
        bill.item_mut("Pant").add("Black", "32", 1);

        assert_eq!(bill.items.len(), 2);
        assert_eq!(bill.quantity("Shirt", "Red", "M"), 10);
        assert_eq!(bill.computed_total(), 11);
    }

    #[test]
    fn test_status_defaults_to_billing() {
        let bill: BillingOrder = serde_json::from_str(
            r#"{"orderNumber": "1", "sobDate": "2024-05-01T10:00:00Z", "items": []}"#,
        )
        .unwrap();
        assert_eq!(bill.status, OrderStatus::Billing);
    }

    #[test]
    fn test_note_source_is_deduplicated() {
        let mut bill = bill();
        bill.note_source(&OrderId::new("o-1"));
        bill.note_source(&OrderId::new("o-1"));
        assert_eq!(bill.source_order_ids.len(), 1);
    }

    #[test]
    fn test_unknown_fields_survive_rewrite() {
        let mut bill: BillingOrder = serde_json::from_str(
            r#"{
                "orderNumber": "1",
                "sobDate": "2024-05-01T10:00:00Z",
                "dateTime": "2024-04-30T08:00:00Z",
                "billedBy": "desk-3",
                "items": []
            }"#,
        )
        .unwrap();
        assert!(bill.date_time.is_some());
        bill.item_mut("Shirt").add("Red", "M", 1);

        let written = serde_json::to_value(&bill).unwrap();
        assert_eq!(written["billedBy"], "desk-3");
        assert_eq!(written["dateTime"], "2024-04-30T08:00:00Z");
        assert!(written.get("expiryDate").is_none());
    }
}
