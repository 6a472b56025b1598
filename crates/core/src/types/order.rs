//! Pending order records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::OrderId;
use super::item::OrderItem;
use super::quantity::lenient_quantity;
use super::status::OrderStatus;
use super::validation::ValidationError;

/// A sales order as stored under `orders/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Record key.
    #[serde(default)]
    pub id: OrderId,
    /// Human-facing order number; shared by orders merged into one bill.
    #[serde(default)]
    pub order_number: String,
    /// Customer (party) name.
    #[serde(default)]
    pub party_name: String,
    /// When the order was placed.
    pub date_time: DateTime<Utc>,
    /// When the order expires, if it does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
    /// Lifecycle status.
    #[serde(default)]
    pub status: OrderStatus,
    /// Line items in display order.
    #[serde(default)]
    pub items: Vec<OrderItem>,
    /// Stored total quantity.
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub total_quantity: u32,
    /// Fields written by other clients, kept so rewrites do not drop them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Order {
    /// Create a pending order with the total derived from `items`.
    #[must_use]
    pub fn new(
        id: OrderId,
        order_number: impl Into<String>,
        party_name: impl Into<String>,
        date_time: DateTime<Utc>,
        items: Vec<OrderItem>,
    ) -> Self {
        let mut order = Self {
            id,
            order_number: order_number.into(),
            party_name: party_name.into(),
            date_time,
            expiry_date: None,
            status: OrderStatus::Pending,
            items,
            total_quantity: 0,
            extra: Map::new(),
        };
        order.recompute_total();
        order
    }

    /// Sum of all item quantities, ignoring the stored total.
    #[must_use]
    pub fn computed_total(&self) -> u32 {
        self.items
            .iter()
            .map(OrderItem::total_quantity)
            .fold(0, u32::saturating_add)
    }

    /// Refresh the stored total from the items.
    pub fn recompute_total(&mut self) {
        self.total_quantity = self.computed_total();
    }

    /// Total ordered quantity for one `(name, color, size)` line across items.
    #[must_use]
    pub fn ordered_quantity(&self, name: &str, color: &str, size: &str) -> u32 {
        self.items
            .iter()
            .filter(|item| item.name() == name)
            .map(|item| item.quantity(color, size))
            .fold(0, u32::saturating_add)
    }

    /// Check the order can be persisted.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingId` if the order has no identifier.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingId);
        }
        Ok(())
    }
}
