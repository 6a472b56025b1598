//! Soft-deleted orders awaiting purge.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::id::OrderId;
use super::order::Order;
use super::status::OrderStatus;
use super::validation::ValidationError;

/// Days a deleted order is retained before it is purged.
pub const RETENTION_DAYS: i64 = 30;

/// Section name recorded for orders deleted from the pending list.
pub const DELETED_FROM_PENDING: &str = "Pending";

/// Preset delete reasons offered to staff.
pub const PRESET_DELETE_REASONS: &[&str] = &[
    "Order placed by mistake",
    "Duplicate order",
    "Order cancelled by party",
    "Order cancelled due to no stock in company",
];

/// Build a delete reason from selected presets or free text.
///
/// Selected presets win and are joined with `", "`; otherwise the trimmed
/// free text is used. Returns `None` when neither yields a reason.
#[must_use]
pub fn compose_delete_reason(presets: &[String], custom: Option<&str>) -> Option<String> {
    let selected: Vec<&str> = presets
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if !selected.is_empty() {
        return Some(selected.join(", "));
    }
    custom
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
}

/// An order snapshot stored under `deletedOrders/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedOrder {
    /// The order as it was when deleted.
    #[serde(flatten)]
    pub order: Order,
    /// Why the order was deleted.
    pub delete_reason: String,
    /// When the order was deleted.
    pub delete_date: DateTime<Utc>,
    /// Section the order was deleted from.
    #[serde(default)]
    pub deleted_from: String,
    /// When the order becomes eligible for purge.
    pub scheduled_deletion_date: DateTime<Utc>,
}

impl DeletedOrder {
    /// Snapshot `order` for deletion at `now`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyReason` if `reason` is blank and
    /// `ValidationError::MissingId` if the order has no identifier.
    pub fn schedule(
        order: Order,
        reason: &str,
        deleted_from: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        order.validate()?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::EmptyReason);
        }

        Ok(Self {
            order,
            delete_reason: reason.to_owned(),
            delete_date: now,
            deleted_from: deleted_from.to_owned(),
            scheduled_deletion_date: now + Duration::days(RETENTION_DAYS),
        })
    }

    /// The deleted order's key.
    #[must_use]
    pub const fn id(&self) -> &OrderId {
        &self.order.id
    }

    /// Whether the retention window has elapsed at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_deletion_date <= now
    }

    /// Turn the snapshot back into a live pending order.
    #[must_use]
    pub fn into_pending(self) -> Order {
        let mut order = self.order;
        order.status = OrderStatus::Pending;
        order
    }
}
