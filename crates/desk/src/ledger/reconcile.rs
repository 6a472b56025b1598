//! Order reconciliation and billing merge.
//!
//! A fulfillment event splits a pending order in two: the quantities that
//! stay pending and the quantities that move to billing. Billing quantities
//! either start a new billing order or are summed into the billing order
//! already opened for the same order number on the same calendar day.
//!
//! Everything here is pure. Persisting the result is the caller's job and
//! must write the updated order and the billing order in one update.

use chrono::{DateTime, Utc};
use tracing::warn;

use stockroom_core::{BillingOrder, BillingOrderId, FulfillmentMap, NestedItem, Order, OrderItem};

/// Result of splitting an order against a fulfillment map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// The order with only its remaining quantities.
    pub remaining: Order,
    /// Billed quantities grouped by item name, in order of first appearance.
    pub billed: Vec<NestedItem>,
    /// Requested quantities that matched no ordered line.
    pub unmatched: FulfillmentMap,
}

impl Split {
    /// Total quantity moved to billing.
    #[must_use]
    pub fn billed_quantity(&self) -> u32 {
        self.billed
            .iter()
            .map(|item| item.total_quantity)
            .fold(0, u32::saturating_add)
    }
}

/// Result of a full reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Pending order holding what was not fulfilled.
    pub updated_order: Order,
    /// New or merged billing order.
    pub billing_order: BillingOrder,
    /// Whether `billing_order` is an existing bill that was merged into.
    pub merged: bool,
    /// Quantity billed by this event.
    pub billed_quantity: u32,
}

/// Split `order` into remaining and billed quantities.
///
/// Each ordered `(name, color, size)` line gives up at most its own quantity,
/// so remaining quantities never go negative. A request larger than the line
/// bills only what the line holds; the excess, and requests for lines the
/// order does not have, are returned in [`Split::unmatched`] and logged.
/// Fully fulfilled lines and items left without lines are dropped.
#[must_use]
pub fn split_order(order: &Order, fulfillment: &FulfillmentMap) -> Split {
    let mut outstanding = fulfillment.clone();
    let mut remaining_items = Vec::with_capacity(order.items.len());
    let mut billed: Vec<NestedItem> = Vec::new();

    for item in &order.items {
        let source = item.to_nested();
        let mut kept = NestedItem::new(source.name.as_str());

        for (color, size, ordered) in source.lines() {
            let requested = outstanding.take(&source.name, color, size, ordered);
            kept.add(color, size, ordered - requested);

            if requested > 0 {
                billed_item(&mut billed, &source.name).add(color, size, requested);
            }
        }

        if !kept.is_empty() {
            remaining_items.push(OrderItem::Nested(kept));
        }
    }

    for (name, color, size, qty) in outstanding.lines() {
        warn!(
            order_id = %order.id,
            item = name,
            color,
            size,
            qty,
            "Requested quantity does not match an ordered line, ignoring"
        );
    }

    let mut remaining = order.clone();
    remaining.items = remaining_items;
    remaining.recompute_total();

    Split {
        remaining,
        billed,
        unmatched: outstanding,
    }
}

fn billed_item<'a>(billed: &'a mut Vec<NestedItem>, name: &str) -> &'a mut NestedItem {
    let index = match billed.iter().position(|item| item.name == name) {
        Some(index) => index,
        None => {
            billed.push(NestedItem::new(name));
            billed.len() - 1
        }
    };
    #[allow(clippy::indexing_slicing)] // index was just found or pushed
    let item = &mut billed[index];
    item
}

/// Sum `billed` into a copy of `existing`.
///
/// Line quantities are added to what the bill already holds; item and order
/// totals grow by the newly billed amount only.
#[must_use]
pub fn merge_into(existing: &BillingOrder, billed: &[NestedItem]) -> BillingOrder {
    let mut merged = existing.clone();

    for item in billed {
        let target = merged.item_mut(&item.name);
        let mut added = 0u32;
        for (color, size, qty) in item.lines() {
            target.add(color, size, qty);
            added = added.saturating_add(qty);
        }
        merged.total_quantity = merged.total_quantity.saturating_add(added);
    }

    merged
}

/// Start a new billing order for `order` from `billed`.
#[must_use]
pub fn new_billing_order(order: &Order, billed: Vec<NestedItem>, now: DateTime<Utc>) -> BillingOrder {
    let mut bill = BillingOrder::new(
        BillingOrderId::generate(),
        order.order_number.as_str(),
        order.party_name.as_str(),
        now,
    );
    bill.date_time = Some(order.date_time);
    bill.expiry_date = order.expiry_date;
    bill.total_quantity = billed
        .iter()
        .map(|item| item.total_quantity)
        .fold(0, u32::saturating_add);
    bill.items = billed;
    bill.note_source(&order.id);
    bill
}

/// Find the billing order a fulfillment of `order_number` at `now` merges into.
///
/// Matches on order number and the UTC calendar day of `sobDate`. When
/// several bills match, the one with the latest `sobDate` wins, and among
/// equal timestamps the last in key order. Orders without a number never
/// merge.
#[must_use]
pub fn find_merge_target<'a>(
    candidates: &'a [BillingOrder],
    order_number: &str,
    now: DateTime<Utc>,
) -> Option<&'a BillingOrder> {
    if order_number.trim().is_empty() {
        return None;
    }
    let day = now.date_naive();
    candidates
        .iter()
        .filter(|bill| bill.is_merge_target(order_number, day))
        .max_by_key(|bill| bill.sob_date)
}

/// Reconcile a pending order against a fulfillment map.
///
/// Returns the updated pending order and the billing order to upsert. When
/// `existing` is given the billed quantities are merged into it, otherwise a
/// new billing order with a fresh id and `sobDate = now` is created.
#[must_use]
pub fn reconcile(
    order: &Order,
    fulfillment: &FulfillmentMap,
    existing: Option<&BillingOrder>,
    now: DateTime<Utc>,
) -> Reconciliation {
    let split = split_order(order, fulfillment);
    let billed_quantity = split.billed_quantity();

    let (billing_order, merged) = match existing {
        Some(existing) => {
            let mut bill = merge_into(existing, &split.billed);
            bill.note_source(&order.id);
            (bill, true)
        }
        None => (new_billing_order(order, split.billed, now), false),
    };

    Reconciliation {
        updated_order: split.remaining,
        billing_order,
        merged,
        billed_quantity,
    }
}
