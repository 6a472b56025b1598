//! In-progress SRQ input, owned by whoever drives the fulfillment screen.

use std::collections::{BTreeMap, HashMap};

use stockroom_core::{FulfillmentMap, Order, OrderId, OrderItem};

use super::extract::{SrqEntry, extract};

type LineKey = (String, String, String);

/// Raw SRQ entries per order, kept until the order is fulfilled.
#[derive(Debug, Default, Clone)]
pub struct FulfillmentSession {
    orders: HashMap<OrderId, BTreeMap<LineKey, String>>,
}

impl FulfillmentSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw value for one line, replacing any earlier value.
    pub fn record(&mut self, order_id: &OrderId, entry: SrqEntry) {
        self.orders
            .entry(order_id.clone())
            .or_default()
            .insert((entry.item, entry.color, entry.size), entry.raw);
    }

    /// Prefill entries from the SRQ values saved on the order's flat items.
    ///
    /// Values already typed in this session are kept.
    pub fn seed_from_order(&mut self, order: &Order) {
        let lines = self.orders.entry(order.id.clone()).or_default();

        for item in &order.items {
            let OrderItem::Flat(flat) = item else {
                continue;
            };
            let Some(srq) = &flat.srq else {
                continue;
            };
            for (size, qty) in srq {
                lines
                    .entry((flat.name.clone(), flat.color().to_owned(), size.clone()))
                    .or_insert_with(|| qty.to_string());
            }
        }
    }

    /// Entries recorded for an order, in line order.
    #[must_use]
    pub fn entries_for(&self, order_id: &OrderId) -> Vec<SrqEntry> {
        self.orders
            .get(order_id)
            .map(|lines| {
                lines
                    .iter()
                    .map(|((item, color, size), raw)| SrqEntry::new(item, color, size, raw))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Clamped fulfillment map for `order` from the recorded entries.
    #[must_use]
    pub fn fulfillment_for(&self, order: &Order) -> FulfillmentMap {
        extract(order, &self.entries_for(&order.id))
    }

    /// Forget everything recorded for an order.
    pub fn clear(&mut self, order_id: &OrderId) {
        self.orders.remove(order_id);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.values().all(BTreeMap::is_empty)
    }
}
