//! Integration tests for Stockroom.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p stockroom-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `order_lifecycle` - Fulfillment, billing merge, retention and sync end to end
//! - `quantity_properties` - Conservation and additivity of reconciliation
//! - `expiry` - Expiry tiers and ordering
//!
//! Everything runs against the in-memory remote store and cache; no
//! database or network is needed.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use stockroom_core::{FlatItem, Order, OrderId, OrderItem};
use stockroom_desk::DeskState;
use stockroom_desk::cache::MemoryOrderCache;
use stockroom_desk::remote::{MemoryRemoteStore, PathUpdates, RemoteStore};

/// Desk state over the in-memory collaborators.
pub type TestDesk = DeskState<MemoryRemoteStore, MemoryOrderCache>;

/// Fresh in-memory desk with the default 15 minute sync interval.
#[must_use]
pub fn desk() -> TestDesk {
    DeskState::new(
        MemoryRemoteStore::new(),
        MemoryOrderCache::new(),
        Duration::from_secs(15 * 60),
    )
}

/// A fixed UTC timestamp.
///
/// # Panics
///
/// Panics if the date is not valid.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

/// A flat item with one color.
#[must_use]
pub fn flat(name: &str, color: &str, sizes: &[(&str, u32)]) -> OrderItem {
    FlatItem::new(
        name,
        color,
        sizes.iter().map(|(size, qty)| ((*size).to_string(), *qty)),
    )
    .into()
}

/// A pending order.
#[must_use]
pub fn order(id: &str, number: &str, party: &str, placed: DateTime<Utc>, items: Vec<OrderItem>) -> Order {
    Order::new(OrderId::new(id), number, party, placed, items)
}

/// Write a raw record at `path`, as another client would.
///
/// # Panics
///
/// Panics if the path is invalid.
#[allow(clippy::unwrap_used)]
pub async fn seed_raw(desk: &TestDesk, path: &str, record: Value) {
    let mut updates = PathUpdates::new();
    updates.insert(path.to_string(), Some(record));
    desk.remote().update(updates).await.unwrap();
}
