//! Grouping and filtering of order lists for display.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use stockroom_core::{Order, OrderStatus};

/// Orders placed on one day by one party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayPartyGroup {
    pub day: NaiveDate,
    pub party_name: String,
    pub orders: Vec<Order>,
}

impl DayPartyGroup {
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.orders
            .iter()
            .map(Order::computed_total)
            .fold(0, u32::saturating_add)
    }
}

/// Group orders by party name, parties in alphabetical order.
#[must_use]
pub fn group_by_party(orders: &[Order]) -> BTreeMap<String, Vec<Order>> {
    let mut groups: BTreeMap<String, Vec<Order>> = BTreeMap::new();
    for order in orders {
        groups
            .entry(order.party_name.clone())
            .or_default()
            .push(order.clone());
    }
    groups
}

/// Group orders by creation day (UTC) and party, newest day first.
#[must_use]
pub fn group_by_day_and_party(orders: &[Order]) -> Vec<DayPartyGroup> {
    let mut groups: BTreeMap<(Reverse<NaiveDate>, String), Vec<Order>> = BTreeMap::new();
    for order in orders {
        groups
            .entry((Reverse(order.date_time.date_naive()), order.party_name.clone()))
            .or_default()
            .push(order.clone());
    }

    groups
        .into_iter()
        .map(|((Reverse(day), party_name), orders)| DayPartyGroup {
            day,
            party_name,
            orders,
        })
        .collect()
}

/// Distinct party names with pending quantity left, for the party filter.
#[must_use]
pub fn party_names(orders: &[Order]) -> Vec<String> {
    orders
        .iter()
        .filter(|order| order.status == OrderStatus::Pending && order.computed_total() > 0)
        .map(|order| order.party_name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Keep orders whose party is selected. An empty selection keeps everything.
#[must_use]
pub fn filter_by_parties(orders: &[Order], selected: &[String]) -> Vec<Order> {
    if selected.is_empty() {
        return orders.to_vec();
    }
    orders
        .iter()
        .filter(|order| selected.iter().any(|party| party == order.party_name.trim()))
        .cloned()
        .collect()
}
