//! Turning raw SRQ entries into a fulfillment map.

use serde::{Deserialize, Serialize};
use tracing::warn;

use stockroom_core::{FulfillmentMap, Order, parse_quantity};

/// One SRQ value as typed by staff for an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrqEntry {
    pub item: String,
    pub color: String,
    pub size: String,
    /// Raw input text; anything non-numeric counts as zero.
    pub raw: String,
}

impl SrqEntry {
    #[must_use]
    pub fn new(
        item: impl Into<String>,
        color: impl Into<String>,
        size: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            item: item.into(),
            color: color.into(),
            size: size.into(),
            raw: raw.into(),
        }
    }
}

/// Build the fulfillment map for `order` from raw entries.
///
/// Each value is parsed leniently and clamped to the quantity ordered for
/// its line, so the result never asks for more than the order holds. When
/// the same line is entered twice the last entry wins. Entries for lines the
/// order does not contain are skipped.
#[must_use]
pub fn extract<'a, I>(order: &Order, entries: I) -> FulfillmentMap
where
    I: IntoIterator<Item = &'a SrqEntry>,
{
    let mut map = FulfillmentMap::new();

    for entry in entries {
        let ordered = order.ordered_quantity(&entry.item, &entry.color, &entry.size);
        if ordered == 0 {
            warn!(
                order_id = %order.id,
                item = %entry.item,
                color = %entry.color,
                size = %entry.size,
                "SRQ entry for a line the order does not contain, skipping"
            );
            continue;
        }

        let requested = parse_quantity(&entry.raw).min(ordered);
        map.set(&entry.item, &entry.color, &entry.size, requested);
    }

    map
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use stockroom_core::{FlatItem, OrderId};

    use super::*;

    fn order() -> Order {
        Order::new(
            OrderId::new("o-1"),
            "1042",
            "Acme",
            Utc::now(),
            vec![
                FlatItem::new("Shirt", "Red", [("M".to_string(), 10), ("L".to_string(), 2)])
                    .into(),
            ],
        )
    }

    #[test]
    fn test_values_are_clamped_to_ordered() {
        let entries = [
            SrqEntry::new("Shirt", "Red", "M", "4"),
            SrqEntry::new("Shirt", "Red", "L", "9"),
        ];
        let map = extract(&order(), &entries);

        assert_eq!(map.get("Shirt", "Red", "M"), 4);
        assert_eq!(map.get("Shirt", "Red", "L"), 2);
    }

    #[test]
    fn test_non_numeric_reads_as_zero() {
        let entries = [
            SrqEntry::new("Shirt", "Red", "M", "abc"),
            SrqEntry::new("Shirt", "Red", "L", "-3"),
        ];
        assert!(extract(&order(), &entries).is_empty());
    }

    #[test]
    fn test_last_entry_wins() {
        let entries = [
            SrqEntry::new("Shirt", "Red", "M", "4"),
            SrqEntry::new("Shirt", "Red", "M", "0"),
        ];
        assert!(extract(&order(), &entries).is_empty());
    }

    #[test]
    fn test_unknown_lines_are_skipped() {
        let entries = [
            SrqEntry::new("Shirt", "Blue", "M", "4"),
            SrqEntry::new("Cap", "Red", "M", "1"),
            SrqEntry::new("Shirt", "Red", "M", " 3 "),
        ];
        let map = extract(&order(), &entries);

        assert_eq!(map.total(), 3);
        assert_eq!(map.lines().count(), 1);
    }
}
