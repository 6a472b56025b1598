//! Order line items in their two stored shapes.
//!
//! Orders arrive from the order source with *flat* items (one color per
//! item, sizes mapped to quantities). Billing records and orders that have
//! already been through a fulfillment event carry *nested* items (colors
//! mapped to sizes mapped to quantities). [`OrderItem`] makes the shape
//! explicit; [`OrderItem::to_nested`] is the normalization step used
//! wherever the two meet.

use serde::{Deserialize, Deserializer, Serialize};

use super::quantity::{
    ColorSizes, SizeQuantities, grid_total, lenient_grid, lenient_quantity, lenient_sizes,
    lenient_sizes_opt, prune_grid, size_total,
};

/// Color used for flat items that do not name one.
pub const DEFAULT_COLOR: &str = "N/A";

/// A line item as received from the order source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatItem {
    /// Item (design) name.
    pub name: String,
    /// Item color, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Ordered quantity per size.
    #[serde(default, deserialize_with = "lenient_sizes")]
    pub quantities: SizeQuantities,
    /// Staff-entered removal quantity per size, saved between sessions.
    #[serde(
        default,
        deserialize_with = "lenient_sizes_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub srq: Option<SizeQuantities>,
}

impl FlatItem {
    /// Create a flat item with the given color and size quantities.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        color: impl Into<String>,
        quantities: impl IntoIterator<Item = (String, u32)>,
    ) -> Self {
        Self {
            name: name.into(),
            color: Some(color.into()),
            quantities: quantities.into_iter().collect(),
            srq: None,
        }
    }

    /// The item's color, falling back to [`DEFAULT_COLOR`].
    #[must_use]
    pub fn color(&self) -> &str {
        self.color
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_COLOR)
    }

    /// Total ordered quantity.
    #[must_use]
    pub fn total(&self) -> u32 {
        size_total(&self.quantities)
    }
}

/// A line item grouped by color, as stored in billing and merged records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedItem {
    /// Item (design) name.
    pub name: String,
    /// Quantity per color and size.
    #[serde(default, deserialize_with = "lenient_grid")]
    pub colors: ColorSizes,
    /// Sum of all quantities in `colors`.
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub total_quantity: u32,
}

impl NestedItem {
    /// Create an empty nested item.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            colors: ColorSizes::new(),
            total_quantity: 0,
        }
    }

    /// Add `qty` to the `(color, size)` line and to the item total.
    ///
    /// Zero quantities are ignored so that absent and zero stay equivalent.
    pub fn add(&mut self, color: &str, size: &str, qty: u32) {
        if qty == 0 {
            return;
        }
        let line = self
            .colors
            .entry(color.to_owned())
            .or_default()
            .entry(size.to_owned())
            .or_insert(0);
        *line = line.saturating_add(qty);
        self.total_quantity = self.total_quantity.saturating_add(qty);
    }

    /// Quantity stored for a `(color, size)` line.
    #[must_use]
    pub fn quantity(&self, color: &str, size: &str) -> u32 {
        self.colors
            .get(color)
            .and_then(|sizes| sizes.get(size))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of all line quantities, ignoring the stored total.
    #[must_use]
    pub fn computed_total(&self) -> u32 {
        grid_total(&self.colors)
    }

    /// Whether the item has no positive lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.computed_total() == 0
    }

    /// Iterate over `(color, size, quantity)` lines with positive quantity.
    pub fn lines(&self) -> impl Iterator<Item = (&str, &str, u32)> {
        self.colors.iter().flat_map(|(color, sizes)| {
            sizes
                .iter()
                .filter(|(_, qty)| **qty > 0)
                .map(move |(size, qty)| (color.as_str(), size.as_str(), *qty))
        })
    }
}

/// A line item in either stored shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OrderItem {
    /// Single-color item as received from the order source.
    Flat(FlatItem),
    /// Color-grouped item as written after a fulfillment event.
    Nested(NestedItem),
}

impl<'de> Deserialize<'de> for OrderItem {
    /// Records carrying a `colors` object are nested; everything else is flat.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let nested = value
            .as_object()
            .is_some_and(|obj| obj.get("colors").is_some_and(serde_json::Value::is_object));

        if nested {
            serde_json::from_value(value)
                .map(Self::Nested)
                .map_err(serde::de::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(Self::Flat)
                .map_err(serde::de::Error::custom)
        }
    }
}

impl OrderItem {
    /// The item name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Flat(item) => &item.name,
            Self::Nested(item) => &item.name,
        }
    }

    /// Total quantity across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        match self {
            Self::Flat(item) => item.total(),
            Self::Nested(item) => item.computed_total(),
        }
    }

    /// Ordered quantity for a `(color, size)` line of this item.
    #[must_use]
    pub fn quantity(&self, color: &str, size: &str) -> u32 {
        match self {
            Self::Flat(item) if item.color() == color => {
                item.quantities.get(size).copied().unwrap_or(0)
            }
            Self::Flat(_) => 0,
            Self::Nested(item) => item.quantity(color, size),
        }
    }

    /// Normalize into the nested shape.
    ///
    /// Preserves every `(name, color, size, quantity)` tuple with a positive
    /// quantity; zero lines are dropped and the total is recomputed.
    #[must_use]
    pub fn to_nested(&self) -> NestedItem {
        match self {
            Self::Flat(item) => {
                let mut colors = ColorSizes::new();
                colors.insert(item.color().to_owned(), item.quantities.clone());
                prune_grid(&mut colors);
                NestedItem {
                    name: item.name.clone(),
                    total_quantity: grid_total(&colors),
                    colors,
                }
            }
            Self::Nested(item) => {
                let mut colors = item.colors.clone();
                prune_grid(&mut colors);
                NestedItem {
                    name: item.name.clone(),
                    total_quantity: grid_total(&colors),
                    colors,
                }
            }
        }
    }
}

impl From<FlatItem> for OrderItem {
    fn from(item: FlatItem) -> Self {
        Self::Flat(item)
    }
}

impl From<NestedItem> for OrderItem {
    fn from(item: NestedItem) -> Self {
        Self::Nested(item)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shirt() -> FlatItem {
        FlatItem::new(
            "Shirt",
            "Red",
            [("M".to_string(), 10), ("L".to_string(), 0), ("S".to_string(), 3)],
        )
    }

    #[test]
    fn test_flat_to_nested_preserves_lines() {
        let nested = OrderItem::from(shirt()).to_nested();

        assert_eq!(nested.name, "Shirt");
        assert_eq!(nested.quantity("Red", "M"), 10);
        assert_eq!(nested.quantity("Red", "S"), 3);
        assert!(!nested.colors["Red"].contains_key("L"));
        assert_eq!(nested.total_quantity, 13);
    }

    #[test]
    fn test_missing_color_normalizes_to_default() {
        let item = FlatItem {
            name: "Cap".to_string(),
            color: None,
            quantities: [("Free".to_string(), 2)].into_iter().collect(),
            srq: None,
        };
        let nested = OrderItem::Flat(item).to_nested();
        assert_eq!(nested.quantity(DEFAULT_COLOR, "Free"), 2);
    }

    #[test]
    fn test_deserialize_picks_shape_from_colors_key() {
        let flat: OrderItem =
            serde_json::from_str(r#"{"name": "Shirt", "color": "Red", "quantities": {"M": "4"}}"#)
                .unwrap();
        assert!(matches!(flat, OrderItem::Flat(_)));
        assert_eq!(flat.quantity("Red", "M"), 4);

        let nested: OrderItem = serde_json::from_str(
            r#"{"name": "Shirt", "colors": {"Red": {"M": 6}}, "totalQuantity": 6}"#,
        )
        .unwrap();
        assert!(matches!(nested, OrderItem::Nested(_)));
        assert_eq!(nested.quantity("Red", "M"), 6);
    }

    #[test]
    fn test_flat_quantity_requires_matching_color() {
        let item = OrderItem::from(shirt());
        assert_eq!(item.quantity("Red", "M"), 10);
        assert_eq!(item.quantity("Blue", "M"), 0);
    }

    #[test]
    fn test_nested_add_ignores_zero() {
        let mut item = NestedItem::new("Shirt");
        item.add("Red", "M", 0);
        assert!(item.colors.is_empty());

        item.add("Red", "M", 4);
        item.add("Red", "M", 2);
        assert_eq!(item.quantity("Red", "M"), 6);
        assert_eq!(item.total_quantity, 6);
        assert_eq!(item.lines().count(), 1);
    }

    #[test]
    fn test_serialize_keeps_wire_shape() {
        let json = serde_json::to_value(OrderItem::from(shirt())).unwrap();
        assert_eq!(json["color"], "Red");
        assert_eq!(json["quantities"]["M"], 10);
        assert!(json.get("srq").is_none());
    }
}
