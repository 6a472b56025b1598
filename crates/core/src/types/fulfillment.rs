//! Fulfillment maps: quantities requested for fulfillment now.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::quantity::{ColorSizes, grid_total};

/// Requested quantity per item name, color and size.
///
/// Zero quantities are never stored, so absent and zero are the same line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FulfillmentMap(BTreeMap<String, ColorSizes>);

impl FulfillmentMap {
    /// Create an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Requested quantity for a line (0 if absent).
    #[must_use]
    pub fn get(&self, name: &str, color: &str, size: &str) -> u32 {
        self.0
            .get(name)
            .and_then(|colors| colors.get(color))
            .and_then(|sizes| sizes.get(size))
            .copied()
            .unwrap_or(0)
    }

    /// Set the requested quantity for a line; 0 removes it.
    pub fn set(&mut self, name: &str, color: &str, size: &str, qty: u32) {
        if qty == 0 {
            self.remove(name, color, size);
            return;
        }
        self.0
            .entry(name.to_owned())
            .or_default()
            .entry(color.to_owned())
            .or_default()
            .insert(size.to_owned(), qty);
    }

    /// Add to the requested quantity for a line.
    pub fn add(&mut self, name: &str, color: &str, size: &str, qty: u32) {
        let current = self.get(name, color, size);
        self.set(name, color, size, current.saturating_add(qty));
    }

    /// Take up to `max` from a line, returning the amount taken.
    pub fn take(&mut self, name: &str, color: &str, size: &str, max: u32) -> u32 {
        let current = self.get(name, color, size);
        let taken = current.min(max);
        if taken > 0 {
            self.set(name, color, size, current - taken);
        }
        taken
    }

    fn remove(&mut self, name: &str, color: &str, size: &str) {
        let Some(colors) = self.0.get_mut(name) else {
            return;
        };
        if let Some(sizes) = colors.get_mut(color) {
            sizes.remove(size);
            if sizes.is_empty() {
                colors.remove(color);
            }
        }
        if colors.is_empty() {
            self.0.remove(name);
        }
    }

    /// Sum of all requested quantities.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.0.values().map(grid_total).fold(0, u32::saturating_add)
    }

    /// Whether nothing is requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, color, size, qty)` lines.
    pub fn lines(&self) -> impl Iterator<Item = (&str, &str, &str, u32)> {
        self.0.iter().flat_map(|(name, colors)| {
            colors.iter().flat_map(move |(color, sizes)| {
                sizes
                    .iter()
                    .map(move |(size, qty)| (name.as_str(), color.as_str(), size.as_str(), *qty))
            })
        })
    }

    /// Line-wise sum of two maps.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        let mut combined = self.clone();
        for (name, color, size, qty) in other.lines() {
            combined.add(name, color, size, qty);
        }
        combined
    }
}

impl<N, C, S> FromIterator<(N, C, S, u32)> for FulfillmentMap
where
    N: AsRef<str>,
    C: AsRef<str>,
    S: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = (N, C, S, u32)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, color, size, qty) in iter {
            map.add(name.as_ref(), color.as_ref(), size.as_ref(), qty);
        }
        map
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_set_zero_removes_line() {
        let mut map = FulfillmentMap::new();
        map.set("Shirt", "Red", "M", 4);
        assert_eq!(map.get("Shirt", "Red", "M"), 4);

        map.set("Shirt", "Red", "M", 0);
        assert!(map.is_empty());
    }

    #[test]
    fn test_take_is_bounded() {
        let mut map: FulfillmentMap = [("Shirt", "Red", "M", 5)].into_iter().collect();

        assert_eq!(map.take("Shirt", "Red", "M", 3), 3);
        assert_eq!(map.get("Shirt", "Red", "M"), 2);
        assert_eq!(map.take("Shirt", "Red", "M", 10), 2);
        assert!(map.is_empty());
        assert_eq!(map.take("Pant", "Red", "M", 10), 0);
    }

    #[test]
    fn test_combine_sums_lines() {
        let a: FulfillmentMap = [("Shirt", "Red", "M", 4), ("Pant", "Black", "32", 1)]
            .into_iter()
            .collect();
        let b: FulfillmentMap = [("Shirt", "Red", "M", 6)].into_iter().collect();
        let combined = a.combine(&b);

        assert_eq!(combined.get("Shirt", "Red", "M"), 10);
        assert_eq!(combined.total(), 11);
        assert_eq!(combined.lines().count(), 2);
    }

    #[test]
    fn test_serde_shape() {
        let map: FulfillmentMap = [("Shirt", "Red", "M", 4)].into_iter().collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"Shirt":{"Red":{"M":4}}}"#);
    }
}
