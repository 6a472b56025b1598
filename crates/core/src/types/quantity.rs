//! Quantity grids keyed by color and size.
//!
//! Records written by older clients sometimes carry quantities as strings
//! (`"12"`) or garbage. Reading applies the same rule as staff input: the
//! leading integer is taken, anything non-numeric or negative reads as 0.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

/// Mapping from size to quantity.
pub type SizeQuantities = BTreeMap<String, u32>;

/// Mapping from color to size to quantity.
pub type ColorSizes = BTreeMap<String, SizeQuantities>;

/// Parse a quantity the way staff input is read.
///
/// Takes the leading integer of the trimmed input; returns 0 for
/// non-numeric or negative input and saturates at `u32::MAX`.
///
/// ```
/// use stockroom_core::parse_quantity;
///
/// assert_eq!(parse_quantity("12"), 12);
/// assert_eq!(parse_quantity(" 7 pcs"), 7);
/// assert_eq!(parse_quantity("abc"), 0);
/// assert_eq!(parse_quantity("-3"), 0);
/// ```
#[must_use]
pub fn parse_quantity(raw: &str) -> u32 {
    let trimmed = raw.trim();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, trimmed.get(1..).unwrap_or("")),
        Some(b'+') => (false, trimmed.get(1..).unwrap_or("")),
        _ => (false, trimmed),
    };

    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if negative || digits.is_empty() {
        return 0;
    }

    digits.parse::<u64>().map_or(u32::MAX, |value| {
        u32::try_from(value).unwrap_or(u32::MAX)
    })
}

/// Sum of all quantities in a size map.
#[must_use]
pub fn size_total(sizes: &SizeQuantities) -> u32 {
    sizes.values().copied().fold(0, u32::saturating_add)
}

/// Sum of all quantities in a color grid.
#[must_use]
pub fn grid_total(colors: &ColorSizes) -> u32 {
    colors.values().map(size_total).fold(0, u32::saturating_add)
}

/// Drop zero quantities and colors left without sizes.
pub fn prune_grid(colors: &mut ColorSizes) {
    for sizes in colors.values_mut() {
        sizes.retain(|_, qty| *qty > 0);
    }
    colors.retain(|_, sizes| !sizes.is_empty());
}

fn value_to_quantity(value: &serde_json::Value) -> u32 {
    match value {
        serde_json::Value::Number(n) => n.as_u64().map_or_else(
            || {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f > 0.0)
                    .map_or(0, |f| parse_quantity(&f.trunc().to_string()))
            },
            |v| u32::try_from(v).unwrap_or(u32::MAX),
        ),
        serde_json::Value::String(s) => parse_quantity(s),
        _ => 0,
    }
}

/// Deserialize a size map whose values may be numbers or numeric strings.
pub(crate) fn lenient_sizes<'de, D>(deserializer: D) -> Result<SizeQuantities, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(size, value)| {
            let qty = value_to_quantity(&value);
            (size, qty)
        })
        .collect())
}

/// Optional variant of [`lenient_sizes`].
pub(crate) fn lenient_sizes_opt<'de, D>(deserializer: D) -> Result<Option<SizeQuantities>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw.map(|map| {
        map.into_iter()
            .map(|(size, value)| {
                let qty = value_to_quantity(&value);
                (size, qty)
            })
            .collect()
    }))
}

/// Deserialize a color grid whose leaf values may be numbers or numeric strings.
pub(crate) fn lenient_grid<'de, D>(deserializer: D) -> Result<ColorSizes, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, BTreeMap<String, serde_json::Value>>>::deserialize(
        deserializer,
    )?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(color, sizes)| {
            let sizes = sizes
                .into_iter()
                .map(|(size, value)| {
                    let qty = value_to_quantity(&value);
                    (size, qty)
                })
                .collect();
            (color, sizes)
        })
        .collect())
}

/// Deserialize a quantity that may be a number or numeric string.
pub(crate) fn lenient_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().map_or(0, value_to_quantity))
}
