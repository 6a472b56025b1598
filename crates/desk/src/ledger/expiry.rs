//! Expiry classification for pending orders.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stockroom_core::{ExpiryTier, Order};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Where an order stands relative to its expiry date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryStatus {
    pub tier: ExpiryTier,
    /// Whole days left, rounded up. Zero once expired.
    pub days_remaining: i64,
    /// Fill level for a progress bar, in `[0, 100]`.
    pub progress_percentage: f64,
}

impl ExpiryStatus {
    /// Short label such as `Critical (3d)`.
    #[must_use]
    pub fn label(&self) -> String {
        match self.tier {
            ExpiryTier::Expired => self.tier.to_string(),
            _ => format!("{} ({}d)", self.tier, self.days_remaining),
        }
    }
}

/// Classify an expiry timestamp at `now`.
///
/// Days remaining are the elapsed time rounded up to whole days, so an
/// order expiring in one hour still has one day left.
#[must_use]
pub fn classify(expiry: DateTime<Utc>, now: DateTime<Utc>) -> ExpiryStatus {
    let days = days_until(expiry, now);

    let (tier, window) = match days {
        ..=0 => {
            return ExpiryStatus {
                tier: ExpiryTier::Expired,
                days_remaining: 0,
                progress_percentage: 0.0,
            };
        }
        1..=5 => (ExpiryTier::Critical, 5.0),
        6..=10 => (ExpiryTier::Warning, 10.0),
        _ => (ExpiryTier::Normal, 30.0),
    };

    #[allow(clippy::cast_precision_loss)]
    let percentage = (days as f64 * 100.0 / window).clamp(0.0, 100.0);

    ExpiryStatus {
        tier,
        days_remaining: days,
        progress_percentage: percentage,
    }
}

fn days_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (expiry - now).num_milliseconds();
    // Integer division truncates toward zero, which is already the ceiling
    // for negative spans.
    let whole = millis / MILLIS_PER_DAY;
    if millis % MILLIS_PER_DAY > 0 {
        whole + 1
    } else {
        whole
    }
}

/// Classify an order, or `None` if it has no expiry date.
#[must_use]
pub fn for_order(order: &Order, now: DateTime<Utc>) -> Option<ExpiryStatus> {
    order.expiry_date.map(|expiry| classify(expiry, now))
}

/// Sort orders so the most urgent come first.
///
/// Orders without an expiry date rank as `Normal`. Within a tier, fewer days
/// remaining sorts first; the sort is stable otherwise.
pub fn sort_by_expiry(orders: &mut [Order], now: DateTime<Utc>) {
    orders.sort_by_cached_key(|order| match for_order(order, now) {
        Some(status) => (status.tier, status.days_remaining),
        None => (ExpiryTier::Normal, i64::MAX),
    });
}
