//! Status enums for orders and expiry tiers.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order record.
///
/// Serialized with the exact strings found in the remote tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Awaiting fulfillment.
    #[default]
    Pending,
    /// Flagged by staff as ready to bill, not yet fulfilled.
    #[serde(rename = "Waiting for Billing")]
    WaitingForBilling,
    /// Handed over to billing.
    #[serde(rename = "Sent to Billing")]
    SentToBilling,
    /// Accumulated billing record.
    #[serde(rename = "billing")]
    Billing,
}

impl OrderStatus {
    /// The string stored in the `status` field of a record.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::WaitingForBilling => "Waiting for Billing",
            Self::SentToBilling => "Sent to Billing",
            Self::Billing => "billing",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Waiting for Billing" => Ok(Self::WaitingForBilling),
            "Sent to Billing" => Ok(Self::SentToBilling),
            "billing" => Ok(Self::Billing),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Expiry tier of a pending order.
///
/// Variants are declared in display priority order, so the derived `Ord`
/// sorts expired orders first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryTier {
    /// Expiry has passed.
    Expired,
    /// Five days or fewer remain.
    Critical,
    /// Ten days or fewer remain.
    Warning,
    /// More than ten days remain.
    Normal,
}

impl std::fmt::Display for ExpiryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => write!(f, "Expired"),
            Self::Critical => write!(f, "Critical"),
            Self::Warning => write!(f, "Warning"),
            Self::Normal => write!(f, "Normal"),
        }
    }
}
