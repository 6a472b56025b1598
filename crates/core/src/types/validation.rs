//! Validation errors for records crossing a persistence boundary.

/// A record failed validation before being persisted.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The record has no identifier.
    #[error("order is missing an identifier")]
    MissingId,
    /// A delete was requested without a reason.
    #[error("a delete reason is required")]
    EmptyReason,
    /// A fulfillment event would not bill any quantity.
    #[error("nothing to fulfill for order {0}")]
    NothingToFulfill(String),
}
