//! Pure order bookkeeping: reconciliation, expiry, SRQ input and list views.
//!
//! Nothing in this module performs I/O. Services load records, hand them to
//! these functions and persist what comes back.

pub mod expiry;
pub mod extract;
pub mod reconcile;
pub mod session;
pub mod views;

pub use expiry::{ExpiryStatus, classify, sort_by_expiry};
pub use extract::{SrqEntry, extract};
pub use reconcile::{Reconciliation, Split, find_merge_target, reconcile, split_order};
pub use session::FulfillmentSession;
