//! Business logic services for the desk.
//!
//! # Services
//!
//! - `fulfillment` - Send fulfilled quantities to billing, mark orders for billing
//! - `retention` - Soft delete, revert and purge of pending orders
//! - `sync` - Rate-limited sync of pending orders into the local cache

pub mod fulfillment;
pub mod retention;
pub mod sync;

pub use fulfillment::FulfillmentService;
pub use retention::RetentionManager;
pub use sync::{SyncNotice, SyncOrchestrator, SyncOutcome};
