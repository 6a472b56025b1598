//! Local order cache.
//!
//! The cache mirrors the remote store's pending orders so lists render
//! without a round trip. The remote store stays the source of truth; the
//! cache is rebuilt on every sync.
//!
//! # Implementations
//!
//! - [`PgOrderCache`] - `PostgreSQL` table `stockroom.order_cache`, one JSONB
//!   record per order
//! - [`MemoryOrderCache`] - process-local map, for tests and dry runs
//!
//! # Migrations
//!
//! Migrations are stored in `crates/desk/migrations/` and run via:
//! ```bash
//! cargo run -p stockroom-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use stockroom_core::{Order, OrderId, OrderStatus, ValidationError};

pub use memory::MemoryOrderCache;
pub use postgres::{MIGRATOR, PgOrderCache, create_pool};

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying migrations failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record was rejected before being written.
    #[error("invalid record: {0}")]
    Validation(#[from] ValidationError),

    /// Data in the cache is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Keyed store of order records.
///
/// Writes are all-or-nothing per call: if any order in a batch fails
/// validation, nothing is written.
#[async_trait]
pub trait OrderCache: Send + Sync + 'static {
    /// Fetch one order.
    async fn get(&self, id: &OrderId) -> Result<Option<Order>, CacheError>;

    /// Insert or replace orders by id.
    ///
    /// Returns `CacheError::Validation` if any order has an empty id.
    async fn put(&self, orders: &[Order]) -> Result<(), CacheError>;

    /// All cached orders with the given status.
    async fn all_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, CacheError>;

    /// Replace every cached pending order with `orders`.
    ///
    /// Orders in other statuses are left alone.
    async fn replace_pending(&self, orders: &[Order]) -> Result<(), CacheError>;

    /// Remove one order. Returns whether it was present.
    async fn remove(&self, id: &OrderId) -> Result<bool, CacheError>;
}

/// Validate a batch before any of it is written.
pub(crate) fn validate_all(orders: &[Order]) -> Result<(), CacheError> {
    for order in orders {
        order.validate()?;
    }
    Ok(())
}
