//! Stockroom desk library.
//!
//! The desk moves garment orders through their lifecycle against a shared
//! realtime store:
//!
//! - `ledger` - Pure reconciliation, extraction, expiry and grouping logic
//! - `remote` - The realtime store (Firebase REST or in-memory) and typed records
//! - `cache` - Local order cache (`PostgreSQL` or in-memory)
//! - `services` - Fulfillment, retention and sync built on the above
//!
//! All writes go to the remote store first; the cache follows.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod error;
pub mod ledger;
pub mod remote;
pub mod services;
pub mod state;

pub use config::{ConfigError, DeskConfig, RemoteStoreConfig};
pub use error::DeskError;
pub use state::DeskState;
