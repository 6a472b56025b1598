//! Stockroom Core - Shared types library.
//!
//! This crate provides the record types used across all Stockroom components:
//! - `desk` - Reconciliation engine, retention, sync and store collaborators
//! - `cli` - Command-line tools for migrations and order management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Order, billing and deleted-order records, item shapes,
//!   fulfillment maps, type-safe IDs and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
