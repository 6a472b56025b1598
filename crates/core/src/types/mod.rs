//! Core types for Stockroom.
//!
//! This module provides type-safe wrappers for orders, billing records and
//! the quantity grids they carry.

pub mod billing;
pub mod deleted;
pub mod fulfillment;
pub mod id;
pub mod item;
pub mod order;
pub mod quantity;
pub mod status;
pub mod validation;

pub use billing::BillingOrder;
pub use deleted::{
    DELETED_FROM_PENDING, DeletedOrder, PRESET_DELETE_REASONS, RETENTION_DAYS,
    compose_delete_reason,
};
pub use fulfillment::FulfillmentMap;
pub use id::*;
pub use item::{DEFAULT_COLOR, FlatItem, NestedItem, OrderItem};
pub use order::Order;
pub use quantity::{ColorSizes, SizeQuantities, grid_total, parse_quantity, size_total};
pub use status::*;
pub use validation::ValidationError;
