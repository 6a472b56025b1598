//! Remote realtime store.
//!
//! The remote store is a JSON tree addressed by slash-separated paths, in the
//! shape of the Firebase Realtime Database the desk shares with the order
//! entry app:
//!
//! - `orders/<id>` - pending orders
//! - `billingOrders/<id>` - billing orders
//! - `deletedOrders/<id>` - soft-deleted orders awaiting purge
//!
//! [`RemoteStore`] is the untyped seam; [`OrderRecords`] is the typed view
//! services work with.

pub mod http;
pub mod memory;
pub mod records;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

pub use http::HttpRemoteStore;
pub use memory::MemoryRemoteStore;
pub use records::{BILLING_ORDERS, DELETED_ORDERS, ORDERS, OrderRecords};

/// Multi-path update: path to new value, `None` deletes the node.
pub type PathUpdates = BTreeMap<String, Option<Value>>;

/// A child that appeared under a watched path.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildEvent {
    pub key: String,
    pub value: Value,
}

/// Errors that can occur when talking to the remote store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("remote store returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Failed to parse a response or record.
    #[error("parse error: {0}")]
    Parse(String),

    /// A path is empty or contains characters the store rejects.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    /// The store URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Event stream error.
    #[error("stream error: {0}")]
    Stream(String),
}

/// JSON tree store with atomic multi-path updates.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Read the value at `path`, `None` if absent.
    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError>;

    /// Children of `path` whose `child` field equals `value`, keyed and
    /// ordered by child key.
    async fn query_equal(
        &self,
        path: &str,
        child: &str,
        value: &Value,
    ) -> Result<BTreeMap<String, Value>, RemoteError>;

    /// Append `value` under `path` with a generated, time-ordered key.
    async fn push(&self, path: &str, value: Value) -> Result<String, RemoteError>;

    /// Apply every path in `updates` at once, or none of them.
    async fn update(&self, updates: PathUpdates) -> Result<(), RemoteError>;

    /// Watch `path` for new children.
    ///
    /// Children present when the subscription starts are delivered first.
    /// The channel closes when the subscription can no longer deliver.
    async fn subscribe_child_added(
        &self,
        path: &str,
    ) -> Result<mpsc::UnboundedReceiver<ChildEvent>, RemoteError>;
}

/// Split a path into segments, rejecting empty paths and reserved characters.
///
/// # Errors
///
/// Returns `RemoteError::InvalidPath` for an empty path, an empty segment, or
/// a segment containing `.`, `$`, `#`, `[` or `]`.
pub fn split_path(path: &str) -> Result<Vec<&str>, RemoteError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(RemoteError::InvalidPath(path.to_owned()));
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    let invalid = segments.iter().any(|segment| {
        segment.is_empty() || segment.contains(['.', '$', '#', '[', ']'])
    });
    if invalid {
        return Err(RemoteError::InvalidPath(path.to_owned()));
    }
    Ok(segments)
}

/// Join path segments with `/`.
#[must_use]
pub fn join_path(segments: &[&str]) -> String {
    segments.join("/")
}
