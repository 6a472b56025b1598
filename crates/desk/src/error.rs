//! Unified error handling for the desk.

use thiserror::Error;

use stockroom_core::ValidationError;

use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::remote::RemoteError;

/// Application-level error type for desk operations.
#[derive(Debug, Error)]
pub enum DeskError {
    /// Local cache operation failed.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Remote store operation failed.
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    /// Input was rejected before anything was written.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Record not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A sync attempt failed.
    #[error("Sync failed: {0}")]
    Sync(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DeskError {
    /// Whether the failure is on our side rather than the caller's.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Cache(_) | Self::Remote(_) | Self::Sync(_) | Self::Config(_)
        )
    }

    /// Log the error and, for server-side failures, capture it in Sentry.
    pub fn report(&self, context: &str) {
        if self.is_server_error() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "{context}"
            );
        } else {
            tracing::warn!(error = %self, "{context}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desk_error_display() {
        let err = DeskError::NotFound("order o-1".to_string());
        assert_eq!(err.to_string(), "Not found: order o-1");

        let err = DeskError::from(ValidationError::EmptyReason);
        assert_eq!(err.to_string(), "Invalid input: a delete reason is required");
    }

    #[test]
    fn test_server_errors() {
        assert!(DeskError::Sync("timeout".to_string()).is_server_error());
        assert!(DeskError::Remote(RemoteError::Stream("closed".to_string())).is_server_error());
        assert!(!DeskError::NotFound("x".to_string()).is_server_error());
        assert!(!DeskError::Validation(ValidationError::MissingId).is_server_error());
    }
}
