//! CLI command implementations.

pub mod classify;
pub mod migrate;
pub mod orders;
pub mod retention;
pub mod sync;

use stockroom_desk::cache::{PgOrderCache, create_pool};
use stockroom_desk::remote::HttpRemoteStore;
use stockroom_desk::{ConfigError, DeskConfig, DeskError, DeskState};
use thiserror::Error;

/// Errors that can occur while running an order command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A desk operation failed.
    #[error(transparent)]
    Desk(#[from] DeskError),

    /// A command-line argument could not be understood.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// State for one command, backed by the configured remote store and cache.
pub type CliState = DeskState<HttpRemoteStore, PgOrderCache>;

/// Load configuration and connect to both stores.
pub async fn connect() -> Result<CliState, CommandError> {
    let config = DeskConfig::from_env()?;

    tracing::info!("Connecting to desk database...");
    let pool = create_pool(&config.database_url).await?;

    let remote = HttpRemoteStore::new(&config.remote).map_err(DeskError::from)?;
    Ok(DeskState::new(remote, PgOrderCache::new(pool), config.sync_interval))
}
