//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! sr-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `DESK_DATABASE_URL` - `PostgreSQL` connection string for the order cache
//!   (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Desk migrations: `crates/desk/migrations/`

use secrecy::SecretString;
use stockroom_desk::cache::{CacheError, PgOrderCache, create_pool};
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] CacheError),
}

/// Run desk database migrations.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DESK_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| MigrationError::MissingEnvVar("DESK_DATABASE_URL"))?;

    tracing::info!("Connecting to desk database...");
    let pool = create_pool(&SecretString::from(database_url)).await?;

    tracing::info!("Running desk migrations...");
    PgOrderCache::new(pool).migrate().await?;

    tracing::info!("Desk migrations complete!");
    Ok(())
}
