//! Stockroom CLI - Database migrations and order management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run desk database migrations
//! sr-cli migrate
//!
//! # Send entered quantities of an order to billing
//! sr-cli fulfill -- -Nx3kQ "Polo Shirt:Navy:M=4" "Polo Shirt:Navy:L=2"
//!
//! # Soft-delete an order with a preset reason
//! sr-cli delete --preset 2 -- -Nx3kQ
//!
//! # Show where an expiry date falls
//! sr-cli classify --expiry 2024-05-04T00:00:00Z
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `fulfill` / `mark-for-billing` - Move pending orders towards billing
//! - `delete` / `revert` / `purge` / `permanent-delete` / `list-deleted` - Retention
//! - `classify` - Expiry tier for a date
//! - `sync` - Refresh the local cache once

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sr-cli")]
#[command(author, version, about = "Stockroom CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Send fulfilled quantities of a pending order to billing
    Fulfill {
        /// Pending order id
        order_id: String,

        /// Entries as `item:color:size=qty`
        #[arg(required = true)]
        srq: Vec<String>,
    },
    /// Mark a pending order as waiting for billing
    MarkForBilling {
        /// Pending order id
        order_id: String,
    },
    /// Move a pending order to deleted orders
    Delete {
        /// Pending order id
        order_id: String,

        /// Preset reason number as shown by `list-reasons`, repeatable
        #[arg(short, long)]
        preset: Vec<usize>,

        /// Free-text reason, used when no preset is given
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// List the preset delete reasons
    ListReasons,
    /// Restore a deleted order to pending
    Revert {
        /// Deleted order id
        order_id: String,
    },
    /// Purge deleted orders past their retention window
    Purge,
    /// Remove a deleted order immediately
    PermanentDelete {
        /// Deleted order id
        order_id: String,

        /// Confirm the removal
        #[arg(long)]
        yes: bool,
    },
    /// List deleted orders, most recent first
    ListDeleted,
    /// Classify an expiry date
    Classify {
        /// Expiry timestamp (RFC 3339)
        #[arg(short, long)]
        expiry: DateTime<Utc>,

        /// Reference time, defaults to now
        #[arg(short, long)]
        now: Option<DateTime<Utc>>,
    },
    /// Sync pending orders into the local cache once
    Sync,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Fulfill { order_id, srq } => commands::orders::fulfill(&order_id, &srq).await?,
        Commands::MarkForBilling { order_id } => {
            commands::orders::mark_for_billing(&order_id).await?;
        }
        Commands::Delete {
            order_id,
            preset,
            reason,
        } => commands::retention::delete(&order_id, &preset, reason.as_deref()).await?,
        Commands::ListReasons => commands::retention::list_reasons(),
        Commands::Revert { order_id } => commands::retention::revert(&order_id).await?,
        Commands::Purge => commands::retention::purge().await?,
        Commands::PermanentDelete { order_id, yes } => {
            commands::retention::permanent_delete(&order_id, yes).await?;
        }
        Commands::ListDeleted => commands::retention::list_deleted().await?,
        Commands::Classify { expiry, now } => {
            commands::classify::run(expiry, now.unwrap_or_else(Utc::now));
        }
        Commands::Sync => commands::sync::run().await?,
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_dash_leading_ids_follow_separator() {
        let cli = Cli::try_parse_from(["sr-cli", "delete", "--preset", "2", "--", "-Nx3kQ"]).unwrap();
        let Commands::Delete { order_id, preset, reason } = cli.command else {
            panic!("expected delete");
        };
        assert_eq!(order_id, "-Nx3kQ");
        assert_eq!(preset, [2]);
        assert!(reason.is_none());

        let cli = Cli::try_parse_from(["sr-cli", "fulfill", "--", "-Nx3kQ", "Polo Shirt:Navy:M=4"]).unwrap();
        let Commands::Fulfill { order_id, srq } = cli.command else {
            panic!("expected fulfill");
        };
        assert_eq!(order_id, "-Nx3kQ");
        assert_eq!(srq, ["Polo Shirt:Navy:M=4"]);
    }

    #[test]
    fn test_dash_leading_id_without_separator_is_rejected() {
        assert!(Cli::try_parse_from(["sr-cli", "delete", "-Nx3kQ", "--preset", "2"]).is_err());
    }
}
