//! One-shot sync of pending orders into the local cache.

use stockroom_desk::services::SyncOutcome;

use super::{CommandError, connect};

/// Fetch pending orders from the remote store and replace the cached set.
pub async fn run() -> Result<(), CommandError> {
    let state = connect().await?;

    match state.sync().sync_now().await? {
        SyncOutcome::Synced { orders } => {
            #[allow(clippy::print_stdout)]
            {
                println!("Synced {orders} pending order(s)");
            }
        }
        SyncOutcome::Skipped { retry_in } => {
            tracing::info!(retry_in_secs = retry_in.as_secs(), "Sync skipped");
        }
    }
    Ok(())
}
