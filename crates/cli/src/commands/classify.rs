//! Expiry classification command.
//!
//! ```bash
//! sr-cli classify --expiry 2024-05-04T10:00:00Z --now 2024-05-01T10:00:00Z
//! # Critical (3d) 60%
//! ```

use chrono::{DateTime, Utc};
use stockroom_desk::ledger::classify;

/// Print the expiry tier of `expiry` as seen at `now`.
pub fn run(expiry: DateTime<Utc>, now: DateTime<Utc>) {
    let status = classify(expiry, now);

    #[allow(clippy::print_stdout)]
    {
        println!("{} {:.0}%", status.label(), status.progress_percentage);
    }
}
