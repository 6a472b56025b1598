//! Deleted order commands.
//!
//! # Usage
//!
//! ```bash
//! # Delete with preset reasons 1 and 2, or free text
//! sr-cli delete o-123 --preset 1 --preset 2
//! sr-cli delete o-123 --reason "Party asked to hold"
//!
//! # Restore, purge or drop deleted orders
//! sr-cli revert o-123
//! sr-cli purge
//! sr-cli permanent-delete o-123 --yes
//! ```

use chrono::Utc;
use stockroom_core::{DELETED_FROM_PENDING, OrderId, PRESET_DELETE_REASONS, compose_delete_reason};

use super::{CommandError, connect};

/// Soft-delete a pending order.
pub async fn delete(
    order_id: &str,
    presets: &[usize],
    custom: Option<&str>,
) -> Result<(), CommandError> {
    let presets = presets
        .iter()
        .map(|n| preset_reason(*n))
        .collect::<Result<Vec<_>, _>>()?;
    let reason = compose_delete_reason(&presets, custom).unwrap_or_default();

    let state = connect().await?;
    let deleted = state
        .retention()
        .delete(&OrderId::new(order_id), &reason, DELETED_FROM_PENDING, Utc::now())
        .await?;

    #[allow(clippy::print_stdout)]
    {
        println!(
            "Deleted {} ({}), purge scheduled for {}",
            deleted.id(),
            deleted.delete_reason,
            deleted.scheduled_deletion_date.format("%Y-%m-%d")
        );
    }
    Ok(())
}

/// Print the preset delete reasons with their numbers.
pub fn list_reasons() {
    #[allow(clippy::print_stdout)]
    {
        for (n, reason) in PRESET_DELETE_REASONS.iter().enumerate() {
            println!("{}. {reason}", n + 1);
        }
    }
}

/// Restore a deleted order to pending.
pub async fn revert(order_id: &str) -> Result<(), CommandError> {
    let state = connect().await?;
    let order = state.retention().revert(&OrderId::new(order_id)).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Restored {} ({}) to {}", order.id, order.party_name, order.status);
    }
    Ok(())
}

/// Purge deleted orders whose retention window has passed.
pub async fn purge() -> Result<(), CommandError> {
    let state = connect().await?;
    let purged = state.retention().purge_expired(Utc::now()).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Purged {} deleted order(s)", purged.len());
        for id in &purged {
            println!("  {id}");
        }
    }
    Ok(())
}

/// Remove a deleted order immediately. Requires `--yes`.
pub async fn permanent_delete(order_id: &str, confirmed: bool) -> Result<(), CommandError> {
    if !confirmed {
        return Err(CommandError::InvalidArgument(
            "permanent deletion cannot be undone, pass --yes to confirm".to_string(),
        ));
    }

    let state = connect().await?;
    state
        .retention()
        .permanent_delete(&OrderId::new(order_id))
        .await?;

    tracing::warn!(order_id, "Deleted order permanently removed");
    Ok(())
}

/// List deleted orders, most recently deleted first.
pub async fn list_deleted() -> Result<(), CommandError> {
    let state = connect().await?;
    let deleted = state.retention().list_deleted().await?;

    #[allow(clippy::print_stdout)]
    {
        if deleted.is_empty() {
            println!("No deleted orders");
        }
        for d in &deleted {
            println!(
                "{}  #{}  {}  deleted {}  purge {}  {}",
                d.id(),
                d.order.order_number,
                d.order.party_name,
                d.delete_date.format("%Y-%m-%d"),
                d.scheduled_deletion_date.format("%Y-%m-%d"),
                d.delete_reason
            );
        }
    }
    Ok(())
}

/// Look up a preset reason by its 1-based number.
fn preset_reason(n: usize) -> Result<String, CommandError> {
    n.checked_sub(1)
        .and_then(|i| PRESET_DELETE_REASONS.get(i))
        .map(|reason| (*reason).to_string())
        .ok_or_else(|| {
            CommandError::InvalidArgument(format!(
                "preset {n} does not exist, choose 1 to {}",
                PRESET_DELETE_REASONS.len()
            ))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_reason_is_one_based() {
        assert_eq!(preset_reason(1).unwrap(), "Order placed by mistake");
        assert_eq!(preset_reason(2).unwrap(), "Duplicate order");
        assert!(preset_reason(0).is_err());
        assert!(preset_reason(PRESET_DELETE_REASONS.len() + 1).is_err());
    }
}
