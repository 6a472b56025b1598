//! Pending order commands.
//!
//! # Usage
//!
//! ```bash
//! # Bill 4 medium and 2 large navy polos from an order
//! sr-cli fulfill o-123 "Polo Shirt:Navy:M=4" "Polo Shirt:Navy:L=2"
//!
//! # Flag an order for billing without moving quantities
//! sr-cli mark-for-billing o-123
//! ```

use chrono::Utc;
use stockroom_core::OrderId;
use stockroom_desk::ledger::SrqEntry;

use super::{CommandError, connect};

/// Send the entered quantities of an order to billing.
pub async fn fulfill(order_id: &str, srq: &[String]) -> Result<(), CommandError> {
    let entries = srq
        .iter()
        .map(|arg| parse_srq_arg(arg))
        .collect::<Result<Vec<_>, _>>()?;

    let state = connect().await?;
    let order_id = OrderId::new(order_id);
    let result = state
        .fulfillment()
        .fulfill_from_entries(&order_id, &entries, Utc::now())
        .await?;

    tracing::info!(
        billing_order_id = %result.billing_order.id,
        merged = result.merged,
        billed = result.billed_quantity,
        "Sent to billing"
    );

    #[allow(clippy::print_stdout)]
    {
        println!(
            "Billed {} from {} into billing order {}{}",
            result.billed_quantity,
            order_id,
            result.billing_order.id,
            if result.merged { " (merged)" } else { "" }
        );
        println!(
            "Remaining on order: {}",
            result.updated_order.total_quantity
        );
    }
    Ok(())
}

/// Mark a pending order as waiting for billing.
pub async fn mark_for_billing(order_id: &str) -> Result<(), CommandError> {
    let state = connect().await?;
    let order = state
        .fulfillment()
        .mark_for_billing(&OrderId::new(order_id))
        .await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{} is now {}", order.id, order.status);
    }
    Ok(())
}

/// Parse `item:color:size=qty`. The item name may itself contain colons.
fn parse_srq_arg(arg: &str) -> Result<SrqEntry, CommandError> {
    let invalid = || CommandError::InvalidArgument(format!("{arg:?}, expected item:color:size=qty"));

    let (line, raw) = arg.rsplit_once('=').ok_or_else(invalid)?;
    let (rest, size) = line.rsplit_once(':').ok_or_else(invalid)?;
    let (item, color) = rest.rsplit_once(':').ok_or_else(invalid)?;

    if item.trim().is_empty() || size.trim().is_empty() {
        return Err(invalid());
    }

    Ok(SrqEntry::new(item.trim(), color.trim(), size.trim(), raw.trim()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_srq_arg() {
        let entry = parse_srq_arg("Polo Shirt:Navy:M=4").unwrap();
        assert_eq!(entry, SrqEntry::new("Polo Shirt", "Navy", "M", "4"));
    }

    #[test]
    fn test_parse_srq_arg_item_with_colon() {
        let entry = parse_srq_arg("Kit: Home:N/A:XL= 2 ").unwrap();
        assert_eq!(entry, SrqEntry::new("Kit: Home", "N/A", "XL", "2"));
    }

    #[test]
    fn test_parse_srq_arg_rejects_malformed() {
        assert!(parse_srq_arg("Polo Shirt=4").is_err());
        assert!(parse_srq_arg("Polo Shirt:Navy:M").is_err());
        assert!(parse_srq_arg(":Navy:M=4").is_err());
    }
}
