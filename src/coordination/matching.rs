//! Deposit matching policy
//!
//! A transfer matches an order when it landed no earlier than the order was
//! created and its value is within the asset's absolute tolerance of the
//! requested amount. The temporal filter keeps an old transfer with a
//! coincidentally-right amount from being attributed to a new order; the
//! tolerance absorbs fee deduction on either side of the transfer, at the
//! cost of treating a slightly-off deposit as unmatched (manual resolution).

use crate::chain::IncomingTransfer;
use crate::order::Order;

/// First transfer in `transfers` that matches `order`, if any.
/// First-match-wins: later candidates are not considered.
pub fn match_deposit<'a>(
    order: &Order,
    transfers: &'a [IncomingTransfer],
    tolerance: f64,
) -> Option<&'a IncomingTransfer> {
    transfers.iter().find(|t| is_match(order, t, tolerance))
}

fn is_match(order: &Order, transfer: &IncomingTransfer, tolerance: f64) -> bool {
    transfer.timestamp >= order.created_at
        && (transfer.amount - order.requested_amount).abs() < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Direction;
    use chrono::{DateTime, Duration, Utc};

    fn order_at(created_at: DateTime<Utc>, requested: f64) -> Order {
        Order::new(
            Direction::AdaToEth,
            requested,
            "0xrecipient".to_string(),
            "addr_test1qzcustody".to_string(),
            requested * 0.0005,
            created_at,
            Duration::seconds(1800),
        )
    }

    fn transfer(tx_ref: &str, amount: f64, at: DateTime<Utc>) -> IncomingTransfer {
        IncomingTransfer {
            tx_ref: tx_ref.to_string(),
            amount,
            timestamp: at,
        }
    }

    #[test]
    fn rejects_transfer_before_order_creation() {
        let t0 = Utc::now();
        let order = order_at(t0, 10.0);

        // Right amount, but timestamped before the order existed
        let old = transfer("tx-old", 10.05, t0 - Duration::seconds(10));
        assert!(match_deposit(&order, &[old.clone()], 0.1).is_none());

        // Same transfer re-observed inside the window matches
        let fresh = transfer("tx-fresh", 10.05, t0 + Duration::seconds(5));
        let candidates = [old, fresh];
        let matched = match_deposit(&order, &candidates, 0.1).unwrap();
        assert_eq!(matched.tx_ref, "tx-fresh");
    }

    #[test]
    fn tolerance_is_symmetric() {
        let t0 = Utc::now();
        let order = order_at(t0, 10.0);
        let at = t0 + Duration::seconds(1);

        assert!(match_deposit(&order, &[transfer("a", 10.05, at)], 0.1).is_some());
        assert!(match_deposit(&order, &[transfer("b", 9.95, at)], 0.1).is_some());
        assert!(match_deposit(&order, &[transfer("c", 10.15, at)], 0.1).is_none());
        assert!(match_deposit(&order, &[transfer("d", 9.85, at)], 0.1).is_none());
    }

    #[test]
    fn first_match_wins() {
        let t0 = Utc::now();
        let order = order_at(t0, 10.0);
        let candidates = [
            transfer("miss", 50.0, t0 + Duration::seconds(1)),
            transfer("first", 10.01, t0 + Duration::seconds(2)),
            transfer("second", 10.02, t0 + Duration::seconds(3)),
        ];

        let matched = match_deposit(&order, &candidates, 0.1).unwrap();
        assert_eq!(matched.tx_ref, "first");
    }

    #[test]
    fn transfer_at_creation_instant_matches() {
        let t0 = Utc::now();
        let order = order_at(t0, 1.0);
        assert!(match_deposit(&order, &[transfer("a", 1.0, t0)], 0.001).is_some());
    }
}
