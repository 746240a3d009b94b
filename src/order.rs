//! Swap order domain types
//!
//! An order is the unit of work: one user deposit on the source network paid
//! out as one settlement on the destination network. The `status` field is the
//! only mutable part of an order once created; every transition goes through
//! the conditional updates on [`crate::store::OrderStore`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Networks the service custodies funds on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Cardano,
    Ethereum,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Cardano => write!(f, "cardano"),
            Network::Ethereum => write!(f, "ethereum"),
        }
    }
}

/// Swap direction, fixed at order creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "ADA_TO_ETH")]
    AdaToEth,
    #[serde(rename = "ETH_TO_ADA")]
    EthToAda,
}

impl Direction {
    /// Network the user deposits on
    pub fn source(&self) -> Network {
        match self {
            Direction::AdaToEth => Network::Cardano,
            Direction::EthToAda => Network::Ethereum,
        }
    }

    /// Network the settlement is paid out on
    pub fn destination(&self) -> Network {
        match self {
            Direction::AdaToEth => Network::Ethereum,
            Direction::EthToAda => Network::Cardano,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::AdaToEth => "ADA_TO_ETH",
            Direction::EthToAda => "ETH_TO_ADA",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADA_TO_ETH" => Some(Direction::AdaToEth),
            "ETH_TO_ADA" => Some(Direction::EthToAda),
            _ => None,
        }
    }
}

/// Order lifecycle states
///
/// `pending -> deposited -> processing -> completed`, with
/// `pending -> expired` as the alternate terminal path. Transitions are
/// monotonic; no order ever moves backward, and nothing leaves `completed`
/// or `expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Deposited,
    Processing,
    Completed,
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Deposited => "deposited",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "deposited" => Some(OrderStatus::Deposited),
            "processing" => Some(OrderStatus::Processing),
            "completed" => Some(OrderStatus::Completed),
            "expired" => Some(OrderStatus::Expired),
            _ => None,
        }
    }

    /// Terminal states are retained for audit and never listed as active
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Expired)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A swap order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub direction: Direction,
    /// Amount the user committed to deposit, in source-asset units
    pub requested_amount: f64,
    /// Destination-network address, opaque to the core
    pub recipient_address: String,
    /// Custody address on the source network
    pub deposit_address: String,
    /// Amount paid out on settlement, computed once at creation
    pub output_amount: f64,
    pub status: OrderStatus,
    pub deposit_tx_ref: Option<String>,
    pub output_tx_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Order {
    /// Build a new pending order. `output_amount` and `deposit_address` come
    /// from the request boundary; everything else is assigned here.
    pub fn new(
        direction: Direction,
        requested_amount: f64,
        recipient_address: String,
        deposit_address: String,
        output_amount: f64,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            direction,
            requested_amount,
            recipient_address,
            deposit_address,
            output_amount,
            status: OrderStatus::Pending,
            deposit_tx_ref: None,
            output_tx_ref: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_network_mapping() {
        assert_eq!(Direction::AdaToEth.source(), Network::Cardano);
        assert_eq!(Direction::AdaToEth.destination(), Network::Ethereum);
        assert_eq!(Direction::EthToAda.source(), Network::Ethereum);
        assert_eq!(Direction::EthToAda.destination(), Network::Cardano);
    }

    #[test]
    fn direction_wire_format_round_trip() {
        for d in [Direction::AdaToEth, Direction::EthToAda] {
            assert_eq!(Direction::parse(d.as_str()), Some(d));
        }
        assert_eq!(Direction::parse("ETH_TO_BTC"), None);
    }

    #[test]
    fn status_string_round_trip() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Deposited,
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::Expired,
        ] {
            assert_eq!(OrderStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
    }
}
