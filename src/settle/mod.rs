//! Settlement execution - outbound payment of the destination asset
//!
//! One sender per network, dispatched by the coordinator on the order's
//! destination. A send either returns an opaque transaction reference or
//! fails; the core never retries a failed send, because a retry after a
//! partial success could pay the recipient twice.

pub mod ada;
pub mod eth;

pub use ada::AdaSender;
pub use eth::EthSender;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::SwapResult;
use crate::order::Network;

/// Opaque "send value to address" capability for one network
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SettlementSender: Send + Sync {
    /// Network this sender pays out on
    fn network(&self) -> Network;

    /// Transfer `amount` (in the destination asset's natural unit) to
    /// `recipient` and return the transaction reference.
    async fn send(&self, recipient: &str, amount: f64) -> SwapResult<String>;
}
