//! Chain observation - incoming deposit detection via external indexers
//!
//! One observer per network. An observer answers a single question: which
//! confirmed transfers landed on a custody address no earlier than a given
//! time. Matching a transfer to an order is the coordinator's job, not the
//! observer's.

pub mod ada;
pub mod eth;

pub use ada::BlockfrostObserver;
pub use eth::EtherscanObserver;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::error::SwapResult;

/// A confirmed incoming transfer to a custody address, as reported by an
/// external indexer
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingTransfer {
    /// Opaque transaction reference on the source network
    pub tx_ref: String,
    /// Value received, in the source asset's natural unit (ADA or ETH)
    pub amount: f64,
    /// On-chain timestamp of the transaction
    pub timestamp: DateTime<Utc>,
}

/// Queries an external indexer for deposits to a custody address
///
/// Implementations degrade malformed indexer payloads to an empty list;
/// transport failures surface as `SwapError::Indexer` and are tolerated by
/// the caller so one flaky indexer cannot stall unrelated orders.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainObserver: Send + Sync {
    async fn query_incoming(
        &self,
        address: &str,
        not_before: DateTime<Utc>,
    ) -> SwapResult<Vec<IncomingTransfer>>;
}
