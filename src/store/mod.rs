//! Order store - durable order records with atomic conditional transitions
//!
//! The conditional updates here are the load-bearing invariant of the whole
//! service: every status change is a single compare-and-set at the storage
//! layer, so concurrent ticks and duplicate detections collapse to exactly
//! one winner per transition.

pub mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::PgOrderStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::SwapResult;
use crate::order::Order;

/// Per-status order counts, the operator's surface for spotting stuck orders
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub deposited: u64,
    pub processing: u64,
    pub completed: u64,
    pub expired: u64,
}

/// Queryable order records with atomic conditional transitions
///
/// Callers never read-then-write `status`; the `try_*` operations are single
/// indivisible compare-and-set updates and report a lost race as `false`,
/// not as an error.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new pending order. Fails with `DuplicateOrder` if the id
    /// already exists.
    async fn create(&self, order: &Order) -> SwapResult<()>;

    /// Fetch an order by id
    async fn get(&self, id: Uuid) -> SwapResult<Option<Order>>;

    /// All non-terminal orders whose expiry has not passed, ordered by
    /// creation time ascending. The ordering is the deterministic tie-break
    /// when two orders with overlapping tolerance windows could match the
    /// same incoming transfer: the earliest-created order scans first.
    async fn list_active(&self, now: DateTime<Utc>) -> SwapResult<Vec<Order>>;

    /// Bulk-transition every pending order past its expiry to `expired`.
    /// Unconditional and idempotent; returns the number of orders expired.
    async fn expire_stale(&self, now: DateTime<Utc>) -> SwapResult<u64>;

    /// Compare-and-set `pending -> deposited`, recording the deposit tx ref.
    /// Returns `false` if the order was already past `pending` or if the ref
    /// is already credited to another order; a physical transfer backs at
    /// most one order.
    async fn try_mark_deposited(&self, id: Uuid, deposit_tx_ref: &str) -> SwapResult<bool>;

    /// Compare-and-set `deposited -> processing`. Returns `false` if the
    /// order was not exactly `deposited`; the caller that gets `true` owns
    /// the settlement attempt.
    async fn try_mark_processing(&self, id: Uuid) -> SwapResult<bool>;

    /// Transition `processing -> completed` with the outbound tx ref. Called
    /// only by the caller that won `try_mark_processing`, so there is no
    /// remaining contention.
    async fn mark_completed(&self, id: Uuid, output_tx_ref: &str) -> SwapResult<()>;

    /// Per-status counts for the stats endpoint and gauges
    async fn status_counts(&self) -> SwapResult<StatusCounts>;
}
