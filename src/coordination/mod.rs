//! Swap coordination - the periodic loop that drives orders through their
//! lifecycle, relying on the order store's compare-and-set transitions for
//! correctness under overlap and duplication.

pub mod coordinator;
pub mod matching;

pub use coordinator::{CoordinatorConfig, SwapCoordinator};
