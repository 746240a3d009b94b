//! Error types for the swap service

use thiserror::Error;
use uuid::Uuid;

use crate::order::Network;

/// Main error type for the swap service
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Order {0} already exists")]
    DuplicateOrder(Uuid),

    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Indexer error on {network}: {message}")]
    Indexer { network: Network, message: String },

    #[error("No signing capability configured for {network}")]
    SenderUnavailable { network: Network },

    #[error("Submission error on {network}: {message}")]
    Submission { network: Network, message: String },

    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwapError {
    /// Check if the error is a transient external-I/O failure. Transient
    /// failures leave the order untouched for the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SwapError::Indexer { .. } | SwapError::Timeout { .. } | SwapError::Database(_)
        )
    }
}

/// Result type for swap service operations
pub type SwapResult<T> = Result<T, SwapError>;
