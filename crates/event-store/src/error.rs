use thiserror::Error;

use crate::{AggregateKey, Version};

/// Errors that can occur when interacting with a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The precondition version did not match the stream's current version.
    /// This is the retryable optimistic-concurrency conflict class.
    #[error(
        "Concurrency conflict for aggregate {key}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        key: AggregateKey,
        expected: Version,
        actual: Version,
    },

    /// No stream exists for the given key.
    #[error("No stream found for aggregate {0}")]
    KeyNotFound(AggregateKey),

    /// The event batch handed to a write was malformed (empty, or
    /// non-contiguous versions). This is a programming error, not retried.
    #[error("Invalid event batch: {message}")]
    InvalidBatch { message: String },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true for the retryable concurrency-conflict class.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
