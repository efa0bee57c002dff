use event_store::{AggregateKey, StoreError, Version};
use thiserror::Error;

/// Errors that can occur in the aggregate core.
///
/// Everything except the store's concurrency conflict indicates either a bug
/// in aggregate/handler wiring (fatal, not retried) or a missing item.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An event was applied to an aggregate with a different key.
    #[error("Event for aggregate {actual} applied to aggregate {expected}")]
    InvalidKey {
        expected: AggregateKey,
        actual: AggregateKey,
    },

    /// An event's version does not advance the aggregate's current version.
    #[error("Version {candidate} does not advance current version {current}")]
    InvalidVersion { current: Version, candidate: Version },

    /// No state-mutation handler is registered for an event type.
    #[error("No event handler registered for {event_type} on {aggregate_type}")]
    MissingEventHandler {
        aggregate_type: &'static str,
        event_type: &'static str,
    },

    /// Two state-mutation handlers were registered for one event type.
    #[error("Duplicate event handler for {event_type} on {aggregate_type}")]
    DuplicateEventHandler {
        aggregate_type: &'static str,
        event_type: &'static str,
    },

    /// An aggregate with this key is already tracked in the unit of work.
    #[error("Aggregate {0} is already tracked in this unit of work")]
    DuplicateKey(AggregateKey),

    /// The store has no record of this key.
    #[error("No aggregate found for key {0}")]
    ItemNotFound(AggregateKey),

    /// An error surfaced from the backing store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    /// Returns true for the retryable optimistic-concurrency conflict class;
    /// callers may retry the whole operation. Every other variant is fatal
    /// to the operation.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_concurrency_conflict())
    }
}
