use domain::DomainError;
use thiserror::Error;

/// Errors that can occur while dispatching messages.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No command handler is registered for the message's runtime type.
    #[error("No command handler registered for {message_type}")]
    NoCommandHandler { message_type: &'static str },

    /// A second command handler was registered for one message type.
    #[error("A command handler is already registered for {message_type}")]
    DuplicateCommandHandler { message_type: &'static str },

    /// A registered handler received a message of an unexpected type.
    /// Indicates registry corruption; cannot happen through the builder.
    #[error("Message payload did not match the registered handler type {expected}")]
    MessageTypeMismatch { expected: &'static str },

    /// Cascading dispatch exceeded the configured generation bound.
    #[error("Cascade depth {depth} exceeded the configured limit {limit}")]
    CascadeDepthExceeded { depth: usize, limit: usize },

    /// A handler rejected the message.
    #[error("Message rejected: {0}")]
    Rejected(String),

    /// An error surfaced from the aggregate core or the store.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl DispatchError {
    /// Returns true for the retryable optimistic-concurrency conflict class;
    /// an outer policy may retry the whole dispatch.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::Domain(err) if err.is_concurrency_conflict())
    }
}
