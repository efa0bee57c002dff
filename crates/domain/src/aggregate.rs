//! Core aggregate and domain event traits.

use event_store::{AggregateKey, Version};
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the stable contract tag for this event.
    ///
    /// Used for storage, polymorphic deserialization and pipeline routing.
    fn event_type(&self) -> &'static str;
}

/// Trait for the in-memory state of an event-sourced aggregate.
///
/// State is rebuilt by replaying events and mutated only through the
/// handlers registered in the aggregate's event-handler registry; those
/// handlers must be pure and deterministic.
pub trait AggregateState: Default + Send + Sync + Sized + 'static {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate type name, used as its snapshot contract tag.
    fn aggregate_type() -> &'static str;
}

/// An event bound to the aggregate and version that produced it.
///
/// Applying a recorded event requires its key to match the aggregate's key
/// and its version to advance the aggregate's current version.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent<E> {
    /// The aggregate this event belongs to.
    pub key: AggregateKey,

    /// The version of the aggregate after this event.
    pub version: Version,

    /// The domain event itself.
    pub event: E,
}

impl<E> RecordedEvent<E> {
    /// Creates a recorded event.
    pub fn new(key: AggregateKey, version: Version, event: E) -> Self {
        Self {
            key,
            version,
            event,
        }
    }
}
