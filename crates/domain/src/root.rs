use std::sync::Arc;

use event_store::{AggregateKey, Version};

use crate::aggregate::{AggregateState, RecordedEvent};
use crate::buffer::EventBuffer;
use crate::error::DomainError;
use crate::registry::EventHandlerRegistry;

/// An event-sourced aggregate instance: key, version, in-memory state and
/// the exclusive buffer of events it has produced during this operation.
///
/// Roots are constructed fresh for a new stream or rebuilt by replaying a
/// historical event sequence (optionally seeded from a snapshot). State is
/// mutated only by applying events through the shared per-type handler
/// registry; the root itself is never persisted, only its events are.
#[derive(Debug)]
pub struct AggregateRoot<S: AggregateState> {
    key: AggregateKey,
    version: Version,
    state: S,
    buffer: EventBuffer<S::Event>,
    registry: Arc<EventHandlerRegistry<S>>,
}

impl<S: AggregateState> AggregateRoot<S> {
    /// Creates a fresh root for a stream that does not exist yet.
    pub fn new(key: AggregateKey, registry: Arc<EventHandlerRegistry<S>>) -> Self {
        Self {
            key,
            version: Version::initial(),
            state: S::default(),
            buffer: EventBuffer::new(Version::initial()),
            registry,
        }
    }

    /// Rebuilds a root from a snapshot's state and version.
    ///
    /// The buffer starts empty, rooted at the snapshot version; events after
    /// the snapshot are applied with [`replay_history`](Self::replay_history).
    pub fn rehydrate(
        key: AggregateKey,
        version: Version,
        state: S,
        registry: Arc<EventHandlerRegistry<S>>,
    ) -> Self {
        Self {
            key,
            version,
            state,
            buffer: EventBuffer::new(version),
            registry,
        }
    }

    /// Rebuilds a root by replaying a full historical event sequence.
    pub fn replay(
        key: AggregateKey,
        registry: Arc<EventHandlerRegistry<S>>,
        events: impl IntoIterator<Item = RecordedEvent<S::Event>>,
    ) -> Result<Self, DomainError> {
        let mut root = Self::new(key, registry);
        root.replay_history(events)?;
        Ok(root)
    }

    /// Applies a historical event sequence on top of the current state.
    ///
    /// Replay is contiguity-checked: any gap, duplicate or out-of-order
    /// version fails the whole replay with `InvalidVersion`, since a broken
    /// history is a data-corruption signal and must not be silently repaired.
    /// Afterwards the buffer is empty and rooted at the replayed version.
    pub fn replay_history(
        &mut self,
        events: impl IntoIterator<Item = RecordedEvent<S::Event>>,
    ) -> Result<(), DomainError> {
        for recorded in events {
            let expected = self.version.next();
            if recorded.version != expected {
                return Err(DomainError::InvalidVersion {
                    current: self.version,
                    candidate: recorded.version,
                });
            }
            self.apply(&recorded)?;
        }
        self.buffer.reset(self.version);
        Ok(())
    }

    /// Applies one event: key check, strict version advancement, then the
    /// registered state-mutation handler.
    ///
    /// Fails with `InvalidKey` when the event belongs to another aggregate,
    /// `InvalidVersion` when the version does not advance strictly, and
    /// `MissingEventHandler` when no handler is registered for the event
    /// type. On failure the state and version are left unchanged.
    pub fn apply(&mut self, recorded: &RecordedEvent<S::Event>) -> Result<(), DomainError> {
        if recorded.key != self.key {
            return Err(DomainError::InvalidKey {
                expected: self.key,
                actual: recorded.key,
            });
        }
        if recorded.version <= self.version {
            return Err(DomainError::InvalidVersion {
                current: self.version,
                candidate: recorded.version,
            });
        }
        self.registry.apply(&mut self.state, &recorded.event)?;
        self.version = recorded.version;
        Ok(())
    }

    /// Publishes a new event: obtains the next version, builds the event via
    /// the factory with `(key, next_version)`, applies it, and appends it to
    /// the buffer for the enclosing unit of work to flush.
    pub fn publish<F>(&mut self, factory: F) -> Result<(), DomainError>
    where
        F: FnOnce(AggregateKey, Version) -> S::Event,
    {
        let version = self.version.next();
        let recorded = RecordedEvent::new(self.key, version, factory(self.key, version));
        self.apply(&recorded)?;
        self.buffer.append(recorded);
        Ok(())
    }

    /// The aggregate's key.
    pub fn key(&self) -> AggregateKey {
        self.key
    }

    /// The aggregate's current version (including buffered events).
    pub fn version(&self) -> Version {
        self.version
    }

    /// The aggregate's in-memory state.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// The buffer of uncommitted events.
    pub fn buffer(&self) -> &EventBuffer<S::Event> {
        &self.buffer
    }

    /// Takes the buffered events for flushing, re-rooting the buffer at the
    /// current version. Returns the prior original version with the events.
    pub(crate) fn drain_buffer(&mut self) -> (Version, Vec<RecordedEvent<S::Event>>) {
        self.buffer.drain(self.version)
    }
}
