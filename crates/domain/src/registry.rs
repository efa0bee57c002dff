use std::collections::HashMap;
use std::sync::Arc;

use crate::aggregate::AggregateState;
use crate::error::DomainError;

/// State-mutation handler for one event type.
type Applier<S> = fn(&mut S, &<S as AggregateState>::Event);

/// Statically-built table mapping event-type tags to state-mutation handlers
/// for one aggregate type.
///
/// Built once at startup through [`EventHandlerRegistryBuilder`] and shared
/// (via `Arc`) by every root of the aggregate type. Each event type may have
/// at most one handler; registering two is a configuration error, and
/// applying an event with none registered is a fatal programming error.
#[derive(Debug)]
pub struct EventHandlerRegistry<S: AggregateState> {
    handlers: HashMap<&'static str, Applier<S>>,
}

impl<S: AggregateState> EventHandlerRegistry<S> {
    /// Creates a new registry builder.
    pub fn builder() -> EventHandlerRegistryBuilder<S> {
        EventHandlerRegistryBuilder {
            handlers: HashMap::new(),
        }
    }

    /// Mutates `state` with the handler registered for the event's type.
    ///
    /// Fails with `MissingEventHandler` before touching the state when no
    /// handler is registered.
    pub fn apply(&self, state: &mut S, event: &S::Event) -> Result<(), DomainError> {
        use crate::aggregate::DomainEvent;

        let event_type = event.event_type();
        let handler =
            self.handlers
                .get(event_type)
                .ok_or(DomainError::MissingEventHandler {
                    aggregate_type: S::aggregate_type(),
                    event_type,
                })?;
        handler(state, event);
        Ok(())
    }

    /// Returns true when a handler is registered for the event type.
    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true when no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Builder for [`EventHandlerRegistry`]; duplicate registrations fail here,
/// at startup, rather than at apply time.
#[derive(Debug)]
pub struct EventHandlerRegistryBuilder<S: AggregateState> {
    handlers: HashMap<&'static str, Applier<S>>,
}

impl<S: AggregateState> EventHandlerRegistryBuilder<S> {
    /// Registers the handler for one event type.
    pub fn on(mut self, event_type: &'static str, handler: Applier<S>) -> Result<Self, DomainError> {
        if self.handlers.insert(event_type, handler).is_some() {
            return Err(DomainError::DuplicateEventHandler {
                aggregate_type: S::aggregate_type(),
                event_type,
            });
        }
        Ok(self)
    }

    /// Finalizes the registry for sharing across aggregate roots.
    pub fn build(self) -> Arc<EventHandlerRegistry<S>> {
        Arc::new(EventHandlerRegistry {
            handlers: self.handlers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Incremented { by: i64 },
        Reset,
    }

    impl crate::aggregate::DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Incremented { .. } => "CounterIncremented",
                CounterEvent::Reset => "CounterReset",
            }
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct CounterState {
        total: i64,
    }

    impl AggregateState for CounterState {
        type Event = CounterEvent;

        fn aggregate_type() -> &'static str {
            "Counter"
        }
    }

    fn apply_incremented(state: &mut CounterState, event: &CounterEvent) {
        if let CounterEvent::Incremented { by } = event {
            state.total += by;
        }
    }

    #[test]
    fn registered_handler_mutates_state() {
        let registry = EventHandlerRegistry::<CounterState>::builder()
            .on("CounterIncremented", apply_incremented)
            .unwrap()
            .build();

        let mut state = CounterState::default();
        registry
            .apply(&mut state, &CounterEvent::Incremented { by: 5 })
            .unwrap();
        assert_eq!(state.total, 5);
    }

    #[test]
    fn missing_handler_is_fatal_and_leaves_state_untouched() {
        let registry = EventHandlerRegistry::<CounterState>::builder()
            .on("CounterIncremented", apply_incremented)
            .unwrap()
            .build();

        let mut state = CounterState { total: 7 };
        let err = registry.apply(&mut state, &CounterEvent::Reset).unwrap_err();
        assert!(matches!(
            err,
            DomainError::MissingEventHandler {
                aggregate_type: "Counter",
                event_type: "CounterReset",
            }
        ));
        assert_eq!(state.total, 7);
    }

    #[test]
    fn duplicate_registration_fails_at_build_time() {
        let err = EventHandlerRegistry::<CounterState>::builder()
            .on("CounterIncremented", apply_incremented)
            .unwrap()
            .on("CounterIncremented", apply_incremented)
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateEventHandler { .. }));
    }
}
