use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use domain::UnitOfWork;
use event_store::EventRecord;

use crate::error::DispatchError;
use crate::handler::{CommandHandler, ErasedCommandHandler, EventHandler, TypedCommandHandler};

/// Default bound on cascade generations before dispatch gives up.
///
/// Cascading dispatch has no cycle detection; a handler chain that keeps
/// republishing will hit this bound instead of looping forever.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 32;

struct CommandEntry {
    message_type: &'static str,
    handler: Box<dyn ErasedCommandHandler>,
}

/// Builder assembling the dispatch registry at startup.
///
/// Commands are keyed by their runtime type and take exactly one handler;
/// registering a second one fails here, at configuration time. Events are
/// keyed by contract tag and take any number of handlers, invoked in
/// registration order.
pub struct DispatcherBuilder {
    commands: HashMap<TypeId, CommandEntry>,
    events: HashMap<String, Vec<Arc<dyn EventHandler>>>,
    max_cascade_depth: usize,
}

impl std::fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("commands", &self.commands.len())
            .field("events", &self.events.len())
            .field("max_cascade_depth", &self.max_cascade_depth)
            .finish()
    }
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
            events: HashMap::new(),
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
        }
    }

    /// Registers the handler for a command (or query) message type.
    pub fn command<C, H>(mut self, handler: H) -> Result<Self, DispatchError>
    where
        C: Any + Send + Sync,
        H: CommandHandler<C> + 'static,
    {
        let message_type = std::any::type_name::<C>();
        match self.commands.entry(TypeId::of::<C>()) {
            std::collections::hash_map::Entry::Occupied(_) => {
                Err(DispatchError::DuplicateCommandHandler { message_type })
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(CommandEntry {
                    message_type,
                    handler: Box::new(TypedCommandHandler::<C, H>::new(handler)),
                });
                Ok(self)
            }
        }
    }

    /// Registers an event handler under a contract tag. May be called any
    /// number of times per tag.
    pub fn on_event(
        mut self,
        event_type: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        self.events.entry(event_type.into()).or_default().push(handler);
        self
    }

    /// Overrides the cascade generation bound.
    pub fn max_cascade_depth(mut self, limit: usize) -> Self {
        self.max_cascade_depth = limit;
        self
    }

    /// Finalizes the registry.
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            commands: self.commands,
            events: self.events,
            max_cascade_depth: self.max_cascade_depth,
        }
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one top-level dispatch, after the cascade has drained.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Every event record persisted during the operation, in flush order.
    pub events: Vec<EventRecord>,
}

/// Routes inbound messages to their handlers and drives cascading dispatch.
///
/// Lifecycle per message: resolve the handler set, open a fresh unit of
/// work, invoke, commit on success. Each flushed event is then fed back
/// through resolution as a new inbound message until no further events are
/// produced. A handler failure discards that message's unit of work (no
/// partial persistence for it) and propagates to the original caller;
/// units of work committed earlier in the cascade stand.
pub struct Dispatcher {
    commands: HashMap<TypeId, CommandEntry>,
    events: HashMap<String, Vec<Arc<dyn EventHandler>>>,
    max_cascade_depth: usize,
}

impl Dispatcher {
    /// Creates a new dispatcher builder.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Number of registered command handlers.
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Number of event handlers registered for a contract tag.
    pub fn event_handler_count(&self, event_type: &str) -> usize {
        self.events.get(event_type).map(Vec::len).unwrap_or(0)
    }

    /// Dispatches a command (or query) message.
    ///
    /// Fails with `NoCommandHandler` when the message's runtime type has no
    /// registered handler. Returns once the handler has run, its unit of
    /// work is committed and the entire event cascade has drained.
    #[tracing::instrument(
        skip(self, command),
        fields(message_type = std::any::type_name::<C>())
    )]
    pub async fn dispatch<C>(&self, command: C) -> Result<DispatchOutcome, DispatchError>
    where
        C: Any + Send + Sync,
    {
        let entry = self.commands.get(&TypeId::of::<C>()).ok_or(
            DispatchError::NoCommandHandler {
                message_type: std::any::type_name::<C>(),
            },
        )?;
        metrics::counter!("pipeline_commands_dispatched_total").increment(1);
        tracing::debug!(handler_for = entry.message_type, "command resolved");

        let mut uow = UnitOfWork::new();
        // On error the unit of work drops here, discarding buffered events.
        entry.handler.handle(&command, &mut uow).await?;
        let flushed = uow.commit().await?;

        self.cascade(flushed).await
    }

    /// Event-side entry point: accepts an externally produced record and
    /// runs the same cascade the flush path uses.
    pub async fn publish(&self, record: EventRecord) -> Result<DispatchOutcome, DispatchError> {
        self.cascade(vec![record]).await
    }

    /// Drains the cascade queue: each record is delivered to all handlers
    /// registered for its contract tag inside one unit of work, and the
    /// events that commit produces join the queue one generation deeper.
    async fn cascade(&self, seed: Vec<EventRecord>) -> Result<DispatchOutcome, DispatchError> {
        let mut outcome = DispatchOutcome::default();
        let mut queue: VecDeque<(EventRecord, usize)> =
            seed.into_iter().map(|record| (record, 0)).collect();

        while let Some((record, depth)) = queue.pop_front() {
            if let Some(handlers) = self.events.get(record.contract.as_str())
                && !handlers.is_empty()
            {
                let mut uow = UnitOfWork::new();
                for handler in handlers {
                    // A failure aborts the remaining handlers for this
                    // record and discards the unit of work.
                    handler.handle(&record, &mut uow).await?;
                }
                let produced = uow.commit().await?;

                if !produced.is_empty() {
                    let next_depth = depth + 1;
                    if next_depth > self.max_cascade_depth {
                        return Err(DispatchError::CascadeDepthExceeded {
                            depth: next_depth,
                            limit: self.max_cascade_depth,
                        });
                    }
                    queue.extend(produced.into_iter().map(|r| (r, next_depth)));
                }
                metrics::counter!("pipeline_events_cascaded_total").increment(1);
            }
            outcome.events.push(record);
        }

        Ok(outcome)
    }
}
