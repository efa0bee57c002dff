use std::any::Any;
use std::marker::PhantomData;

use async_trait::async_trait;
use domain::UnitOfWork;
use event_store::EventRecord;

use crate::error::DispatchError;

/// Handler for one command (or query) message type.
///
/// Exactly one command handler may be registered per message type. The
/// handler receives the unit of work for the operation explicitly and
/// enlists any repositories it touched; the pipeline commits or discards
/// the unit of work when the handler returns.
#[async_trait]
pub trait CommandHandler<C>: Send + Sync
where
    C: Send + Sync + 'static,
{
    async fn handle(&self, command: &C, uow: &mut UnitOfWork) -> Result<(), DispatchError>;
}

/// Handler for flushed event records, resolved by contract tag.
///
/// Zero or more event handlers may be registered per tag; all of them run,
/// in registration order, within one unit of work per cascaded record.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &EventRecord, uow: &mut UnitOfWork) -> Result<(), DispatchError>;
}

/// Type-erased command handler stored in the dispatcher registry.
#[async_trait]
pub(crate) trait ErasedCommandHandler: Send + Sync {
    async fn handle(
        &self,
        message: &(dyn Any + Send + Sync),
        uow: &mut UnitOfWork,
    ) -> Result<(), DispatchError>;
}

/// Adapter pairing a typed handler with the downcast for its message type.
pub(crate) struct TypedCommandHandler<C, H> {
    handler: H,
    _marker: PhantomData<fn() -> C>,
}

impl<C, H> TypedCommandHandler<C, H> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<C, H> ErasedCommandHandler for TypedCommandHandler<C, H>
where
    C: Any + Send + Sync,
    H: CommandHandler<C>,
{
    async fn handle(
        &self,
        message: &(dyn Any + Send + Sync),
        uow: &mut UnitOfWork,
    ) -> Result<(), DispatchError> {
        let command =
            message
                .downcast_ref::<C>()
                .ok_or(DispatchError::MessageTypeMismatch {
                    expected: std::any::type_name::<C>(),
                })?;
        self.handler.handle(command, uow).await
    }
}
