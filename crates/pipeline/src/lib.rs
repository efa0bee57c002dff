//! Message dispatch pipeline for the kernel.
//!
//! Inbound messages are routed to handlers through a registry built once at
//! startup: commands resolve to exactly one handler by runtime type, events
//! to zero-or-more handlers by contract tag. Handlers run inside a unit of
//! work; on success the unit of work is committed and every flushed event is
//! recursively redispatched until the cascade drains.

pub mod dispatcher;
pub mod error;
pub mod handler;

pub use dispatcher::{DispatchOutcome, Dispatcher, DispatcherBuilder};
pub use error::DispatchError;
pub use handler::{CommandHandler, EventHandler};
