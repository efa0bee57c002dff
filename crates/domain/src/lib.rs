//! Aggregate core for the message-processing kernel.
//!
//! This crate provides the event-sourced aggregate machinery:
//! - `DomainEvent` and `AggregateState` traits for domain code
//! - `AggregateRoot` with strict version advancement and replay
//! - `EventBuffer` holding uncommitted events for one operation
//! - `EventHandlerRegistry`, the statically-built per-type apply table
//! - `Repository` reconciling buffers against a store (insert vs. update,
//!   optimistic-concurrency conflict detection)
//! - `UnitOfWork`, the per-operation flush/discard scope

pub mod aggregate;
pub mod buffer;
pub mod error;
pub mod registry;
pub mod repository;
pub mod root;
pub mod unit_of_work;

pub use aggregate::{AggregateState, DomainEvent, RecordedEvent};
pub use buffer::EventBuffer;
pub use error::DomainError;
pub use registry::{EventHandlerRegistry, EventHandlerRegistryBuilder};
pub use repository::Repository;
pub use root::AggregateRoot;
pub use unit_of_work::{UnitOfWork, UnitOfWorkResource, UnitOfWorkState};
