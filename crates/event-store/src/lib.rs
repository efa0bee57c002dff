//! Event storage layer for the message-processing kernel.
//!
//! Defines the versioned event and snapshot records, the write DTOs with
//! their contract tags, the `Store` trait that persistence engines implement,
//! and an in-memory reference store used for tests.

pub mod contract;
pub mod error;
pub mod memory;
pub mod record;
pub mod serializer;
pub mod snapshot;
pub mod store;

pub use common::AggregateKey;
pub use contract::{ContractMap, ContractMapError};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use record::{EventId, EventRecord, EventRecordBuilder, EventToSave, Version};
pub use serializer::{JsonSerializer, Serializer};
pub use snapshot::{SnapshotRecord, SnapshotToSave};
pub use store::{Store, StoreExt, validate_batch};
