use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AggregateKey;

/// Unique identifier for a stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Generates a fresh random ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The raw UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an event within its aggregate's stream, and the value the
/// optimistic-concurrency precondition compares against.
///
/// The first event carries version 1; each later event advances by exactly
/// one. Version 0 marks a stream that has produced nothing yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Wraps a raw version value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version 0: the stream has no events yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Version 1: the first event on a stream.
    pub fn first() -> Self {
        Self(1)
    }

    /// The version that follows this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// The raw value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// An event to be written to a store.
///
/// Pairs the serialized payload with the contract tag under which it can be
/// deserialized polymorphically later, and the version the event produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventToSave {
    /// Stable contract tag identifying the payload type.
    pub contract: String,

    /// Stream position the event will occupy.
    pub version: Version,

    /// Serialized payload.
    pub payload: serde_json::Value,
}

impl EventToSave {
    /// Creates a write DTO from an already-serialized payload.
    pub fn new(contract: impl Into<String>, version: Version, payload: serde_json::Value) -> Self {
        Self {
            contract: contract.into(),
            version,
            payload,
        }
    }

    /// Creates a write DTO from a serializable payload.
    pub fn from_payload<T: Serialize>(
        contract: impl Into<String>,
        version: Version,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            contract: contract.into(),
            version,
            payload: serde_json::to_value(payload)?,
        })
    }
}

/// A stored event together with its persistence metadata.
///
/// This is the shape events take once a store has accepted them, and the
/// shape in which they are replayed and redispatched through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Identity of this stored event.
    pub event_id: EventId,

    /// The aggregate stream this event belongs to.
    pub key: AggregateKey,

    /// Stream position the event occupies.
    pub version: Version,

    /// Stable contract tag identifying the payload type.
    pub contract: String,

    /// When the store accepted the event.
    pub timestamp: DateTime<Utc>,

    /// Serialized payload.
    pub payload: serde_json::Value,
}

impl EventRecord {
    /// Creates a new event record builder.
    pub fn builder() -> EventRecordBuilder {
        EventRecordBuilder::default()
    }

    /// Promotes a write DTO to a stored record, stamping identity and time.
    pub fn from_save(key: AggregateKey, event: EventToSave) -> Self {
        Self {
            event_id: EventId::new(),
            key,
            version: event.version,
            contract: event.contract,
            timestamp: Utc::now(),
            payload: event.payload,
        }
    }
}

/// Builder for constructing event records.
#[derive(Debug, Default)]
pub struct EventRecordBuilder {
    event_id: Option<EventId>,
    key: Option<AggregateKey>,
    version: Option<Version>,
    contract: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
}

impl EventRecordBuilder {
    /// Sets an explicit event ID; omitted, one is generated at build.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Sets the aggregate key.
    pub fn key(mut self, key: AggregateKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Sets the version.
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the contract tag.
    pub fn contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = Some(contract.into());
        self
    }

    /// Sets an explicit timestamp; omitted, build stamps the current time.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Serializes and sets the payload.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets an already-serialized payload.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the event record.
    ///
    /// # Panics
    ///
    /// Panics if required fields (key, version, contract, payload) are not set.
    pub fn build(self) -> EventRecord {
        EventRecord {
            event_id: self.event_id.unwrap_or_default(),
            key: self.key.expect("key is required"),
            version: self.version.expect("version is required"),
            contract: self.contract.expect("contract is required"),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: self.payload.expect("payload is required"),
        }
    }

    /// Tries to build the event record, returning None if required fields are missing.
    pub fn try_build(self) -> Option<EventRecord> {
        Some(EventRecord {
            event_id: self.event_id.unwrap_or_default(),
            key: self.key?,
            version: self.version?,
            contract: self.contract?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: self.payload?,
        })
    }
}
