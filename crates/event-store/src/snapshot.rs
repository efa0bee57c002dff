use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AggregateKey, Version};

/// A snapshot to be written to a store.
///
/// Pairs the serialized aggregate state with its contract tag, the version
/// the state reflects, and the original version the writer loaded at. The
/// original version mirrors the optimistic-concurrency precondition of the
/// update that carries this snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotToSave {
    /// Stable contract tag identifying the state type.
    pub contract: String,

    /// Stream version the captured state reflects.
    pub version: Version,

    /// The persisted version the writing operation started from.
    pub original_version: Version,

    /// The serialized aggregate state.
    pub payload: serde_json::Value,
}

impl SnapshotToSave {
    /// Creates a snapshot write DTO from a serializable state.
    pub fn from_state<T: Serialize>(
        contract: impl Into<String>,
        version: Version,
        original_version: Version,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            contract: contract.into(),
            version,
            original_version,
            payload: serde_json::to_value(state)?,
        })
    }
}

/// Stored state capture for one aggregate at one version.
///
/// Loads start from the latest snapshot and replay only the events after it,
/// keeping rebuild cost flat as streams grow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// The aggregate the capture belongs to.
    pub key: AggregateKey,

    /// Stable contract tag identifying the state type.
    pub contract: String,

    /// Stream version the captured state reflects.
    pub version: Version,

    /// When the store accepted the snapshot.
    pub timestamp: DateTime<Utc>,

    /// Serialized aggregate state.
    pub state: serde_json::Value,
}

impl SnapshotRecord {
    /// Creates a new snapshot record.
    pub fn new(
        key: AggregateKey,
        contract: impl Into<String>,
        version: Version,
        state: serde_json::Value,
    ) -> Self {
        Self {
            key,
            contract: contract.into(),
            version,
            timestamp: Utc::now(),
            state,
        }
    }

    /// Promotes a write DTO to a stored record.
    pub fn from_save(key: AggregateKey, snapshot: SnapshotToSave) -> Self {
        Self {
            key,
            contract: snapshot.contract,
            version: snapshot.version,
            timestamp: Utc::now(),
            state: snapshot.payload,
        }
    }

    /// Recovers the concrete state type from the stored JSON.
    pub fn into_state<T: for<'de> Deserialize<'de>>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }
}
