use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateKey, EventRecord, EventToSave, Result, SnapshotRecord, SnapshotToSave, StoreError,
    Version,
    store::{Store, validate_batch},
};

#[derive(Debug, Default, Clone)]
struct StreamSlot {
    records: Vec<EventRecord>,
    snapshot: Option<SnapshotRecord>,
}

impl StreamSlot {
    fn current_version(&self) -> Version {
        self.records
            .last()
            .map(|record| record.version)
            .unwrap_or_else(Version::initial)
    }
}

/// In-memory store implementation for testing.
///
/// Keeps one stream slot per aggregate key behind an async lock, giving the
/// same insert/update and conflict semantics a durable engine would.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    streams: Arc<RwLock<HashMap<AggregateKey, StreamSlot>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored across all streams.
    pub async fn event_count(&self) -> usize {
        self.streams
            .read()
            .await
            .values()
            .map(|slot| slot.records.len())
            .sum()
    }

    /// Clears all streams and snapshots.
    pub async fn clear(&self) {
        self.streams.write().await.clear();
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn read_history(&self, key: AggregateKey) -> Result<Vec<EventRecord>> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(&key)
            .map(|slot| slot.records.clone())
            .unwrap_or_default())
    }

    async fn read_history_from(
        &self,
        key: AggregateKey,
        from_version: Version,
    ) -> Result<Vec<EventRecord>> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(&key)
            .map(|slot| {
                slot.records
                    .iter()
                    .filter(|record| record.version >= from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn read_snapshot(&self, key: AggregateKey) -> Result<Option<SnapshotRecord>> {
        let streams = self.streams.read().await;
        Ok(streams.get(&key).and_then(|slot| slot.snapshot.clone()))
    }

    async fn insert(
        &self,
        key: AggregateKey,
        events: Vec<EventToSave>,
        snapshot: Option<SnapshotToSave>,
    ) -> Result<Vec<EventRecord>> {
        validate_batch(&events, Version::first())?;

        let mut streams = self.streams.write().await;
        if let Some(slot) = streams.get(&key)
            && !slot.records.is_empty()
        {
            // Another creator won the race for this key.
            return Err(StoreError::ConcurrencyConflict {
                key,
                expected: Version::initial(),
                actual: slot.current_version(),
            });
        }

        let records: Vec<EventRecord> = events
            .into_iter()
            .map(|event| EventRecord::from_save(key, event))
            .collect();

        let slot = streams.entry(key).or_default();
        slot.records.extend(records.iter().cloned());
        if let Some(snapshot) = snapshot {
            slot.snapshot = Some(SnapshotRecord::from_save(key, snapshot));
        }

        Ok(records)
    }

    async fn update(
        &self,
        key: AggregateKey,
        events: Vec<EventToSave>,
        snapshot: Option<SnapshotToSave>,
        original_version: Version,
    ) -> Result<Vec<EventRecord>> {
        validate_batch(&events, original_version.next())?;

        let mut streams = self.streams.write().await;
        let slot = streams.get_mut(&key).ok_or(StoreError::KeyNotFound(key))?;

        let current = slot.current_version();
        if current != original_version {
            return Err(StoreError::ConcurrencyConflict {
                key,
                expected: original_version,
                actual: current,
            });
        }

        let records: Vec<EventRecord> = events
            .into_iter()
            .map(|event| EventRecord::from_save(key, event))
            .collect();

        slot.records.extend(records.iter().cloned());
        if let Some(snapshot) = snapshot {
            slot.snapshot = Some(SnapshotRecord::from_save(key, snapshot));
        }

        Ok(records)
    }
}
