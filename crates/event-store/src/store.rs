use async_trait::async_trait;

use crate::{
    AggregateKey, EventRecord, EventToSave, Result, SnapshotRecord, SnapshotToSave, StoreError,
    Version,
};

/// Core trait for persistence engines backing the repository.
///
/// A store keeps one versioned event stream (plus at most one snapshot) per
/// aggregate key. Writes are atomic per call: either every event in the batch
/// is persisted or none is. Insert and update are distinct operations so that
/// first-time creation carries no precondition while every subsequent write
/// carries the optimistic-concurrency check.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// Retrieves the full event stream for a key, in version order.
    ///
    /// Returns an empty vector when no stream exists; the repository layer
    /// decides whether that is a not-found condition.
    async fn read_history(&self, key: AggregateKey) -> Result<Vec<EventRecord>>;

    /// Retrieves the events for a key starting at `from_version` inclusive.
    ///
    /// Useful when replaying on top of a snapshot.
    async fn read_history_from(
        &self,
        key: AggregateKey,
        from_version: Version,
    ) -> Result<Vec<EventRecord>>;

    /// Retrieves the latest snapshot for a key, if one exists.
    async fn read_snapshot(&self, key: AggregateKey) -> Result<Option<SnapshotRecord>>;

    /// Creates a new stream from a batch of events, optionally with a snapshot.
    ///
    /// Fails with `ConcurrencyConflict` when a stream already exists for the
    /// key (two creators raced). Returns the events as persisted, in order.
    async fn insert(
        &self,
        key: AggregateKey,
        events: Vec<EventToSave>,
        snapshot: Option<SnapshotToSave>,
    ) -> Result<Vec<EventRecord>>;

    /// Appends a batch of events to an existing stream.
    ///
    /// The stream's current version must equal `original_version` or the
    /// write fails with `ConcurrencyConflict`; a missing stream fails with
    /// `KeyNotFound`. Returns the events as persisted, in order.
    async fn update(
        &self,
        key: AggregateKey,
        events: Vec<EventToSave>,
        snapshot: Option<SnapshotToSave>,
        original_version: Version,
    ) -> Result<Vec<EventRecord>>;
}

/// Extension trait providing convenience methods for stores.
#[async_trait]
pub trait StoreExt: Store {
    /// Loads everything needed to rebuild an aggregate.
    ///
    /// If a snapshot exists, returns it along with the events after it.
    /// Otherwise returns None and the full stream.
    async fn load(
        &self,
        key: AggregateKey,
    ) -> Result<(Option<SnapshotRecord>, Vec<EventRecord>)> {
        if let Some(snapshot) = self.read_snapshot(key).await? {
            let events = self
                .read_history_from(key, snapshot.version.next())
                .await?;
            Ok((Some(snapshot), events))
        } else {
            let events = self.read_history(key).await?;
            Ok((None, events))
        }
    }

    /// Returns the current version of a stream, or None when absent.
    async fn current_version(&self, key: AggregateKey) -> Result<Option<Version>> {
        let history = self.read_history(key).await?;
        Ok(history.last().map(|record| record.version))
    }
}

// Blanket implementation for all Store implementations
impl<T: Store + ?Sized> StoreExt for T {}

/// Validates an event batch before it is written.
///
/// A batch must be non-empty, start at `start` and advance by exactly one
/// version per event. Anything else is a caller bug surfaced as
/// `StoreError::InvalidBatch`.
pub fn validate_batch(events: &[EventToSave], start: Version) -> Result<()> {
    if events.is_empty() {
        return Err(StoreError::InvalidBatch {
            message: "cannot write an empty event batch".to_string(),
        });
    }

    let mut expected = start;
    for event in events {
        if event.version != expected {
            return Err(StoreError::InvalidBatch {
                message: format!(
                    "event versions must be sequential: expected {}, got {}",
                    expected, event.version
                ),
            });
        }
        expected = expected.next();
    }

    Ok(())
}
