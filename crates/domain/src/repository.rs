use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use event_store::{
    AggregateKey, ContractMap, EventRecord, EventToSave, JsonSerializer, Serializer,
    SnapshotToSave, Store, StoreError, StoreExt, Version,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::aggregate::{AggregateState, DomainEvent, RecordedEvent};
use crate::error::DomainError;
use crate::registry::EventHandlerRegistry;
use crate::root::AggregateRoot;
use crate::unit_of_work::UnitOfWorkResource;

/// How a tracked aggregate will be written at flush time.
#[derive(Debug, Clone, Copy)]
enum Persistence {
    /// First-time insert; no prior-version precondition.
    Insert,
    /// Versioned update; the store's current version must equal
    /// `original_version` or the flush fails with a concurrency conflict.
    Update { original_version: Version },
}

struct Tracked<S: AggregateState> {
    root: AggregateRoot<S>,
    mode: Persistence,
}

/// Reconciles aggregates' event buffers against a backing store.
///
/// A repository lives for one unit of work: aggregates loaded or added
/// within the operation are tracked here, and the enclosing [`UnitOfWork`]
/// flushes the repository; handlers never flush directly. Each flush is
/// all-or-nothing per aggregate; the repository implements no retry policy
/// (retrying on conflict belongs to the caller).
///
/// The store is the source of truth per read: `get_by_id` always consults
/// the store for keys not already tracked in this operation.
///
/// [`UnitOfWork`]: crate::unit_of_work::UnitOfWork
pub struct Repository<S, St, Ser = JsonSerializer>
where
    S: AggregateState,
    St: Store,
    Ser: Serializer,
{
    store: St,
    serializer: Ser,
    registry: Arc<EventHandlerRegistry<S>>,
    contracts: ContractMap,
    tracked: HashMap<AggregateKey, Tracked<S>>,
    snapshot_interval: Option<u64>,
}

impl<S, St> Repository<S, St>
where
    S: AggregateState + Serialize + DeserializeOwned,
    St: Store,
{
    /// Creates a repository over the given store with JSON serialization.
    pub fn new(store: St, registry: Arc<EventHandlerRegistry<S>>) -> Self {
        Self::with_serializer(store, registry, JsonSerializer)
    }
}

impl<S, St, Ser> Repository<S, St, Ser>
where
    S: AggregateState + Serialize + DeserializeOwned,
    St: Store,
    Ser: Serializer,
{
    /// Creates a repository with an explicit serializer.
    pub fn with_serializer(
        store: St,
        registry: Arc<EventHandlerRegistry<S>>,
        serializer: Ser,
    ) -> Self {
        let mut contracts = ContractMap::new();
        // A fresh map with a single entry cannot collide.
        let _ = contracts.register::<S>(S::aggregate_type());
        Self {
            store,
            serializer,
            registry,
            contracts,
            tracked: HashMap::new(),
            snapshot_interval: None,
        }
    }

    /// Enables snapshotting: a snapshot is written alongside the events
    /// whenever a flush moves the aggregate across a multiple of `interval`.
    pub fn with_snapshots(mut self, interval: u64) -> Self {
        self.snapshot_interval = Some(interval);
        self
    }

    /// The contract map for this repository's aggregate type.
    pub fn contracts(&self) -> &ContractMap {
        &self.contracts
    }

    /// Number of aggregates tracked in the current unit of work.
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Creates a fresh aggregate under `key` and tracks it for insertion at
    /// the next flush. Fails with `DuplicateKey` when the key is already
    /// tracked in this unit of work.
    pub fn create(&mut self, key: AggregateKey) -> Result<&mut AggregateRoot<S>, DomainError> {
        match self.tracked.entry(key) {
            Entry::Occupied(_) => Err(DomainError::DuplicateKey(key)),
            Entry::Vacant(slot) => {
                let tracked = slot.insert(Tracked {
                    root: AggregateRoot::new(key, Arc::clone(&self.registry)),
                    mode: Persistence::Insert,
                });
                Ok(&mut tracked.root)
            }
        }
    }

    /// Tracks an externally constructed aggregate for insertion at the next
    /// flush. Fails with `DuplicateKey` when the key is already tracked.
    pub fn add(&mut self, root: AggregateRoot<S>) -> Result<(), DomainError> {
        match self.tracked.entry(root.key()) {
            Entry::Occupied(_) => Err(DomainError::DuplicateKey(root.key())),
            Entry::Vacant(slot) => {
                slot.insert(Tracked {
                    root,
                    mode: Persistence::Insert,
                });
                Ok(())
            }
        }
    }

    /// Loads the aggregate for `key`, replaying the latest snapshot plus
    /// subsequent events (or the full stream when no snapshot exists).
    ///
    /// Fails with `ItemNotFound` when the store has no record for the key.
    /// The loaded aggregate is tracked for a versioned update at flush time;
    /// repeated calls within one unit of work return the tracked instance.
    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(
        &mut self,
        key: AggregateKey,
    ) -> Result<&mut AggregateRoot<S>, DomainError> {
        if !self.tracked.contains_key(&key) {
            let root = self.load(key).await?;
            let original_version = root.version();
            self.tracked.insert(
                key,
                Tracked {
                    root,
                    mode: Persistence::Update { original_version },
                },
            );
        }
        match self.tracked.get_mut(&key) {
            Some(tracked) => Ok(&mut tracked.root),
            None => Err(DomainError::ItemNotFound(key)),
        }
    }

    async fn load(&self, key: AggregateKey) -> Result<AggregateRoot<S>, DomainError> {
        let (snapshot, records) = self.store.load(key).await?;
        if snapshot.is_none() && records.is_empty() {
            return Err(DomainError::ItemNotFound(key));
        }

        let mut root = match snapshot {
            Some(snapshot) => {
                let state: S = self.serializer.from_value(snapshot.state)?;
                AggregateRoot::rehydrate(key, snapshot.version, state, Arc::clone(&self.registry))
            }
            None => AggregateRoot::new(key, Arc::clone(&self.registry)),
        };

        let history = records
            .into_iter()
            .map(|record| {
                let event: S::Event = self.serializer.from_value(record.payload)?;
                Ok(RecordedEvent::new(record.key, record.version, event))
            })
            .collect::<Result<Vec<_>, DomainError>>()?;
        root.replay_history(history)?;

        Ok(root)
    }
}

/// Returns true when moving from `original` to `current` crosses a multiple
/// of the snapshot interval.
fn crosses_interval(original: Version, current: Version, interval: u64) -> bool {
    if interval == 0 {
        return false;
    }
    let interval = interval as i64;
    current.as_i64() / interval > original.as_i64() / interval
}

#[async_trait]
impl<S, St, Ser> UnitOfWorkResource for Repository<S, St, Ser>
where
    S: AggregateState + Serialize + DeserializeOwned,
    St: Store,
    Ser: Serializer,
{
    #[tracing::instrument(skip(self), fields(aggregate_type = S::aggregate_type()))]
    async fn flush(&mut self) -> Result<Vec<EventRecord>, DomainError> {
        let Self {
            store,
            serializer,
            contracts,
            tracked,
            snapshot_interval,
            ..
        } = self;
        let contract = contracts
            .contract_of::<S>()
            .unwrap_or_else(S::aggregate_type);

        let mut flushed = Vec::new();
        for (key, entry) in tracked.iter_mut() {
            if entry.root.buffer().is_empty() {
                continue;
            }

            let new_version = entry.root.version();
            let (original_version, pending) = entry.root.drain_buffer();

            let mut events = Vec::with_capacity(pending.len());
            for recorded in &pending {
                events.push(EventToSave::new(
                    recorded.event.event_type(),
                    recorded.version,
                    serializer.to_value(&recorded.event)?,
                ));
            }

            let snapshot = match snapshot_interval {
                Some(interval) if crosses_interval(original_version, new_version, *interval) => {
                    Some(
                        SnapshotToSave::from_state(
                            contract,
                            new_version,
                            original_version,
                            entry.root.state(),
                        )
                        .map_err(StoreError::Serialization)?,
                    )
                }
                _ => None,
            };

            let records = match entry.mode {
                Persistence::Insert => store.insert(*key, events, snapshot).await?,
                Persistence::Update { original_version } => {
                    store.update(*key, events, snapshot, original_version).await?
                }
            };

            entry.mode = Persistence::Update {
                original_version: new_version,
            };
            metrics::counter!("repository_events_flushed_total")
                .increment(records.len() as u64);
            flushed.extend(records);
        }

        Ok(flushed)
    }
}
