use async_trait::async_trait;
use event_store::EventRecord;

use crate::error::DomainError;

/// A resource with pending changes that a unit of work can flush.
///
/// Repositories implement this; flushing writes every tracked aggregate's
/// buffered events to the store and returns the records as persisted, for
/// cascading dispatch.
#[async_trait]
pub trait UnitOfWorkResource: Send {
    async fn flush(&mut self) -> Result<Vec<EventRecord>, DomainError>;
}

/// Lifecycle of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkState {
    /// Open; resources may enlist.
    Active,
    /// Commit in progress.
    Flushing,
    /// All resources flushed.
    Completed,
    /// Dropped or failed without flushing (remaining) resources.
    Discarded,
}

/// The scope of one logical message-handling operation.
///
/// Created when handling of an inbound message begins and passed explicitly
/// to handlers, never thread-local or ambient. Resources with pending
/// changes enlist while the scope is active; on success the pipeline commits
/// the scope, flushing every enlisted resource in order. Dropping the scope
/// without committing discards all buffered, unflushed events.
///
/// Consistency boundary: atomicity holds per aggregate (one store write per
/// aggregate), not across resources. If a flush fails midway, resources
/// flushed earlier in the same commit stay committed; there is no
/// two-phase commit across repositories.
pub struct UnitOfWork {
    state: UnitOfWorkState,
    resources: Vec<Box<dyn UnitOfWorkResource>>,
}

impl UnitOfWork {
    /// Opens a new, active unit of work.
    pub fn new() -> Self {
        Self {
            state: UnitOfWorkState::Active,
            resources: Vec::new(),
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> UnitOfWorkState {
        self.state
    }

    /// Number of enlisted resources.
    pub fn enlisted(&self) -> usize {
        self.resources.len()
    }

    /// Enlists a resource to be flushed at commit time.
    pub fn enlist<R: UnitOfWorkResource + 'static>(&mut self, resource: R) {
        self.resources.push(Box::new(resource));
    }

    /// Flushes every enlisted resource in enlistment order and returns all
    /// flushed records, concatenated.
    ///
    /// On the first flush failure the remaining resources are not flushed
    /// and the error propagates; earlier flushes in this commit stand.
    #[tracing::instrument(skip(self), fields(resources = self.resources.len()))]
    pub async fn commit(mut self) -> Result<Vec<EventRecord>, DomainError> {
        self.state = UnitOfWorkState::Flushing;
        let mut flushed = Vec::new();
        for resource in &mut self.resources {
            match resource.flush().await {
                Ok(mut records) => flushed.append(&mut records),
                Err(err) => {
                    self.state = UnitOfWorkState::Discarded;
                    metrics::counter!("uow_flush_failures_total").increment(1);
                    return Err(err);
                }
            }
        }
        self.state = UnitOfWorkState::Completed;
        metrics::counter!("uow_commits_total").increment(1);
        tracing::debug!(events = flushed.len(), "unit of work committed");
        Ok(flushed)
    }

    /// Explicitly discards the scope; buffered, unflushed events are dropped
    /// with it.
    pub fn discard(mut self) {
        self.state = UnitOfWorkState::Discarded;
    }
}

impl Default for UnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.state == UnitOfWorkState::Active && !self.resources.is_empty() {
            tracing::debug!(
                resources = self.resources.len(),
                "unit of work dropped without commit; buffered events discarded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::{AggregateKey, Version};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubResource {
        order: Arc<std::sync::Mutex<Vec<&'static str>>>,
        name: &'static str,
        records: Vec<EventRecord>,
        fail: bool,
        flushes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl UnitOfWorkResource for StubResource {
        async fn flush(&mut self) -> Result<Vec<EventRecord>, DomainError> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            self.order.lock().unwrap().push(self.name);
            if self.fail {
                return Err(DomainError::ItemNotFound(AggregateKey::new()));
            }
            Ok(std::mem::take(&mut self.records))
        }
    }

    fn record() -> EventRecord {
        EventRecord::builder()
            .key(AggregateKey::new())
            .version(Version::first())
            .contract("StubEvent")
            .payload_raw(serde_json::json!({}))
            .build()
    }

    fn stub(
        name: &'static str,
        order: &Arc<std::sync::Mutex<Vec<&'static str>>>,
        flushes: &Arc<AtomicUsize>,
        records: usize,
        fail: bool,
    ) -> StubResource {
        StubResource {
            order: Arc::clone(order),
            name,
            records: (0..records).map(|_| record()).collect(),
            fail,
            flushes: Arc::clone(flushes),
        }
    }

    #[tokio::test]
    async fn commit_flushes_in_enlistment_order_and_concatenates() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let flushes = Arc::new(AtomicUsize::new(0));

        let mut uow = UnitOfWork::new();
        assert_eq!(uow.state(), UnitOfWorkState::Active);
        uow.enlist(stub("a", &order, &flushes, 2, false));
        uow.enlist(stub("b", &order, &flushes, 1, false));
        assert_eq!(uow.enlisted(), 2);

        let flushed = uow.commit().await.unwrap();
        assert_eq!(flushed.len(), 3);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(flushes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn commit_stops_at_first_failure() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let flushes = Arc::new(AtomicUsize::new(0));

        let mut uow = UnitOfWork::new();
        uow.enlist(stub("a", &order, &flushes, 1, false));
        uow.enlist(stub("b", &order, &flushes, 0, true));
        uow.enlist(stub("c", &order, &flushes, 1, false));

        let err = uow.commit().await.unwrap_err();
        assert!(matches!(err, DomainError::ItemNotFound(_)));
        // "a" committed, "b" failed, "c" was never flushed.
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(flushes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn discard_flushes_nothing() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let flushes = Arc::new(AtomicUsize::new(0));

        let mut uow = UnitOfWork::new();
        uow.enlist(stub("a", &order, &flushes, 1, false));
        uow.discard();

        assert_eq!(flushes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_commit_yields_no_records() {
        let flushed = UnitOfWork::new().commit().await.unwrap();
        assert!(flushed.is_empty());
    }
}
