//! End-to-end tests for the repository and unit-of-work flow against the
//! in-memory store: insert vs. update, conflict detection, snapshots.

use std::sync::Arc;

use domain::{
    AggregateState, DomainError, DomainEvent, EventHandlerRegistry, Repository, UnitOfWork,
};
use event_store::{AggregateKey, InMemoryStore, Store, StoreExt, Version};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TicketEvent {
    Opened { title: String },
    Commented { body: String },
    Closed,
}

impl DomainEvent for TicketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TicketEvent::Opened { .. } => "TicketOpened",
            TicketEvent::Commented { .. } => "TicketCommented",
            TicketEvent::Closed => "TicketClosed",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct TicketState {
    title: String,
    comments: Vec<String>,
    open: bool,
}

impl AggregateState for TicketState {
    type Event = TicketEvent;

    fn aggregate_type() -> &'static str {
        "Ticket"
    }
}

fn registry() -> Arc<EventHandlerRegistry<TicketState>> {
    EventHandlerRegistry::<TicketState>::builder()
        .on("TicketOpened", |state, event| {
            if let TicketEvent::Opened { title } = event {
                state.title = title.clone();
                state.open = true;
            }
        })
        .unwrap()
        .on("TicketCommented", |state, event| {
            if let TicketEvent::Commented { body } = event {
                state.comments.push(body.clone());
            }
        })
        .unwrap()
        .on("TicketClosed", |state, _| {
            state.open = false;
        })
        .unwrap()
        .build()
}

fn repository(store: &InMemoryStore) -> Repository<TicketState, InMemoryStore> {
    Repository::new(store.clone(), registry())
}

async fn open_ticket(
    store: &InMemoryStore,
    key: AggregateKey,
    comments: usize,
) -> Result<(), DomainError> {
    let mut repo = repository(store);
    let ticket = repo.create(key)?;
    ticket.publish(|_, _| TicketEvent::Opened {
        title: "printer on fire".into(),
    })?;
    for n in 0..comments {
        ticket.publish(|_, _| TicketEvent::Commented {
            body: format!("comment {n}"),
        })?;
    }
    let mut uow = UnitOfWork::new();
    uow.enlist(repo);
    uow.commit().await?;
    Ok(())
}

#[tokio::test]
async fn insert_then_reload_from_independent_repository() {
    let store = InMemoryStore::new();
    let key = AggregateKey::new();

    let mut repo = repository(&store);
    let ticket = repo.create(key).unwrap();
    ticket
        .publish(|_, _| TicketEvent::Opened {
            title: "printer on fire".into(),
        })
        .unwrap();
    ticket
        .publish(|_, _| TicketEvent::Commented {
            body: "still burning".into(),
        })
        .unwrap();
    ticket
        .publish(|_, _| TicketEvent::Commented {
            body: "send help".into(),
        })
        .unwrap();

    // Buffer holds the uncommitted events in publication order.
    let versions: Vec<_> = ticket.buffer().iter().map(|r| r.version).collect();
    assert_eq!(
        versions,
        vec![Version::new(1), Version::new(2), Version::new(3)]
    );

    let mut uow = UnitOfWork::new();
    uow.enlist(repo);
    let flushed = uow.commit().await.unwrap();
    assert_eq!(flushed.len(), 3);
    assert_eq!(flushed[0].contract, "TicketOpened");
    assert_eq!(store.event_count().await, 3);

    // A second, independent repository reconstructs the aggregate from the
    // store alone.
    let mut fresh = repository(&store);
    let reloaded = fresh.get_by_id(key).await.unwrap();
    assert_eq!(reloaded.version(), Version::new(3));
    assert_eq!(reloaded.state().title, "printer on fire");
    assert_eq!(reloaded.state().comments.len(), 2);
    assert!(reloaded.buffer().is_empty());
}

#[tokio::test]
async fn concurrent_writers_from_same_version_one_wins() {
    let store = InMemoryStore::new();
    let key = AggregateKey::new();
    open_ticket(&store, key, 2).await.unwrap();

    // Two repositories load the same aggregate at version 3.
    let mut repo_a = repository(&store);
    let mut repo_b = repository(&store);
    repo_a
        .get_by_id(key)
        .await
        .unwrap()
        .publish(|_, _| TicketEvent::Closed)
        .unwrap();
    repo_b
        .get_by_id(key)
        .await
        .unwrap()
        .publish(|_, _| TicketEvent::Commented {
            body: "late to the party".into(),
        })
        .unwrap();

    // First flush wins.
    let mut uow_a = UnitOfWork::new();
    uow_a.enlist(repo_a);
    uow_a.commit().await.unwrap();

    // The second flush still carries originalVersion=3 and must conflict.
    let mut uow_b = UnitOfWork::new();
    uow_b.enlist(repo_b);
    let err = uow_b.commit().await.unwrap_err();
    assert!(err.is_concurrency_conflict());

    // The losing write left no trace.
    let history = store.read_history(key).await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history.last().unwrap().contract, "TicketClosed");
}

#[tokio::test]
async fn two_creators_for_one_key_conflict() {
    let store = InMemoryStore::new();
    let key = AggregateKey::new();

    open_ticket(&store, key, 0).await.unwrap();
    let err = open_ticket(&store, key, 0).await.unwrap_err();
    assert!(err.is_concurrency_conflict());
}

#[tokio::test]
async fn get_by_id_for_unknown_key_is_not_found() {
    let store = InMemoryStore::new();
    let mut repo = repository(&store);

    let err = repo.get_by_id(AggregateKey::new()).await.unwrap_err();
    assert!(matches!(err, DomainError::ItemNotFound(_)));
}

#[tokio::test]
async fn adding_the_same_key_twice_in_one_unit_of_work_fails() {
    let store = InMemoryStore::new();
    let key = AggregateKey::new();
    let mut repo = repository(&store);

    repo.create(key).unwrap();
    let err = repo.create(key).unwrap_err();
    assert!(matches!(err, DomainError::DuplicateKey(k) if k == key));
}

#[tokio::test]
async fn repeated_get_by_id_returns_the_tracked_instance() {
    let store = InMemoryStore::new();
    let key = AggregateKey::new();
    open_ticket(&store, key, 0).await.unwrap();

    let mut repo = repository(&store);
    repo.get_by_id(key)
        .await
        .unwrap()
        .publish(|_, _| TicketEvent::Commented {
            body: "first".into(),
        })
        .unwrap();

    // The buffered event is still visible through the second get.
    let ticket = repo.get_by_id(key).await.unwrap();
    assert_eq!(ticket.buffer().len(), 1);
    assert_eq!(repo.tracked_count(), 1);
}

#[tokio::test]
async fn flush_without_buffered_events_writes_nothing() {
    let store = InMemoryStore::new();
    let key = AggregateKey::new();
    open_ticket(&store, key, 0).await.unwrap();

    let mut repo = repository(&store);
    repo.get_by_id(key).await.unwrap();

    let mut uow = UnitOfWork::new();
    uow.enlist(repo);
    let flushed = uow.commit().await.unwrap();
    assert!(flushed.is_empty());
    assert_eq!(store.event_count().await, 1);
}

#[tokio::test]
async fn snapshot_written_when_interval_crossed_and_used_on_reload() {
    let store = InMemoryStore::new();
    let key = AggregateKey::new();

    let mut repo = repository(&store).with_snapshots(2);
    let ticket = repo.create(key).unwrap();
    ticket
        .publish(|_, _| TicketEvent::Opened {
            title: "flaky build".into(),
        })
        .unwrap();
    ticket
        .publish(|_, _| TicketEvent::Commented {
            body: "retrying".into(),
        })
        .unwrap();
    ticket
        .publish(|_, _| TicketEvent::Commented {
            body: "green now".into(),
        })
        .unwrap();

    let mut uow = UnitOfWork::new();
    uow.enlist(repo);
    uow.commit().await.unwrap();

    let snapshot = store.read_snapshot(key).await.unwrap().unwrap();
    assert_eq!(snapshot.version, Version::new(3));
    assert_eq!(snapshot.contract, "Ticket");

    // Reload goes through the snapshot; no events remain after it.
    let (loaded_snapshot, tail) = store.load(key).await.unwrap();
    assert!(loaded_snapshot.is_some());
    assert!(tail.is_empty());

    let mut fresh = repository(&store);
    let reloaded = fresh.get_by_id(key).await.unwrap();
    assert_eq!(reloaded.version(), Version::new(3));
    assert_eq!(reloaded.state().comments.len(), 2);
    assert!(reloaded.state().open);
}

#[tokio::test]
async fn update_after_snapshot_replays_snapshot_plus_tail() {
    let store = InMemoryStore::new();
    let key = AggregateKey::new();

    // Insert with snapshot at version 2.
    let mut repo = repository(&store).with_snapshots(2);
    let ticket = repo.create(key).unwrap();
    ticket
        .publish(|_, _| TicketEvent::Opened {
            title: "slow query".into(),
        })
        .unwrap();
    ticket
        .publish(|_, _| TicketEvent::Commented {
            body: "added index".into(),
        })
        .unwrap();
    let mut uow = UnitOfWork::new();
    uow.enlist(repo);
    uow.commit().await.unwrap();

    // Update without crossing the next interval: event 3 only.
    let mut repo = repository(&store).with_snapshots(2);
    repo.get_by_id(key)
        .await
        .unwrap()
        .publish(|_, _| TicketEvent::Closed)
        .unwrap();
    let mut uow = UnitOfWork::new();
    uow.enlist(repo);
    uow.commit().await.unwrap();

    let snapshot = store.read_snapshot(key).await.unwrap().unwrap();
    assert_eq!(snapshot.version, Version::new(2));

    let mut fresh = repository(&store);
    let reloaded = fresh.get_by_id(key).await.unwrap();
    assert_eq!(reloaded.version(), Version::new(3));
    assert!(!reloaded.state().open);
}
