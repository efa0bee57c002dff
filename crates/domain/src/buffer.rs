use event_store::Version;

use crate::aggregate::RecordedEvent;

/// Ordered, append-only sequence of uncommitted events produced by one
/// aggregate instance during one operation.
///
/// The buffer is the aggregate's explicit event sink: `publish` appends
/// here, and the repository drains it at flush time. It remembers the
/// `original_version` (the persisted version before the first buffered
/// event), which becomes the optimistic-concurrency precondition on update.
/// A buffer is never shared across aggregate instances.
#[derive(Debug)]
pub struct EventBuffer<E> {
    original_version: Version,
    events: Vec<RecordedEvent<E>>,
}

impl<E> EventBuffer<E> {
    /// Creates an empty buffer rooted at the given persisted version.
    pub(crate) fn new(original_version: Version) -> Self {
        Self {
            original_version,
            events: Vec::new(),
        }
    }

    /// The persisted version before the first buffered event.
    pub fn original_version(&self) -> Version {
        self.original_version
    }

    /// Number of uncommitted events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true when no events are buffered.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterates the buffered events in publication order.
    pub fn iter(&self) -> impl Iterator<Item = &RecordedEvent<E>> {
        self.events.iter()
    }

    pub(crate) fn append(&mut self, recorded: RecordedEvent<E>) {
        self.events.push(recorded);
    }

    /// Clears the buffer and re-roots it at the given persisted version.
    pub(crate) fn reset(&mut self, original_version: Version) {
        self.events.clear();
        self.original_version = original_version;
    }

    /// Takes all buffered events, re-rooting the buffer at `new_original`.
    /// Returns the previous original version together with the events.
    pub(crate) fn drain(&mut self, new_original: Version) -> (Version, Vec<RecordedEvent<E>>) {
        let original = self.original_version;
        self.original_version = new_original;
        (original, std::mem::take(&mut self.events))
    }
}
