use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique key identifying one aggregate's event stream.
///
/// A UUID newtype so stream keys cannot be confused with other UUID-shaped
/// identifiers at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateKey(Uuid);

impl AggregateKey {
    /// Generates a fresh random key.
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

impl Default for AggregateKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AggregateKey {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateKey> for Uuid {
    fn from(key: AggregateKey) -> Self {
        key.0
    }
}
