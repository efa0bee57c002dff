//! Serialization seam between domain payloads and stored JSON.

use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;

/// Converts payloads to and from their stored representation.
///
/// The kernel is written against this trait so the wire format stays a
/// pluggable collaborator; [`JsonSerializer`] is the default.
pub trait Serializer: Send + Sync {
    /// Serializes a payload to its stored form.
    fn to_value<T: Serialize>(&self, payload: &T) -> Result<serde_json::Value>;

    /// Deserializes a payload from its stored form.
    fn from_value<T: DeserializeOwned>(&self, value: serde_json::Value) -> Result<T>;
}

/// JSON serializer backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn to_value<T: Serialize>(&self, payload: &T) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(payload)?)
    }

    fn from_value<T: DeserializeOwned>(&self, value: serde_json::Value) -> Result<T> {
        Ok(serde_json::from_value(value)?)
    }
}
