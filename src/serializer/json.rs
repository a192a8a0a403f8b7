//! Textual JSON codec.

use serde_json::Value;

use super::Serializer;
use crate::error::CacheError;

/// UTF-8 JSON codec.
///
/// Portable and human-readable: any Redis client can inspect the payloads.
/// Supports exactly the JSON data model (mapping, sequence, string, number,
/// bool, null).
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for JsonSerializer {
    fn name(&self) -> &str {
        "json"
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(value).map_err(|e| CacheError::serialization(self.name(), e))
    }

    fn deserialize(&self, data: &[u8]) -> Result<Value, CacheError> {
        serde_json::from_slice(data).map_err(|e| CacheError::serialization(self.name(), e))
    }
}
