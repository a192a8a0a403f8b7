//! Value Serialization
//!
//! Pluggable codecs for the bytes that cross the process/remote boundary.
//!
//! This module provides:
//! - A `Serializer` trait defining the codec contract
//! - A self-describing binary codec (MessagePack), the default
//! - A textual JSON codec for portable, human-readable payloads
//! - A process-wide registry mapping short names to codec constructors
//!
//! # Example
//!
//! ```rust,ignore
//! use resilient_cache::serializer::{get_serializer, register_serializer};
//! use serde_json::json;
//!
//! let codec = get_serializer("json")?;
//! let bytes = codec.serialize(&json!({"n": "A"}))?;
//! assert_eq!(bytes, br#"{"n":"A"}"#);
//! ```

mod binary;
mod json;

pub use binary::BinarySerializer;
pub use json::JsonSerializer;

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::CacheError;

/// Codec contract for values stored in the remote tier.
///
/// Implementations must be stateless or internally synchronized: the
/// coordinator shares one instance across all concurrent callers. Both
/// operations fail with [`CacheError::Serialization`] carrying the codec's
/// registry name; the remote store attaches the cache key before
/// propagating.
pub trait Serializer: Send + Sync + std::fmt::Debug {
    /// Registry name of this codec, carried into error context and stats.
    fn name(&self) -> &str;

    /// Encodes a value into the byte payload stored remotely.
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, CacheError>;

    /// Decodes a byte payload back into a value.
    fn deserialize(&self, data: &[u8]) -> Result<Value, CacheError>;
}

/// Constructor stored in the registry for each codec name.
pub type SerializerFactory = Arc<dyn Fn() -> Arc<dyn Serializer> + Send + Sync>;

static REGISTRY: Lazy<RwLock<HashMap<String, SerializerFactory>>> = Lazy::new(|| {
    let mut map: HashMap<String, SerializerFactory> = HashMap::new();
    map.insert(
        "binary".to_string(),
        Arc::new(|| Arc::new(BinarySerializer::new()) as Arc<dyn Serializer>),
    );
    map.insert(
        "json".to_string(),
        Arc::new(|| Arc::new(JsonSerializer::new()) as Arc<dyn Serializer>),
    );
    RwLock::new(map)
});

/// Registers a custom serializer constructor under `name`.
///
/// Registration is expected at application startup; later lookups via
/// [`get_serializer`] resolve the most recently registered constructor.
/// Custom codecs must honor the same error contract as the built-ins.
pub fn register_serializer(name: &str, factory: SerializerFactory) {
    REGISTRY.write().insert(name.to_string(), factory);
    tracing::info!(serializer = %name, "Custom serializer registered");
}

/// Resolves a serializer instance by registry name.
///
/// # Errors
///
/// Returns [`CacheError::Configuration`] if no codec is registered under
/// `name`.
pub fn get_serializer(name: &str) -> Result<Arc<dyn Serializer>, CacheError> {
    let registry = REGISTRY.read();
    match registry.get(name) {
        Some(factory) => Ok(factory.as_ref()()),
        None => {
            let mut available: Vec<&str> = registry.keys().map(String::as_str).collect();
            available.sort_unstable();
            Err(CacheError::configuration_for(
                "serializer",
                format!(
                    "Unknown serializer '{}'. Available serializers: {}",
                    name,
                    available.join(", ")
                ),
            ))
        }
    }
}

/// Lists all registered serializer names, sorted.
pub fn list_serializers() -> Vec<String> {
    let mut names: Vec<String> = REGISTRY.read().keys().cloned().collect();
    names.sort_unstable();
    names
}

/// True iff a codec is registered under `name`.
pub fn is_registered(name: &str) -> bool {
    REGISTRY.read().contains_key(name)
}
