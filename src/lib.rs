//! # Resilient Cache
//!
//! A resilient two-level cache fronting a Redis/Valkey server with a
//! bounded, process-local TTL tier:
//!
//! - Read-through with promotion and write-through across both tiers
//! - A circuit breaker that hides remote-store failures from callers
//! - Pluggable value codecs (self-describing binary, textual JSON)
//! - Graceful degradation: a dead remote tier costs sharing, never errors
//!
//! ## Module Structure
//!
//! ```text
//! resilient_cache/
//! +-- config/      Settings, loader, and validation
//! +-- serializer/  Value codecs and the codec registry
//! +-- backend/     The tier trait, local (L1) and remote (L2) stores
//! +-- breaker      Circuit breaker guarding L2
//! +-- cache        The two-level coordinator
//! +-- factory      Construction and dependency probing
//! +-- error        Error taxonomy
//! +-- telemetry    Tracing setup
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use resilient_cache::{CacheFactory, CacheOptions, CacheSettings};
//! use serde_json::json;
//!
//! let factory = CacheFactory::new(CacheSettings::default())?;
//! let cache = factory
//!     .create_cache(CacheOptions {
//!         key_prefix: Some("users".into()),
//!         l1_enabled: Some(true),
//!         ..CacheOptions::default()
//!     })
//!     .await?;
//!
//! cache.set("42", json!({"name": "Ada"})).await;
//! assert_eq!(cache.get("42").await, Some(json!({"name": "Ada"})));
//! ```

// Configuration management
pub mod config;

// Error taxonomy
pub mod error;

// Value codecs and registry
pub mod serializer;

// Cache tiers
pub mod backend;

// Circuit breaker guarding the remote tier
pub mod breaker;

// The two-level coordinator
pub mod cache;

// Construction and probing
pub mod factory;

// Telemetry and observability
pub mod telemetry;

pub use backend::{CacheBackend, LocalStore, RemoteStore};
pub use breaker::{BreakerState, BreakerStats, CircuitBreaker};
pub use cache::{ClearResult, TwoLevelCache};
pub use config::{CacheSettings, CircuitBreakerSettings, L1Settings, L2Settings};
pub use error::CacheError;
pub use factory::{CacheFactory, CacheOptions};
pub use serializer::{
    get_serializer, list_serializers, register_serializer, BinarySerializer, JsonSerializer,
    Serializer, SerializerFactory,
};
