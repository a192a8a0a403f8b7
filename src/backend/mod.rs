//! Cache Backends
//!
//! The tier abstraction shared by the local (L1) and remote (L2) stores.
//!
//! Both tiers expose the same operation set through [`CacheBackend`], which
//! keeps the coordinator ignorant of what sits behind each tier and lets
//! tests substitute scripted backends.

mod local;
mod remote;

pub use local::LocalStore;
pub use remote::RemoteStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CacheError;

/// Operation set implemented by every cache tier.
///
/// Absence is always `Option::None`; a stored `Value::Null` is a present
/// value and must round-trip as such. Implementations are shared behind an
/// `Arc` and must be safe to call from any number of concurrent tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short backend identifier used in logs and error context.
    fn name(&self) -> &str;

    /// Looks up `key`, returning the stored value or `None`.
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Stores `value` under `key`.
    ///
    /// `ttl` overrides the tier's configured time-to-live where the tier
    /// supports per-entry TTLs; tiers with a global TTL ignore it.
    async fn set(&self, key: &str, value: &Value, ttl: Option<u64>) -> Result<(), CacheError>;

    /// Stores `value` under `key` only if no live entry exists.
    ///
    /// Returns whether the value was newly placed.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &Value,
        ttl: Option<u64>,
    ) -> Result<bool, CacheError>;

    /// Removes `key` if present (idempotent).
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Removes every entry owned by this tier, returning the count removed.
    async fn clear(&self) -> Result<u64, CacheError>;

    /// True iff a live entry exists for `key`.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Remaining time-to-live in seconds, or `None` when the key is absent
    /// or carries no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<u64>, CacheError>;

    /// Snapshot of live keys, optionally filtered by prefix.
    async fn list_keys<'a>(&'a self, prefix: Option<&'a str>) -> Result<Vec<String>, CacheError>;

    /// Number of live entries.
    async fn size(&self) -> Result<u64, CacheError>;

    /// Backend statistics snapshot. Never fails; backends embed an `error`
    /// field instead.
    async fn stats(&self) -> Value;

    /// Releases any held resources; a no-op for tiers without connections.
    async fn close(&self);
}
