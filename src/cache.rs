//! Two-Level Cache Coordinator
//!
//! Orders every operation across the local (L1) and remote (L2) tiers:
//!
//! - Read-through with promotion: L2 hits are copied into L1.
//! - Write-through: `set` fans out to both tiers before returning.
//! - Graceful degradation: a failing or unreachable L2 never surfaces to the
//!   caller; the circuit breaker short-circuits it after repeated failures
//!   and the cache keeps serving from L1.
//!
//! ```text
//! +--------------------+
//! |   TwoLevelCache    |
//! +--------------------+
//!    |             |
//!    v             v  (gated by the circuit breaker)
//! +-------+     +--------+
//! |  L1   |     |   L2   |
//! | local |     | remote |
//! +-------+     +--------+
//! ```
//!
//! A healthy coordinator never returns an error from its read/write surface;
//! degradation is visible only through logs and [`TwoLevelCache::stats`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::backend::CacheBackend;
use crate::breaker::CircuitBreaker;
use crate::error::CacheError;

/// Outcome of [`TwoLevelCache::clear`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClearResult {
    /// Entries removed from the local tier (0 when disabled or failed).
    pub l1_items_removed: u64,
    /// Entries removed from the remote tier (0 when disabled, gated, or
    /// failed).
    pub l2_items_removed: u64,
    /// Wall-clock seconds at the start of the call.
    pub timestamp: f64,
}

/// Resilient two-level cache.
///
/// Either tier may be absent; a tier that failed to construct is simply not
/// consulted. All operations are safe to call from any number of concurrent
/// tasks; per-key writes are last-writer-wins on each tier independently.
pub struct TwoLevelCache {
    l1: Option<Arc<dyn CacheBackend>>,
    l2: Option<Arc<dyn CacheBackend>>,
    breaker: CircuitBreaker,
}

impl std::fmt::Debug for TwoLevelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoLevelCache")
            .field("l1", &self.l1.as_ref().map(|b| b.name()))
            .field("l2", &self.l2.as_ref().map(|b| b.name()))
            .field("breaker", &self.breaker)
            .finish()
    }
}

impl TwoLevelCache {
    /// Assembles a coordinator from already-constructed tiers.
    ///
    /// Most callers go through [`crate::factory::CacheFactory`], which also
    /// probes the remote tier and disables it on failure.
    pub fn new(
        l1: Option<Arc<dyn CacheBackend>>,
        l2: Option<Arc<dyn CacheBackend>>,
        breaker: CircuitBreaker,
    ) -> Self {
        info!(
            l1 = if l1.is_some() { "enabled" } else { "disabled" },
            l2 = if l2.is_some() { "enabled" } else { "disabled" },
            "Cache initialized"
        );
        Self { l1, l2, breaker }
    }

    /// The breaker guarding the remote tier.
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// True iff the local tier is present.
    pub fn l1_enabled(&self) -> bool {
        self.l1.is_some()
    }

    /// True iff the remote tier is present.
    pub fn l2_enabled(&self) -> bool {
        self.l2.is_some()
    }

    /// Looks up `key`: L1 first, then L2 when the breaker allows it.
    ///
    /// An L2 hit is promoted into L1 best-effort. Returns `None` on a miss
    /// in both tiers; tier errors degrade to a miss.
    pub async fn get(&self, key: &str) -> Option<Value> {
        if let Some(l1) = &self.l1 {
            match l1.get(key).await {
                Ok(Some(value)) => {
                    debug!(key, "L1 hit");
                    return Some(value);
                }
                Ok(None) => {}
                Err(err) => warn!(key, error = %err, "L1 get error"),
            }
        }

        if let Some(l2) = &self.l2 {
            if !self.breaker.is_open() {
                match l2.get(key).await {
                    Ok(Some(value)) => {
                        debug!(key, "L2 hit");
                        if let Some(l1) = &self.l1 {
                            match l1.set(key, &value, None).await {
                                Ok(()) => debug!(key, "Promoted to L1"),
                                Err(err) => {
                                    warn!(key, error = %err, "Failed to promote to L1")
                                }
                            }
                        }
                        self.breaker.record_success();
                        return Some(value);
                    }
                    Ok(None) => {
                        // A clean miss still proves L2 is healthy.
                        self.breaker.record_success();
                    }
                    Err(err) if err.is_backend_fault() => {
                        warn!(key, error = %err, "L2 get error");
                        self.breaker.record_failure();
                    }
                    Err(err) => {
                        error!(key, error = %err, "Unexpected L2 get error");
                        self.breaker.record_failure();
                    }
                }
            }
        }

        debug!(key, "Cache miss");
        None
    }

    /// Write-through: stores into L1, then into L2 when the breaker allows.
    ///
    /// A failed L2 write leaves L1 holding the newer value; other processes
    /// will not see it until L2 recovers. That is the accepted degraded mode.
    pub async fn set(&self, key: &str, value: Value) {
        if let Some(l1) = &self.l1 {
            match l1.set(key, &value, None).await {
                Ok(()) => debug!(key, "Stored in L1"),
                Err(err) => warn!(key, error = %err, "L1 set error"),
            }
        }

        if let Some(l2) = &self.l2 {
            if !self.breaker.is_open() {
                match l2.set(key, &value, None).await {
                    Ok(()) => {
                        debug!(key, "Stored in L2");
                        self.breaker.record_success();
                    }
                    Err(err @ CacheError::Serialization { .. }) => {
                        // The fault is local to the value, not L2 health;
                        // the breaker is not charged.
                        warn!(key, error = %err, "L2 set skipped: value failed to serialize");
                    }
                    Err(err @ CacheError::Connection { .. }) => {
                        warn!(key, error = %err, "L2 set error");
                        self.breaker.record_failure();
                    }
                    Err(err) => {
                        error!(key, error = %err, "Unexpected L2 set error");
                        self.breaker.record_failure();
                    }
                }
            }
        }
    }

    /// Conditional store, L2-authoritative.
    ///
    /// L2 decides whether the key exists across processes; on L2 acceptance
    /// the value is mirrored into L1 best-effort. Only when L2 is absent,
    /// gated, or failing does L1 decide alone. Returns whether a value was
    /// newly placed in the tier that decided.
    pub async fn set_if_absent(&self, key: &str, value: Value) -> bool {
        if let Some(l2) = &self.l2 {
            if !self.breaker.is_open() {
                match self.l2_set_if_absent(l2.as_ref(), key, &value).await {
                    Ok(stored) => {
                        self.breaker.record_success();
                        if stored {
                            if let Some(l1) = &self.l1 {
                                if let Err(err) = l1.set_if_absent(key, &value, None).await {
                                    warn!(key, error = %err, "L1 set_if_absent error");
                                }
                            }
                        }
                        return stored;
                    }
                    Err(err @ CacheError::Serialization { .. }) => {
                        warn!(key, error = %err, "L2 set_if_absent skipped: value failed to serialize");
                    }
                    Err(err @ CacheError::Connection { .. }) => {
                        warn!(key, error = %err, "L2 set_if_absent error");
                        self.breaker.record_failure();
                    }
                    Err(err) => {
                        error!(key, error = %err, "Unexpected L2 set_if_absent error");
                        self.breaker.record_failure();
                    }
                }
            }
        }

        if let Some(l1) = &self.l1 {
            match l1.set_if_absent(key, &value, None).await {
                Ok(stored) => {
                    debug!(key, stored, "Stored in L1 if absent");
                    return stored;
                }
                Err(err) => warn!(key, error = %err, "L1 set_if_absent error"),
            }
        }

        false
    }

    async fn l2_set_if_absent(
        &self,
        l2: &dyn CacheBackend,
        key: &str,
        value: &Value,
    ) -> Result<bool, CacheError> {
        if l2.exists(key).await? {
            debug!(key, "L2 set_if_absent skipped: key already exists");
            return Ok(false);
        }
        l2.set_if_absent(key, value, None).await
    }

    /// Removes `key` from L2 first (the cross-process source of truth), then
    /// from L1.
    ///
    /// With L2 gone first, a concurrent read on another process cannot
    /// re-learn the value and outlive our local invalidation.
    pub async fn delete(&self, key: &str) {
        if let Some(l2) = &self.l2 {
            if !self.breaker.is_open() {
                match l2.delete(key).await {
                    Ok(()) => {
                        debug!(key, "Deleted from L2");
                        self.breaker.record_success();
                    }
                    Err(err) if err.is_backend_fault() => {
                        warn!(key, error = %err, "L2 delete error");
                        self.breaker.record_failure();
                    }
                    Err(err) => {
                        error!(key, error = %err, "Unexpected L2 delete error");
                        self.breaker.record_failure();
                    }
                }
            }
        }

        if let Some(l1) = &self.l1 {
            match l1.delete(key).await {
                Ok(()) => debug!(key, "Deleted from L1"),
                Err(err) => warn!(key, error = %err, "L1 delete error"),
            }
        }
    }

    /// Empties both tiers and reports how many entries each dropped.
    ///
    /// Per-tier failures are logged and reported as 0 removed.
    pub async fn clear(&self) -> ClearResult {
        let mut result = ClearResult {
            l1_items_removed: 0,
            l2_items_removed: 0,
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        };

        if let Some(l1) = &self.l1 {
            match l1.clear().await {
                Ok(removed) => {
                    info!(removed, "L1 cleared");
                    result.l1_items_removed = removed;
                }
                Err(err) => warn!(error = %err, "L1 clear error"),
            }
        }

        if let Some(l2) = &self.l2 {
            if !self.breaker.is_open() {
                match l2.clear().await {
                    Ok(removed) => {
                        info!(removed, "L2 cleared");
                        result.l2_items_removed = removed;
                        self.breaker.record_success();
                    }
                    Err(err) if err.is_backend_fault() => {
                        warn!(error = %err, "L2 clear error");
                        self.breaker.record_failure();
                    }
                    Err(err) => {
                        error!(error = %err, "Unexpected L2 clear error");
                        self.breaker.record_failure();
                    }
                }
            }
        }

        result
    }

    /// Merged statistics from both tiers and the breaker. Never fails; a
    /// tier that cannot report embeds an `error` field instead.
    pub async fn stats(&self) -> Value {
        let l1 = match &self.l1 {
            Some(backend) => backend.stats().await,
            None => json!({ "enabled": false }),
        };
        let l2 = match &self.l2 {
            Some(backend) => backend.stats().await,
            None => json!({ "enabled": false }),
        };
        json!({
            "enabled": true,
            "l1": l1,
            "l2": l2,
            "circuit_breaker": self.breaker.stats(),
        })
    }

    /// Remaining time-to-live for `key`: L1 first, then L2 when the breaker
    /// allows. `None` when the key is absent everywhere or tiers errored.
    pub async fn ttl(&self, key: &str) -> Option<u64> {
        if let Some(l1) = &self.l1 {
            match l1.ttl(key).await {
                Ok(Some(ttl)) => return Some(ttl),
                Ok(None) => {}
                Err(err) => warn!(key, error = %err, "L1 ttl error"),
            }
        }

        if let Some(l2) = &self.l2 {
            if !self.breaker.is_open() {
                match l2.ttl(key).await {
                    Ok(ttl) => {
                        self.breaker.record_success();
                        return ttl;
                    }
                    Err(err) if err.is_backend_fault() => {
                        warn!(key, error = %err, "L2 ttl error");
                        self.breaker.record_failure();
                    }
                    Err(err) => {
                        error!(key, error = %err, "Unexpected L2 ttl error");
                        self.breaker.record_failure();
                    }
                }
            }
        }

        None
    }

    /// Deduplicated union of live keys from both tiers, optionally filtered
    /// by prefix, in sorted order. Tier errors collapse to an empty
    /// contribution.
    pub async fn list_keys(&self, prefix: Option<&str>) -> Vec<String> {
        let mut keys = BTreeSet::new();

        if let Some(l1) = &self.l1 {
            match l1.list_keys(prefix).await {
                Ok(found) => keys.extend(found),
                Err(err) => warn!(error = %err, "L1 list_keys error"),
            }
        }

        if let Some(l2) = &self.l2 {
            if !self.breaker.is_open() {
                match l2.list_keys(prefix).await {
                    Ok(found) => {
                        keys.extend(found);
                        self.breaker.record_success();
                    }
                    Err(err) if err.is_backend_fault() => {
                        warn!(error = %err, "L2 list_keys error");
                        self.breaker.record_failure();
                    }
                    Err(err) => {
                        error!(error = %err, "Unexpected L2 list_keys error");
                        self.breaker.record_failure();
                    }
                }
            }
        }

        keys.into_iter().collect()
    }

    /// True iff a live entry exists in either tier. Errors degrade to false.
    pub async fn exists(&self, key: &str) -> bool {
        if let Some(l1) = &self.l1 {
            match l1.exists(key).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => warn!(key, error = %err, "L1 exists error"),
            }
        }

        if let Some(l2) = &self.l2 {
            if !self.breaker.is_open() {
                match l2.exists(key).await {
                    Ok(found) => {
                        self.breaker.record_success();
                        return found;
                    }
                    Err(err) if err.is_backend_fault() => {
                        warn!(key, error = %err, "L2 exists error");
                        self.breaker.record_failure();
                    }
                    Err(err) => {
                        error!(key, error = %err, "Unexpected L2 exists error");
                        self.breaker.record_failure();
                    }
                }
            }
        }

        false
    }

    /// Releases tier resources (the L2 network connection).
    pub async fn close(&self) {
        if let Some(l2) = &self.l2 {
            l2.close().await;
        }
        if let Some(l1) = &self.l1 {
            l1.close().await;
        }
    }
}
