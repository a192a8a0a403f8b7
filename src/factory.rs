//! Cache Factory
//!
//! Central construction point: merges per-cache overrides into the global
//! defaults, resolves the value codec from the registry, and builds each
//! enabled tier, probing the remote server and disabling the tier for this
//! cache when it cannot come up.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::backend::{CacheBackend, LocalStore, RemoteStore};
use crate::breaker::CircuitBreaker;
use crate::cache::TwoLevelCache;
use crate::config::CacheSettings;
use crate::error::CacheError;
use crate::serializer::{self, Serializer};

/// Per-cache overrides applied on top of the factory defaults.
///
/// Unset fields inherit the factory's [`CacheSettings`].
///
/// # Example
/// ```rust,ignore
/// let cache = factory
///     .create_cache(CacheOptions {
///         key_prefix: Some("users".into()),
///         l2_ttl: Some(3600),
///         l1_enabled: Some(true),
///         ..CacheOptions::default()
///     })
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// L2 namespace prefix for this cache.
    pub key_prefix: Option<String>,
    /// L2 per-entry TTL in seconds.
    pub l2_ttl: Option<u64>,
    /// Enable/disable the remote tier.
    pub l2_enabled: Option<bool>,
    /// Enable/disable the local tier.
    pub l1_enabled: Option<bool>,
    /// L1 capacity bound.
    pub l1_maxsize: Option<usize>,
    /// L1 global TTL in seconds.
    pub l1_ttl: Option<u64>,
    /// Value codec registry name.
    pub serializer: Option<String>,
    /// Enable/disable the circuit breaker.
    pub circuit_breaker_enabled: Option<bool>,
    /// Consecutive failures to open the circuit.
    pub circuit_breaker_threshold: Option<u32>,
    /// Seconds before an open circuit probes again.
    pub circuit_breaker_timeout: Option<u64>,
}

/// Builds [`TwoLevelCache`] instances from validated defaults.
///
/// One factory typically lives for the whole process and hands out caches
/// with different key prefixes and TTLs, all against the same server.
pub struct CacheFactory {
    defaults: CacheSettings,
}

impl CacheFactory {
    /// Creates a factory after validating the global defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] when the defaults are invalid.
    pub fn new(defaults: CacheSettings) -> Result<Self, CacheError> {
        defaults.validate()?;
        info!(
            l2_host = %defaults.l2.host,
            l2_port = defaults.l2.port,
            serializer = %defaults.serializer,
            "Cache factory initialized"
        );
        Ok(Self { defaults })
    }

    /// Creates a factory from files and environment variables
    /// (see [`CacheSettings::load`]).
    pub fn from_env() -> Result<Self, CacheError> {
        Self::new(CacheSettings::load()?)
    }

    /// The validated defaults this factory applies.
    pub fn defaults(&self) -> &CacheSettings {
        &self.defaults
    }

    fn merged(&self, opts: &CacheOptions) -> CacheSettings {
        let mut settings = self.defaults.clone();
        if let Some(prefix) = &opts.key_prefix {
            settings.l2.key_prefix = prefix.clone();
        }
        if let Some(ttl) = opts.l2_ttl {
            settings.l2.ttl = ttl;
        }
        if let Some(enabled) = opts.l2_enabled {
            settings.l2.enabled = enabled;
        }
        if let Some(enabled) = opts.l1_enabled {
            settings.l1.enabled = enabled;
        }
        if let Some(maxsize) = opts.l1_maxsize {
            settings.l1.maxsize = maxsize;
        }
        if let Some(ttl) = opts.l1_ttl {
            settings.l1.ttl = ttl;
        }
        if let Some(name) = &opts.serializer {
            settings.serializer = name.clone();
        }
        if let Some(enabled) = opts.circuit_breaker_enabled {
            settings.circuit_breaker.enabled = enabled;
        }
        if let Some(threshold) = opts.circuit_breaker_threshold {
            settings.circuit_breaker.threshold = threshold;
        }
        if let Some(timeout) = opts.circuit_breaker_timeout {
            settings.circuit_breaker.timeout = timeout;
        }
        settings
    }

    /// Builds a cache with the given overrides.
    ///
    /// Configuration problems (out-of-range values, unknown serializer)
    /// propagate; a tier that fails to come up (for L2, failing the
    /// connection probe) is disabled for this cache instead of failing the
    /// whole build.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] when the merged settings are
    /// invalid.
    pub async fn create_cache(&self, opts: CacheOptions) -> Result<TwoLevelCache, CacheError> {
        let settings = self.merged(&opts);
        settings.validate()?;
        let codec = serializer::get_serializer(&settings.serializer)?;

        let l1: Option<Arc<dyn CacheBackend>> = if settings.l1.enabled {
            Some(Arc::new(LocalStore::new(&settings.l1)))
        } else {
            None
        };

        let l2 = if settings.l2.enabled {
            match Self::probe_remote(&settings, codec).await {
                Ok(store) => Some(store),
                Err(err) => {
                    warn!(
                        key_prefix = %settings.l2.key_prefix,
                        error = %err,
                        "L2 unavailable; tier disabled for this cache"
                    );
                    None
                }
            }
        } else {
            None
        };

        let breaker = CircuitBreaker::new(settings.circuit_breaker.clone());

        info!(
            key_prefix = %settings.l2.key_prefix,
            l1 = l1.is_some(),
            l2 = l2.is_some(),
            serializer = %settings.serializer,
            "Cache created"
        );

        Ok(TwoLevelCache::new(l1, l2, breaker))
    }

    async fn probe_remote(
        settings: &CacheSettings,
        codec: Arc<dyn Serializer>,
    ) -> Result<Arc<dyn CacheBackend>, CacheError> {
        let store = RemoteStore::new(&settings.l2, codec)?;
        store.ping().await?;
        Ok(Arc::new(store))
    }

    /// Factory snapshot for operator visibility: compiled-in backends and
    /// the applied defaults.
    pub fn stats(&self) -> Value {
        json!({
            "dependencies": {
                "local": true,
                "redis": true,
            },
            "defaults": {
                "l1_backend": self.defaults.l1.backend,
                "l2_backend": self.defaults.l2.backend,
                "l2_host": self.defaults.l2.host,
                "l2_port": self.defaults.l2.port,
                "serializer": self.defaults.serializer,
                "circuit_breaker_enabled": self.defaults.circuit_breaker.enabled,
                "circuit_breaker_threshold": self.defaults.circuit_breaker.threshold,
                "circuit_breaker_timeout": self.defaults.circuit_breaker.timeout,
            },
        })
    }
}
