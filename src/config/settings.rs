//! Cache settings structures, loader, and validation.

use config::{Config, Environment, File};
use serde::Deserialize;

use super::validate::{is_valid_fqdn, is_valid_ip, is_valid_port};
use crate::error::CacheError;
use crate::serializer;

/// Default namespace prefix applied to every L2 key.
pub const DEFAULT_KEY_PREFIX: &str = "cache";

/// Root configuration for one cache instance.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Local tier (L1) configuration
    pub l1: L1Settings,

    /// Remote tier (L2) configuration
    pub l2: L2Settings,

    /// Circuit breaker configuration
    pub circuit_breaker: CircuitBreakerSettings,

    /// Registry name of the value codec ("binary", "json", or a custom name)
    pub serializer: String,
}

/// Local tier (L1) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct L1Settings {
    /// Enable the in-process tier
    pub enabled: bool,

    /// Maximum number of live entries
    pub maxsize: usize,

    /// Global time-to-live in seconds, fixed for every entry
    pub ttl: u64,

    /// L1 variant; only "ttl" is supported
    pub backend: String,
}

/// Remote tier (L2) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct L2Settings {
    /// Enable the remote tier
    pub enabled: bool,

    /// Namespace prefix prepended (with a `:`) to every key
    pub key_prefix: String,

    /// Per-entry time-to-live in seconds
    pub ttl: u64,

    /// Wire dialect: "redis" or "valkey"
    pub backend: String,

    /// Server host (IP address or hostname)
    pub host: String,

    /// Server port
    pub port: u16,

    /// Logical database number
    pub db: u32,

    /// Optional authentication password
    pub password: Option<String>,

    /// TCP connect timeout in seconds
    pub connect_timeout: u64,

    /// Per-command socket timeout in seconds
    pub socket_timeout: u64,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerSettings {
    /// Enable the breaker; disabled means permanently closed
    pub enabled: bool,

    /// Consecutive failures required to open the circuit
    pub threshold: u32,

    /// Seconds the circuit stays open before probing again
    pub timeout: u64,
}

impl Default for L1Settings {
    fn default() -> Self {
        Self {
            enabled: false,
            maxsize: 1000,
            ttl: 60,
            backend: "ttl".into(),
        }
    }
}

impl Default for L2Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            key_prefix: DEFAULT_KEY_PREFIX.into(),
            ttl: 3600,
            backend: "redis".into(),
            host: "localhost".into(),
            port: 6379,
            db: 0,
            password: None,
            connect_timeout: 5,
            socket_timeout: 5,
        }
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 5,
            timeout: 60,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            l1: L1Settings::default(),
            l2: L2Settings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            serializer: "binary".into(),
        }
    }
}

impl L1Settings {
    /// Validate the L1 section; ranges are only enforced when the tier is
    /// enabled.
    pub fn validate(&self) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }
        if self.maxsize < 1 {
            return Err(CacheError::configuration_for(
                "l1_maxsize",
                "L1 maxsize must be >= 1",
            ));
        }
        if self.ttl < 1 {
            return Err(CacheError::configuration_for("l1_ttl", "L1 TTL must be >= 1"));
        }
        if self.backend != "ttl" {
            return Err(CacheError::configuration_for(
                "l1_backend",
                format!("L1 backend must be 'ttl', got '{}'", self.backend),
            ));
        }
        Ok(())
    }
}

impl L2Settings {
    /// Validate the L2 section; ranges are only enforced when the tier is
    /// enabled.
    pub fn validate(&self) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }
        if self.key_prefix.trim().is_empty() {
            return Err(CacheError::configuration_for(
                "l2_key_prefix",
                "L2 key_prefix cannot be empty",
            ));
        }
        if self.ttl < 1 {
            return Err(CacheError::configuration_for("l2_ttl", "L2 TTL must be >= 1"));
        }
        let backend = self.backend.trim().to_ascii_lowercase();
        if backend != "redis" && backend != "valkey" {
            return Err(CacheError::configuration_for(
                "l2_backend",
                format!("L2 backend must be 'redis' or 'valkey', got '{}'", self.backend),
            ));
        }
        let host = self.host.trim();
        if host.is_empty() || !(is_valid_ip(host) || is_valid_fqdn(host)) {
            return Err(CacheError::configuration_for(
                "l2_host",
                format!("L2 host must be a valid IP address or hostname, got '{}'", self.host),
            ));
        }
        if !is_valid_port(self.port) {
            return Err(CacheError::configuration_for(
                "l2_port",
                "L2 port must be between 1 and 65535",
            ));
        }
        if self.connect_timeout < 1 {
            return Err(CacheError::configuration_for(
                "l2_connect_timeout",
                "L2 connect_timeout must be >= 1",
            ));
        }
        if self.socket_timeout < 1 {
            return Err(CacheError::configuration_for(
                "l2_socket_timeout",
                "L2 socket_timeout must be >= 1",
            ));
        }
        Ok(())
    }

    /// The wire dialect name, normalized.
    pub fn backend_name(&self) -> String {
        self.backend.trim().to_ascii_lowercase()
    }
}

impl CircuitBreakerSettings {
    /// Validate the breaker section.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.threshold < 1 {
            return Err(CacheError::configuration_for(
                "circuit_breaker_threshold",
                "Circuit breaker threshold must be >= 1",
            ));
        }
        if self.timeout < 1 {
            return Err(CacheError::configuration_for(
                "circuit_breaker_timeout",
                "Circuit breaker timeout must be >= 1",
            ));
        }
        Ok(())
    }
}

impl CacheSettings {
    /// Load settings from configuration files and environment variables.
    ///
    /// The loading order is:
    /// 1. Built-in defaults (the values documented on each field)
    /// 2. config/default.toml (optional)
    /// 3. Environment variables (highest priority)
    ///    `CACHE__L2__HOST=redis.internal` -> `l2.host`
    ///
    /// The result is validated before being returned.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Configuration` if loading, parsing, or
    /// validation fails.
    pub fn load() -> Result<Self, CacheError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let settings: Self = Config::builder()
            // Start with default values
            .set_default("l1.enabled", false)?
            .set_default("l1.maxsize", 1000)?
            .set_default("l1.ttl", 60)?
            .set_default("l1.backend", "ttl")?
            .set_default("l2.enabled", true)?
            .set_default("l2.key_prefix", DEFAULT_KEY_PREFIX)?
            .set_default("l2.ttl", 3600)?
            .set_default("l2.backend", "redis")?
            .set_default("l2.host", "localhost")?
            .set_default("l2.port", 6379)?
            .set_default("l2.db", 0)?
            .set_default("l2.connect_timeout", 5)?
            .set_default("l2.socket_timeout", 5)?
            .set_default("circuit_breaker.enabled", true)?
            .set_default("circuit_breaker.threshold", 5)?
            .set_default("circuit_breaker.timeout", 60)?
            .set_default("serializer", "binary")?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            // Load from environment variables
            // CACHE__L2__HOST=redis.internal -> l2.host
            .add_source(
                Environment::default()
                    .prefix("CACHE")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map the flat legacy environment variables
            .set_override_option("l2.host", std::env::var("CACHE_REDIS_HOST").ok())?
            .set_override_option("l2.port", std::env::var("CACHE_REDIS_PORT").ok())?
            .set_override_option("l2.password", std::env::var("CACHE_REDIS_PASSWORD").ok())?
            .set_override_option("serializer", std::env::var("CACHE_SERIALIZER").ok())?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate every section plus the serializer name.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Configuration` naming the offending key.
    pub fn validate(&self) -> Result<(), CacheError> {
        self.l1.validate()?;
        self.l2.validate()?;
        self.circuit_breaker.validate()?;

        if !serializer::is_registered(&self.serializer) {
            return Err(CacheError::configuration_for(
                "serializer",
                format!(
                    "Serializer must be one of [{}], got '{}'",
                    serializer::list_serializers().join(", "),
                    self.serializer
                ),
            ));
        }
        Ok(())
    }
}
