//! Configuration Management
//!
//! Typed settings for both cache tiers, the circuit breaker, and the value
//! codec, with defaults-first loading from files and environment variables
//! plus explicit validation.

mod settings;
mod validate;

pub use settings::{
    CacheSettings, CircuitBreakerSettings, L1Settings, L2Settings, DEFAULT_KEY_PREFIX,
};
pub use validate::{is_valid_fqdn, is_valid_ip, is_valid_port};
