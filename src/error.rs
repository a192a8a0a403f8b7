//! Cache Error Types
//!
//! Centralized error taxonomy for the whole crate. Construction errors
//! propagate to the caller; operational errors on the read/write path are
//! recovered inside the coordinator and surface only through logs and stats.

/// Boxed underlying cause attached to connection and serialization errors.
pub type ErrorCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Cache error type
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Invalid configuration, detected at construction/validation time.
    #[error("Invalid cache configuration: {message}")]
    Configuration {
        message: String,
        /// The offending configuration key, when known.
        config_key: Option<String>,
    },

    /// Failure to talk to the remote tier: connect refused, auth, timeout,
    /// unexpected protocol error.
    #[error("Cache backend connection failed ({backend}): {source}")]
    Connection {
        /// Backend dialect name ("redis" or "valkey").
        backend: String,
        #[source]
        source: ErrorCause,
    },

    /// A value could not be encoded or decoded.
    #[error("Cache serialization failed (serializer={serializer}, key={key:?}): {source}")]
    Serialization {
        /// The cache key involved, when known.
        key: Option<String>,
        /// Registry name of the serializer that failed.
        serializer: String,
        #[source]
        source: ErrorCause,
    },

    /// A guarded call was attempted while the circuit breaker was open.
    #[error("Circuit breaker is open ({backend}, {failure_count} consecutive failures)")]
    CircuitOpen {
        backend: String,
        failure_count: u32,
    },
}

impl From<config::ConfigError> for CacheError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration {
            message: format!("Failed to load settings: {err}"),
            config_key: None,
        }
    }
}

impl CacheError {
    /// Configuration error without a specific key.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            config_key: None,
        }
    }

    /// Configuration error naming the offending key.
    pub fn configuration_for(config_key: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            config_key: Some(config_key.to_string()),
        }
    }

    /// Connection error wrapping an underlying cause.
    pub fn connection(backend: &str, source: impl Into<ErrorCause>) -> Self {
        Self::Connection {
            backend: backend.to_string(),
            source: source.into(),
        }
    }

    /// Serialization error; the key is attached later by the backend that
    /// knows it (see [`CacheError::with_key`]).
    pub fn serialization(serializer: &str, source: impl Into<ErrorCause>) -> Self {
        Self::Serialization {
            key: None,
            serializer: serializer.to_string(),
            source: source.into(),
        }
    }

    /// Attaches a cache key to a serialization error; other variants pass
    /// through unchanged.
    pub fn with_key(self, key: &str) -> Self {
        match self {
            Self::Serialization {
                serializer, source, ..
            } => Self::Serialization {
                key: Some(key.to_string()),
                serializer,
                source,
            },
            other => other,
        }
    }

    /// True for the error classes produced by the remote tier itself
    /// (connection and decode failures), as opposed to local faults.
    pub fn is_backend_fault(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Serialization { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_key_attaches_key_to_serialization_errors() {
        let err = CacheError::serialization("json", "boom").with_key("user:42");
        match err {
            CacheError::Serialization { key, serializer, .. } => {
                assert_eq!(key.as_deref(), Some("user:42"));
                assert_eq!(serializer, "json");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn with_key_leaves_other_variants_untouched() {
        let err = CacheError::configuration("bad").with_key("k");
        assert!(matches!(err, CacheError::Configuration { .. }));
    }

    #[test]
    fn display_includes_backend_and_count() {
        let err = CacheError::CircuitOpen {
            backend: "redis".into(),
            failure_count: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("redis"));
        assert!(msg.contains('5'));
    }
}
