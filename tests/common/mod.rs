//! Common Test Utilities
//!
//! Shared helpers for the real-server integration tests.

use std::sync::atomic::{AtomicU64, Ordering};

use resilient_cache::{CacheSettings, L2Settings};

static PREFIX_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Host of the test server, `RESILIENT_CACHE_TEST_REDIS_HOST` or localhost.
pub fn test_host() -> String {
    std::env::var("RESILIENT_CACHE_TEST_REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".into())
}

/// Port of the test server, `RESILIENT_CACHE_TEST_REDIS_PORT` or 6379.
pub fn test_port() -> u16 {
    std::env::var("RESILIENT_CACHE_TEST_REDIS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(6379)
}

/// A key prefix no other test run shares, so suites can run concurrently
/// against one server.
pub fn unique_prefix(label: &str) -> String {
    format!(
        "rc-test:{}:{}:{}",
        label,
        std::process::id(),
        PREFIX_COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// L2 settings pointing at the test server.
pub fn l2_settings(prefix: &str) -> L2Settings {
    L2Settings {
        key_prefix: prefix.into(),
        host: test_host(),
        port: test_port(),
        connect_timeout: 2,
        socket_timeout: 2,
        ..L2Settings::default()
    }
}

/// Full settings pointing at the test server.
pub fn settings(prefix: &str) -> CacheSettings {
    CacheSettings {
        l2: l2_settings(prefix),
        ..CacheSettings::default()
    }
}

/// Raw client for observing the wire state behind the adapter's back.
pub async fn raw_connection() -> redis::aio::MultiplexedConnection {
    let client = redis::Client::open(format!("redis://{}:{}/", test_host(), test_port()))
        .expect("client for test server");
    client
        .get_multiplexed_async_connection()
        .await
        .expect("test server reachable")
}
