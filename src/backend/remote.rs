//! Remote Tier (L2)
//!
//! Adapter over a Redis/Valkey server: key namespacing, serialization glue,
//! connect-on-demand with a liveness probe, and a stats snapshot.
//!
//! # Connection discipline
//!
//! The client is built eagerly (no I/O); the multiplexed connection is
//! established on first use. Before every command the adapter PINGs the held
//! connection and, on failure, attempts exactly one reconnect in the current
//! call. The command itself is never retried here; retry policy belongs to
//! the coordinator and its circuit breaker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::CacheBackend;
use crate::config::L2Settings;
use crate::error::CacheError;
use crate::serializer::Serializer;

/// SCAN page size for clear/list/size traversals.
const SCAN_COUNT: usize = 100;

/// Redis/Valkey-backed cache tier.
///
/// Every command operates on `{key_prefix}:{key}`; raw keys never reach the
/// wire and namespaced keys never leave this adapter.
pub struct RemoteStore {
    settings: L2Settings,
    backend: String,
    serializer: Arc<dyn Serializer>,
    client: Client,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RemoteStore {
    /// Create an adapter from validated L2 settings.
    ///
    /// No network I/O happens here; use [`RemoteStore::ping`] to probe the
    /// server.
    pub fn new(settings: &L2Settings, serializer: Arc<dyn Serializer>) -> Result<Self, CacheError> {
        let backend = settings.backend_name();
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(settings.host.clone(), settings.port),
            redis: RedisConnectionInfo {
                db: i64::from(settings.db),
                password: settings.password.clone(),
                ..Default::default()
            },
        };
        let client =
            Client::open(info).map_err(|e| CacheError::connection(&backend, e))?;

        debug!(
            host = %settings.host,
            port = settings.port,
            db = settings.db,
            key_prefix = %settings.key_prefix,
            "Remote store configured"
        );

        Ok(Self {
            settings: settings.clone(),
            backend,
            serializer,
            client,
            conn: Mutex::new(None),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.settings.key_prefix, key)
    }

    fn conn_err(&self, err: redis::RedisError) -> CacheError {
        CacheError::connection(&self.backend, err)
    }

    /// Returns a live connection, establishing or re-establishing it if
    /// needed.
    ///
    /// A held connection is PINGed first; on failure it is dropped and one
    /// reconnect is attempted. Persistent failure surfaces as
    /// [`CacheError::Connection`].
    async fn command_connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut slot = self.conn.lock().await;

        if let Some(conn) = slot.as_mut() {
            let pong: Result<String, redis::RedisError> =
                redis::cmd("PING").query_async(conn).await;
            match pong {
                Ok(_) => return Ok(conn.clone()),
                Err(err) => {
                    warn!(backend = %self.backend, error = %err, "L2 liveness check failed, reconnecting");
                    *slot = None;
                }
            }
        }

        let conn = self
            .client
            .get_multiplexed_async_connection_with_timeouts(
                Duration::from_secs(self.settings.socket_timeout),
                Duration::from_secs(self.settings.connect_timeout),
            )
            .await
            .map_err(|e| self.conn_err(e))?;

        info!(
            backend = %self.backend,
            host = %self.settings.host,
            port = self.settings.port,
            "L2 connection established"
        );
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Collects every namespaced key matching `pattern` via SCAN.
    async fn scan_keys(
        &self,
        conn: &mut MultiplexedConnection,
        pattern: &str,
    ) -> Result<Vec<String>, CacheError> {
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(conn)
                .await
                .map_err(|e| self.conn_err(e))?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }

    /// Probes the server, reconnecting if the held connection has died.
    pub async fn ping(&self) -> Result<(), CacheError> {
        // The liveness probe inside command_connection is the PING.
        self.command_connection().await.map(|_| ())
    }

    /// Server-side `INFO stats` snapshot, for operators.
    pub async fn info(&self) -> Result<Value, CacheError> {
        let mut conn = self.command_connection().await?;
        let info: redis::InfoDict = redis::cmd("INFO")
            .arg("stats")
            .query_async(&mut conn)
            .await
            .map_err(|e| self.conn_err(e))?;
        Ok(json!({
            "total_connections_received": info.get::<i64>("total_connections_received"),
            "total_commands_processed": info.get::<i64>("total_commands_processed"),
            "keyspace_hits": info.get::<i64>("keyspace_hits"),
            "keyspace_misses": info.get::<i64>("keyspace_misses"),
        }))
    }

    async fn stats_snapshot(&self) -> Result<Value, CacheError> {
        let size = self.size().await?;
        let server = self.info().await?;
        Ok(json!({
            "backend": self.backend,
            "enabled": true,
            "host": self.settings.host,
            "port": self.settings.port,
            "db": self.settings.db,
            "key_prefix": self.settings.key_prefix,
            "ttl": self.settings.ttl,
            "serializer": self.serializer.name(),
            "size": size,
            "server_stats": server,
        }))
    }
}

#[async_trait]
impl CacheBackend for RemoteStore {
    fn name(&self) -> &str {
        &self.backend
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let full_key = self.namespaced(key);
        let mut conn = self.command_connection().await?;

        let data: Option<Vec<u8>> = conn.get(&full_key).await.map_err(|e| self.conn_err(e))?;
        match data {
            Some(bytes) => {
                let value = self
                    .serializer
                    .deserialize(&bytes)
                    .map_err(|e| e.with_key(key))?;
                debug!(key = %full_key, "L2 cache hit");
                Ok(Some(value))
            }
            None => {
                debug!(key = %full_key, "L2 cache miss");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set(&self, key: &str, value: &Value, ttl: Option<u64>) -> Result<(), CacheError> {
        let data = self
            .serializer
            .serialize(value)
            .map_err(|e| e.with_key(key))?;
        let full_key = self.namespaced(key);
        let ttl_seconds = ttl.unwrap_or(self.settings.ttl);
        let mut conn = self.command_connection().await?;

        conn.set_ex::<_, _, ()>(&full_key, data, ttl_seconds)
            .await
            .map_err(|e| self.conn_err(e))?;
        debug!(key = %full_key, ttl = ttl_seconds, "L2 cache set");
        Ok(())
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set_if_absent(
        &self,
        key: &str,
        value: &Value,
        ttl: Option<u64>,
    ) -> Result<bool, CacheError> {
        let data = self
            .serializer
            .serialize(value)
            .map_err(|e| e.with_key(key))?;
        let full_key = self.namespaced(key);
        let ttl_seconds = ttl.unwrap_or(self.settings.ttl);
        let mut conn = self.command_connection().await?;

        // SET with NX and EX for an atomic set-if-absent with expiry; the
        // reply is the authoritative answer.
        let reply: Option<String> = redis::cmd("SET")
            .arg(&full_key)
            .arg(data)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.conn_err(e))?;

        let was_set = reply.is_some();
        debug!(key = %full_key, ttl = ttl_seconds, was_set, "L2 cache set (absent)");
        Ok(was_set)
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let full_key = self.namespaced(key);
        let mut conn = self.command_connection().await?;

        let deleted: u64 = conn.del(&full_key).await.map_err(|e| self.conn_err(e))?;
        debug!(key = %full_key, deleted = deleted > 0, "L2 cache delete");
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn clear(&self) -> Result<u64, CacheError> {
        let pattern = format!("{}:*", self.settings.key_prefix);
        let mut conn = self.command_connection().await?;

        // SCAN in batches and DEL per batch; a single blocking KEYS sweep is
        // off-limits on a shared server.
        let mut deleted: u64 = 0;
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(|e| self.conn_err(e))?;
            if !batch.is_empty() {
                let removed: u64 = conn
                    .del(batch.as_slice())
                    .await
                    .map_err(|e| self.conn_err(e))?;
                deleted += removed;
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        info!(removed = deleted, "L2 cache cleared");
        Ok(deleted)
    }

    #[instrument(skip(self), level = "debug")]
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let full_key = self.namespaced(key);
        let mut conn = self.command_connection().await?;
        let exists: bool = conn.exists(&full_key).await.map_err(|e| self.conn_err(e))?;
        Ok(exists)
    }

    #[instrument(skip(self), level = "debug")]
    async fn ttl(&self, key: &str) -> Result<Option<u64>, CacheError> {
        let full_key = self.namespaced(key);
        let mut conn = self.command_connection().await?;

        let ttl: i64 = conn.ttl(&full_key).await.map_err(|e| self.conn_err(e))?;
        // -2: key does not exist; -1: key exists without expiry.
        if ttl < 0 {
            Ok(None)
        } else {
            Ok(Some(ttl as u64))
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_keys<'a>(&'a self, prefix: Option<&'a str>) -> Result<Vec<String>, CacheError> {
        let pattern = match prefix {
            Some(sub) => format!("{}:{}*", self.settings.key_prefix, sub),
            None => format!("{}:*", self.settings.key_prefix),
        };
        let mut conn = self.command_connection().await?;

        let outer = format!("{}:", self.settings.key_prefix);
        let keys = self
            .scan_keys(&mut conn, &pattern)
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&outer).map(str::to_string))
            .collect();
        Ok(keys)
    }

    #[instrument(skip(self), level = "debug")]
    async fn size(&self) -> Result<u64, CacheError> {
        let pattern = format!("{}:*", self.settings.key_prefix);
        let mut conn = self.command_connection().await?;
        let keys = self.scan_keys(&mut conn, &pattern).await?;
        Ok(keys.len() as u64)
    }

    async fn stats(&self) -> Value {
        match self.stats_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(backend = %self.backend, error = %err, "L2 stats unavailable");
                json!({
                    "backend": self.backend,
                    "enabled": false,
                    "error": err.to_string(),
                })
            }
        }
    }

    async fn close(&self) {
        let mut slot = self.conn.lock().await;
        if slot.take().is_some() {
            info!(backend = %self.backend, "L2 connection closed");
        }
    }
}
