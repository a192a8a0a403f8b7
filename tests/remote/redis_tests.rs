//! Remote tier tests against a real Redis/Valkey server.
//!
//! All tests are ignored by default; run them with a server listening on
//! `RESILIENT_CACHE_TEST_REDIS_HOST:RESILIENT_CACHE_TEST_REDIS_PORT`
//! (default 127.0.0.1:6379):
//!
//! ```text
//! cargo test -- --ignored
//! ```

use std::time::Duration;

use redis::AsyncCommands;
use serde_json::json;

use resilient_cache::{get_serializer, CacheBackend, CacheFactory, CacheOptions, RemoteStore};

use crate::common;

fn remote(prefix: &str, serializer: &str) -> RemoteStore {
    RemoteStore::new(
        &common::l2_settings(prefix),
        get_serializer(serializer).expect("registered serializer"),
    )
    .expect("remote store")
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn set_get_delete_round_trip() {
    let prefix = common::unique_prefix("roundtrip");
    let store = remote(&prefix, "binary");

    let value = json!({"id": 7, "name": "Ada", "tags": ["x", "y"]});
    store.set("user", &value, None).await.unwrap();
    assert_eq!(store.get("user").await.unwrap(), Some(value));
    assert!(store.exists("user").await.unwrap());

    store.delete("user").await.unwrap();
    assert_eq!(store.get("user").await.unwrap(), None);
    assert!(!store.exists("user").await.unwrap());

    // Idempotent delete.
    store.delete("user").await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn json_payload_is_literal_utf8_on_the_wire() {
    let store = remote("u", "json");
    store.set("42", &json!({"n": "A"}), None).await.unwrap();

    let mut raw = common::raw_connection().await;
    let payload: Option<Vec<u8>> = raw.get("u:42").await.unwrap();
    assert_eq!(payload, Some(br#"{"n":"A"}"#.to_vec()));

    store.delete("42").await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn set_if_absent_is_decided_by_the_server() {
    let prefix = common::unique_prefix("nx");
    let store = remote(&prefix, "binary");

    assert!(store.set_if_absent("k", &json!(1), None).await.unwrap());
    assert!(!store.set_if_absent("k", &json!(2), None).await.unwrap());
    assert_eq!(store.get("k").await.unwrap(), Some(json!(1)));

    store.clear().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn clear_removes_only_namespaced_keys() {
    let prefix = common::unique_prefix("clear");
    let store = remote(&prefix, "binary");
    store.set("a", &json!(1), None).await.unwrap();
    store.set("b", &json!(2), None).await.unwrap();

    // A neighbour outside the namespace must survive the sweep.
    let foreign = common::unique_prefix("foreign-key");
    let mut raw = common::raw_connection().await;
    raw.set_ex::<_, _, ()>(&foreign, "keep", 60).await.unwrap();

    assert_eq!(store.clear().await.unwrap(), 2);
    assert_eq!(store.size().await.unwrap(), 0);
    assert_eq!(store.clear().await.unwrap(), 0);

    let kept: Option<String> = raw.get(&foreign).await.unwrap();
    assert_eq!(kept, Some("keep".into()));
    raw.del::<_, u64>(&foreign).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn ttl_counts_down_and_expires() {
    let prefix = common::unique_prefix("ttl");
    let store = remote(&prefix, "binary");

    store.set("k", &json!("soon gone"), Some(1)).await.unwrap();
    let ttl = store.ttl("k").await.unwrap();
    assert!(matches!(ttl, Some(0) | Some(1)), "unexpected ttl {ttl:?}");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(store.get("k").await.unwrap(), None);
    assert_eq!(store.ttl("k").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn list_keys_strips_the_namespace() {
    let prefix = common::unique_prefix("list");
    let store = remote(&prefix, "binary");
    store.set("user:1", &json!(1), None).await.unwrap();
    store.set("user:2", &json!(2), None).await.unwrap();
    store.set("order:1", &json!(3), None).await.unwrap();

    let mut all = store.list_keys(None).await.unwrap();
    all.sort();
    assert_eq!(all, vec!["order:1", "user:1", "user:2"]);

    let mut users = store.list_keys(Some("user:")).await.unwrap();
    users.sort();
    assert_eq!(users, vec!["user:1", "user:2"]);

    store.clear().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn stats_snapshot_includes_server_counters() {
    let prefix = common::unique_prefix("stats");
    let store = remote(&prefix, "json");
    store.set("k", &json!(1), None).await.unwrap();

    let stats = store.stats().await;
    assert_eq!(stats["enabled"], json!(true));
    assert_eq!(stats["key_prefix"], json!(prefix));
    assert_eq!(stats["serializer"], json!("json"));
    assert_eq!(stats["size"], json!(1));
    assert!(stats["server_stats"]["total_commands_processed"].is_number());

    store.clear().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn values_seeded_behind_l1_are_promoted_on_read() {
    let prefix = common::unique_prefix("promotion");

    // Seed L2 directly, bypassing the coordinator and its L1.
    let seeder = remote(&prefix, "binary");
    seeder.set("k", &json!({"seeded": true}), None).await.unwrap();

    let factory = CacheFactory::new(common::settings(&prefix)).unwrap();
    let cache = factory
        .create_cache(CacheOptions {
            l1_enabled: Some(true),
            l1_maxsize: Some(10),
            l1_ttl: Some(60),
            ..CacheOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(cache.get("k").await, Some(json!({"seeded": true})));

    // The hit landed in L1: dropping the key from L2 no longer hides it.
    seeder.delete("k").await.unwrap();
    assert_eq!(cache.get("k").await, Some(json!({"seeded": true})));

    seeder.clear().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn factory_built_cache_round_trips_end_to_end() {
    let prefix = common::unique_prefix("e2e");
    let factory = CacheFactory::new(common::settings(&prefix)).unwrap();
    let cache = factory
        .create_cache(CacheOptions {
            l1_enabled: Some(true),
            ..CacheOptions::default()
        })
        .await
        .unwrap();
    assert!(cache.l2_enabled());

    cache.set("a", json!(1)).await;
    cache.set("b", json!(2)).await;
    assert_eq!(cache.get("a").await, Some(json!(1)));
    assert!(cache.exists("b").await);
    assert_eq!(cache.list_keys(None).await, vec!["a", "b"]);

    let result = cache.clear().await;
    assert_eq!(result.l1_items_removed, 2);
    assert_eq!(result.l2_items_removed, 2);
    assert_eq!(cache.get("a").await, None);

    cache.close().await;
}
