// ABOUTME: Cache facade semantics against the in-memory backend
// ABOUTME: Hash writes, absent-key contract, delete counts, TTL expiry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::collections::HashMap;
use std::time::Duration;

use latchkey::cache::memory::InMemoryCache;
use latchkey::cache::{CacheConfig, CacheProvider, ReadOptions};

fn test_cache() -> InMemoryCache {
    InMemoryCache::new(&CacheConfig {
        enable_background_cleanup: false,
        ..CacheConfig::default()
    })
}

fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

#[tokio::test]
async fn hset_and_hgetall_round_trip() {
    let cache = test_cache();
    cache
        .hset("session:abc", fields(&[("subject", "u1"), ("scopes", "a,b")]), None)
        .await
        .unwrap();

    let stored = cache
        .hgetall("session:abc", ReadOptions::uncached())
        .await
        .unwrap();
    assert_eq!(stored.get("subject").map(String::as_str), Some("u1"));
    assert_eq!(stored.get("scopes").map(String::as_str), Some("a,b"));
}

#[tokio::test]
async fn absent_key_reads_as_an_empty_map() {
    let cache = test_cache();
    let stored = cache
        .hgetall("authorization-code:missing", ReadOptions::uncached())
        .await
        .unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn del_reports_how_many_keys_were_removed() {
    let cache = test_cache();
    cache
        .hset("authorization-code:x", fields(&[("clientId", "c1")]), None)
        .await
        .unwrap();

    assert_eq!(cache.del("authorization-code:x").await.unwrap(), 1);
    // Second delete finds nothing; this is what makes codes single-use.
    assert_eq!(cache.del("authorization-code:x").await.unwrap(), 0);
}

#[tokio::test]
async fn entries_expire_with_their_ttl() {
    let cache = test_cache();
    cache
        .hset(
            "authorization-code:x",
            fields(&[("clientId", "c1")]),
            Some(Duration::from_millis(30)),
        )
        .await
        .unwrap();

    let stored = cache
        .hgetall("authorization-code:x", ReadOptions::uncached())
        .await
        .unwrap();
    assert!(!stored.is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;

    let stored = cache
        .hgetall("authorization-code:x", ReadOptions::uncached())
        .await
        .unwrap();
    assert!(stored.is_empty());
    assert_eq!(cache.del("authorization-code:x").await.unwrap(), 0);
}

#[tokio::test]
async fn expire_shortens_the_lifetime_of_an_existing_key() {
    let cache = test_cache();
    cache.set("k", "v", None).await.unwrap();
    cache.expire("k", Duration::from_millis(30)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cache.del("k").await.unwrap(), 0);
}

#[tokio::test]
async fn set_with_ttl_expires() {
    let cache = test_cache();
    cache
        .set("revoked-session:j1", "1", Some(Duration::from_millis(30)))
        .await
        .unwrap();
    assert_eq!(cache.del("revoked-session:j1").await.unwrap(), 1);

    cache
        .set("revoked-session:j2", "1", Some(Duration::from_millis(10)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(cache.del("revoked-session:j2").await.unwrap(), 0);
}

#[tokio::test]
async fn health_check_is_always_ok() {
    let cache = test_cache();
    cache.health_check().await.unwrap();
}
