// ABOUTME: In-memory cache backend with TTL expiry and LRU eviction
// ABOUTME: Background task sweeps expired entries; used by tests and single-node setups
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use super::{CacheConfig, CacheError, CacheProvider, ReadOptions};

/// Stored value: either a hash or a plain string
#[derive(Debug, Clone)]
enum EntryData {
    Hash(HashMap<String, String>),
    Value(String),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: EntryData,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory backend.
///
/// `Arc<RwLock<LruCache>>` is shared with the background cleanup task, which
/// sweeps expired entries so short-TTL keys do not linger until eviction.
#[derive(Clone)]
pub struct InMemoryCache {
    store: Arc<RwLock<LruCache<String, CacheEntry>>>,
    shutdown_tx: Option<Arc<tokio::sync::mpsc::Sender<()>>>,
}

impl InMemoryCache {
    const FALLBACK_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
        Some(n) => n,
        None => unreachable!(),
    };

    /// Create a new in-memory cache
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.max_local_entries).unwrap_or(Self::FALLBACK_CAPACITY);
        let store = Arc::new(RwLock::new(LruCache::new(capacity)));

        let shutdown_tx = if config.enable_background_cleanup {
            let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
            let store_clone = store.clone();
            let cleanup_interval = config.cleanup_interval;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(cleanup_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            Self::cleanup_expired(&store_clone).await;
                        }
                        _ = shutdown_rx.recv() => {
                            tracing::debug!("cache cleanup task received shutdown signal");
                            break;
                        }
                    }
                }
            });

            Some(Arc::new(shutdown_tx))
        } else {
            None
        };

        Self { store, shutdown_tx }
    }

    async fn cleanup_expired(store: &Arc<RwLock<LruCache<String, CacheEntry>>>) {
        let mut guard = store.write().await;

        let expired: Vec<String> = guard
            .iter()
            .filter_map(|(k, v)| v.is_expired().then(|| k.clone()))
            .collect();

        for key in &expired {
            guard.pop(key);
        }

        let removed = expired.len();
        drop(guard);
        if removed > 0 {
            tracing::debug!("cleaned up {removed} expired cache entries");
        }
    }

    async fn insert(&self, key: &str, data: EntryData, ttl: Option<Duration>) {
        let entry = CacheEntry {
            data,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.store.write().await.push(key.to_owned(), entry);
    }
}

#[async_trait]
impl CacheProvider for InMemoryCache {
    async fn hset(
        &self,
        key: &str,
        fields: HashMap<String, String>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.insert(key, EntryData::Hash(fields), ttl).await;
        Ok(())
    }

    async fn hgetall(
        &self,
        key: &str,
        _options: ReadOptions,
    ) -> Result<HashMap<String, String>, CacheError> {
        let mut store = self.store.write().await;

        match store.get(key) {
            Some(entry) if entry.is_expired() => {
                store.pop(key);
                Ok(HashMap::new())
            }
            Some(CacheEntry {
                data: EntryData::Hash(fields),
                ..
            }) => Ok(fields.clone()),
            Some(_) => Err(CacheError::Parse(format!("key {key} does not hold a hash"))),
            None => Ok(HashMap::new()),
        }
    }

    async fn del(&self, key: &str) -> Result<u64, CacheError> {
        let mut store = self.store.write().await;
        match store.pop(key) {
            Some(entry) if !entry.is_expired() => Ok(1),
            _ => Ok(0),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.insert(key, EntryData::Value(value.to_owned()), ttl)
            .await;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut store = self.store.write().await;
        if let Some(entry) = store.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

impl Drop for InMemoryCache {
    fn drop(&mut self) {
        // The cleanup task exits once every sender clone is gone; the explicit
        // signal just makes shutdown prompt.
        if let Some(tx) = &self.shutdown_tx {
            if let Err(e) = tx.try_send(()) {
                tracing::debug!(error = ?e, "cache shutdown signal send failed (channel likely closed)");
            }
        }
    }
}
