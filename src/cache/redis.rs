// ABOUTME: Redis/Valkey cache backend with automatic reconnection
// ABOUTME: Pipelined HSET+EXPIRE writes and an LRU read-through cache for hot hash reads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{CacheConfig, CacheError, CacheProvider, ReadOptions};

/// Read-through cache entry mirroring a remote hash
#[derive(Debug, Clone)]
struct LocalEntry {
    fields: HashMap<String, String>,
    expires_at: Instant,
}

/// Redis/Valkey backend.
///
/// Uses `ConnectionManager` for automatic reconnection. Hash reads can be
/// served from a small local LRU standing in for server-assisted client-side
/// caching; local entries are dropped whenever this process writes or deletes
/// the key, and otherwise age out on their own TTL. Only non-empty results
/// are cached locally so an absent key is always re-checked remotely.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
    local: Arc<Mutex<LruCache<String, LocalEntry>>>,
}

impl RedisCache {
    const FALLBACK_LOCAL_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
        Some(n) => n,
        None => unreachable!(),
    };

    /// Connect to the configured cache server
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the connection fails
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let url = Self::url_with_credentials(config)?;

        info!("connecting to cache server");
        let client = redis::Client::open(url.as_str())
            .map_err(|e| CacheError::Config(format!("failed to create cache client: {e}")))?;

        let mut manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Operation(format!("failed to connect to cache: {e}")))?;

        if let Some(name) = &config.client_name {
            // Best effort; the connection works fine without a name.
            let result: Result<(), redis::RedisError> = redis::cmd("CLIENT")
                .arg("SETNAME")
                .arg(name)
                .query_async(&mut manager)
                .await;
            if let Err(e) = result {
                warn!("failed to set cache client name: {e}");
            }
        }

        info!("successfully connected to cache server");

        let capacity =
            NonZeroUsize::new(config.max_local_entries).unwrap_or(Self::FALLBACK_LOCAL_CAPACITY);

        Ok(Self {
            manager,
            local: Arc::new(Mutex::new(LruCache::new(capacity))),
        })
    }

    fn url_with_credentials(config: &CacheConfig) -> Result<url::Url, CacheError> {
        let mut url = url::Url::parse(&config.url)
            .map_err(|e| CacheError::Config(format!("invalid cache URL: {e}")))?;
        if let Some(username) = &config.username {
            url.set_username(username)
                .map_err(|()| CacheError::Config("cache URL does not accept a username".into()))?;
        }
        if let Some(password) = &config.password {
            url.set_password(Some(password))
                .map_err(|()| CacheError::Config("cache URL does not accept a password".into()))?;
        }
        Ok(url)
    }

    async fn invalidate_local(&self, key: &str) {
        self.local.lock().await.pop(key);
    }
}

#[async_trait]
impl CacheProvider for RedisCache {
    async fn hset(
        &self,
        key: &str,
        fields: HashMap<String, String>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let pairs: Vec<(String, String)> = fields.into_iter().collect();
        let mut conn = self.manager.clone();

        let mut pipe = redis::pipe();
        pipe.hset_multiple(key, &pairs);
        if let Some(ttl) = ttl {
            pipe.expire(key, i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
        }

        let _: () = pipe.query_async(&mut conn).await.map_err(|e| {
            tracing::error!("cache HSET pipeline failed: {e}");
            CacheError::Operation(e.to_string())
        })?;

        self.invalidate_local(key).await;
        Ok(())
    }

    async fn hgetall(
        &self,
        key: &str,
        options: ReadOptions,
    ) -> Result<HashMap<String, String>, CacheError> {
        if options.use_local_cache {
            let mut local = self.local.lock().await;
            if let Some(entry) = local.get(key) {
                if entry.expires_at > Instant::now() {
                    debug!("serving {key} from the local read-through cache");
                    return Ok(entry.fields.clone());
                }
                local.pop(key);
            }
        }

        let mut conn = self.manager.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await.map_err(|e| {
            tracing::error!("cache HGETALL failed: {e}");
            CacheError::Operation(e.to_string())
        })?;

        if options.use_local_cache && !fields.is_empty() {
            self.local.lock().await.push(
                key.to_owned(),
                LocalEntry {
                    fields: fields.clone(),
                    expires_at: Instant::now() + options.local_ttl,
                },
            );
        }

        Ok(fields)
    }

    async fn del(&self, key: &str) -> Result<u64, CacheError> {
        let mut conn = self.manager.clone();
        let removed: u64 = conn.del(key).await.map_err(|e| {
            tracing::error!("cache DEL failed: {e}");
            CacheError::Operation(e.to_string())
        })?;

        self.invalidate_local(key).await;
        Ok(removed)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs()).await.map_err(|e| {
                    tracing::error!("cache SETEX failed: {e}");
                    CacheError::Operation(e.to_string())
                })?;
            }
            None => {
                let _: () = conn.set(key, value).await.map_err(|e| {
                    tracing::error!("cache SET failed: {e}");
                    CacheError::Operation(e.to_string())
                })?;
            }
        }
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let _: bool = conn
            .expire(key, i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
            .await
            .map_err(|e| {
                tracing::error!("cache EXPIRE failed: {e}");
                CacheError::Operation(e.to_string())
            })?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Operation(e.to_string()))?;

        if response == "PONG" {
            Ok(())
        } else {
            Err(CacheError::Parse(format!(
                "unexpected PING response '{response}'"
            )))
        }
    }
}
