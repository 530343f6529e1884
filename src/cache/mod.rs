// ABOUTME: Cache abstraction over the TTL-expiring key-value store holding codes and sessions
// ABOUTME: Pluggable backends (Redis/Valkey, in-memory) behind a single provider trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

pub mod memory;
pub mod redis;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use self::memory::InMemoryCache;
use self::redis::RedisCache;

/// Cache layer failures. Raw backend errors are logged at the call site and
/// never carried into response bodies.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache operation failed: {0}")]
    Operation(String),
    #[error("failed to parse cache result: {0}")]
    Parse(String),
    #[error("cache configuration error: {0}")]
    Config(String),
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Backend URL; `memory:` selects the in-memory backend
    pub url: String,
    /// Optional credentials for the cache server
    pub username: Option<String>,
    pub password: Option<String>,
    /// Optional CLIENT SETNAME value
    pub client_name: Option<String>,
    /// Capacity of the client-side read-through cache / memory backend
    pub max_local_entries: usize,
    /// Sweep interval for expired entries (memory backend)
    pub cleanup_interval: Duration,
    /// Background cleanup task toggle; tests disable it to avoid runtime churn
    pub enable_background_cleanup: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "memory:".to_owned(),
            username: None,
            password: None,
            client_name: None,
            max_local_entries: 10_000,
            cleanup_interval: Duration::from_secs(60),
            enable_background_cleanup: true,
        }
    }
}

/// Read-side options for `hgetall`
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Serve from the client-side read-through cache when possible
    pub use_local_cache: bool,
    /// How long a read-through entry stays valid
    pub local_ttl: Duration,
}

impl ReadOptions {
    /// Read through the local cache with the given entry lifetime
    #[must_use]
    pub const fn cached(local_ttl: Duration) -> Self {
        Self {
            use_local_cache: true,
            local_ttl,
        }
    }

    /// Always hit the backend
    #[must_use]
    pub const fn uncached() -> Self {
        Self {
            use_local_cache: false,
            local_ttl: Duration::ZERO,
        }
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::cached(Duration::from_secs(300))
    }
}

/// Provider trait for the cache primitives the grant flows need
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Write all fields of a hash; with a TTL the HSET and EXPIRE commands are
    /// pipelined and any failure fails the operation
    async fn hset(
        &self,
        key: &str,
        fields: HashMap<String, String>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Read all fields of a hash. An empty map is indistinguishable from an
    /// absent key, by contract
    async fn hgetall(
        &self,
        key: &str,
        options: ReadOptions,
    ) -> Result<HashMap<String, String>, CacheError>;

    /// Delete a key, returning how many keys were removed. The count is what
    /// makes single-use enforcement possible under concurrent redemptions
    async fn del(&self, key: &str) -> Result<u64, CacheError>;

    /// Set a plain string value, optionally with a TTL
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Set a TTL on an existing key
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Verify the backend is reachable
    async fn health_check(&self) -> Result<(), CacheError>;
}

/// Unified cache handle dispatching to the configured backend
#[derive(Clone)]
pub enum Cache {
    Redis(RedisCache),
    Memory(InMemoryCache),
}

impl Cache {
    /// Create a cache instance for the configured backend
    ///
    /// # Errors
    /// Returns an error if the backend connection fails
    pub async fn connect(config: CacheConfig) -> Result<Self, CacheError> {
        if config.url.starts_with("memory") {
            tracing::info!(
                "initializing in-memory cache (max entries: {})",
                config.max_local_entries
            );
            Ok(Self::Memory(InMemoryCache::new(&config)))
        } else {
            Ok(Self::Redis(RedisCache::connect(&config).await?))
        }
    }
}

#[async_trait]
impl CacheProvider for Cache {
    async fn hset(
        &self,
        key: &str,
        fields: HashMap<String, String>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        match self {
            Self::Redis(cache) => cache.hset(key, fields, ttl).await,
            Self::Memory(cache) => cache.hset(key, fields, ttl).await,
        }
    }

    async fn hgetall(
        &self,
        key: &str,
        options: ReadOptions,
    ) -> Result<HashMap<String, String>, CacheError> {
        match self {
            Self::Redis(cache) => cache.hgetall(key, options).await,
            Self::Memory(cache) => cache.hgetall(key, options).await,
        }
    }

    async fn del(&self, key: &str) -> Result<u64, CacheError> {
        match self {
            Self::Redis(cache) => cache.del(key).await,
            Self::Memory(cache) => cache.del(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        match self {
            Self::Redis(cache) => cache.set(key, value, ttl).await,
            Self::Memory(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        match self {
            Self::Redis(cache) => cache.expire(key, ttl).await,
            Self::Memory(cache) => cache.expire(key, ttl).await,
        }
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        match self {
            Self::Redis(cache) => cache.health_check().await,
            Self::Memory(cache) => cache.health_check().await,
        }
    }
}
