//! In-process cache store
//!
//! [`MemoryCache`] wraps a [`CacheStore`] in `Arc<RwLock<>>` and exposes it
//! through the [`CacheClient`] contract. Clones share the same key space.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{CacheClient, CacheStats, CacheStore};
use crate::error::Result;

/// Thread-safe in-memory cache store.
#[derive(Clone, Default)]
pub struct MemoryCache {
    store: Arc<RwLock<CacheStore>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    /// Number of entries, including ones whose TTL elapsed but were not touched since.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    /// Remaining TTL of a live key. `Some(None)` means it never expires.
    pub async fn ttl_remaining(&self, key: &str) -> Option<Option<Duration>> {
        self.store.write().await.ttl_remaining(key)
    }

    /// Drops every expired entry now.
    pub async fn purge_expired(&self) -> usize {
        self.store.write().await.purge_expired()
    }
}

// Reads take the write lock: lazy expiry and stats mutate the store.
#[async_trait]
impl CacheClient for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.write().await.get(key)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut store = self.store.write().await;
        keys.iter().map(|key| store.get(key)).collect()
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.store.write().await.set(key, value, Some(ttl))
    }

    async fn mset(&self, pairs: &[(String, String)]) -> Result<()> {
        let mut store = self.store.write().await;
        for (key, value) in pairs {
            store.set(key, value, None)?;
        }
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        Ok(self.store.write().await.expire(key, ttl))
    }

    async fn expire_many(&self, keys: &[String], ttl: Duration) -> Result<Vec<Result<bool>>> {
        let mut store = self.store.write().await;
        Ok(keys.iter().map(|key| Ok(store.expire(key, ttl))).collect())
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        Ok(self.store.write().await.delete(keys) as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.store.write().await.exists(key))
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        self.store.write().await.hset(key, fields)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.store.write().await.hget(key, field)
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>> {
        self.store.write().await.hmget(key, fields)
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> Result<u64> {
        Ok(self.store.write().await.hdel(key, fields)? as u64)
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>> {
        self.store.write().await.hgetall(key)
    }

    async fn replace_hash(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<()> {
        self.store.write().await.replace_hash(key, fields, ttl)
    }
}
