//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cachelayer::{
    CacheClient, CacheConfig, CacheError, Entity, Index, Indexes, MemoryCache, Result,
};
use serde::{Deserialize, Serialize};

// == Tracing ==
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cachelayer=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

pub fn config() -> CacheConfig {
    CacheConfig::default().with_prefix("test").with_ttl(60)
}

// == Entity ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub age: u32,
}

impl User {
    pub fn new(name: &str, email: &str, age: u32) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            email: email.to_string(),
            age,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

impl Entity for User {
    type Id = String;

    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn index_shapes() -> &'static [&'static [&'static str]] {
        &[&["name"], &["email"]]
    }

    fn indexes(&self) -> Indexes {
        vec![
            Index::new("name", self.name.as_str()),
            Index::new("email", self.email.as_str()),
        ]
        .into_iter()
        .collect()
    }
}

// == Fault-Injecting Cache ==
/// A [`MemoryCache`] that can be told to fail specific commands and records
/// every key passed to DEL.
#[derive(Clone, Default)]
pub struct FlakyCache {
    pub inner: MemoryCache,
    pub fail_del: Arc<AtomicBool>,
    pub fail_expire: Arc<AtomicBool>,
    pub fail_replace: Arc<AtomicBool>,
    pub deleted: Arc<Mutex<Vec<String>>>,
    pub delay: Arc<Mutex<Option<Duration>>>,
}

impl FlakyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn clear_deleted(&self) {
        self.deleted.lock().unwrap().clear();
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(CacheError::Store(format!("{} refused", op)));
        }
        Ok(())
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl CacheClient for FlakyCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.pause().await;
        self.inner.get(key).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.inner.mget(keys).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.inner.set_ex(key, value, ttl).await
    }

    async fn mset(&self, pairs: &[(String, String)]) -> Result<()> {
        self.inner.mset(pairs).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        Self::check(&self.fail_expire, "EXPIRE")?;
        self.inner.expire(key, ttl).await
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        Self::check(&self.fail_del, "DEL")?;
        self.deleted.lock().unwrap().extend(keys.iter().cloned());
        self.inner.del(keys).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        self.inner.hset(key, fields).await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.inner.hget(key, field).await
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>> {
        self.inner.hmget(key, fields).await
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> Result<u64> {
        self.inner.hdel(key, fields).await
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>> {
        self.inner.hgetall(key).await
    }

    async fn replace_hash(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<()> {
        Self::check(&self.fail_replace, "MULTI/EXEC")?;
        self.inner.replace_hash(key, fields, ttl).await
    }
}
