//! Cache store wire contract
//!
//! The operations this layer needs from a key-value cache store. A Redis
//! client maps each method onto the command of the same name;
//! [`MemoryCache`](crate::cache::MemoryCache) implements it in-process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Key-value cache store with string and hash values.
///
/// Missing keys and fields are reported as `None`, never as errors.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// GET
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// MGET; one slot per key, in order.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// SET with expiry (SETEX).
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// MSET; written without expiry.
    async fn mset(&self, pairs: &[(String, String)]) -> Result<()>;

    /// EXPIRE; false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// EXPIRE for many keys in one round trip (a pipeline on Redis).
    ///
    /// The outer error means the batch never ran; otherwise there is one
    /// result per key, in order. The default sends one EXPIRE per key.
    async fn expire_many(&self, keys: &[String], ttl: Duration) -> Result<Vec<Result<bool>>> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.expire(key, ttl).await);
        }
        Ok(results)
    }

    /// DEL; returns how many keys existed.
    async fn del(&self, keys: &[String]) -> Result<u64>;

    /// EXISTS
    async fn exists(&self, key: &str) -> Result<bool>;

    /// HSET
    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// HGET
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// HMGET; one slot per field, in order.
    async fn hmget(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>>;

    /// HDEL; returns how many fields existed.
    async fn hdel(&self, key: &str, fields: &[String]) -> Result<u64>;

    /// HGETALL
    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>>;

    /// DEL + HSET + EXPIRE applied as one unit (MULTI/EXEC on Redis).
    ///
    /// Readers observe either the old hash or the new one, never a mix.
    /// An empty field list leaves the key absent.
    async fn replace_hash(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<()>;
}

#[async_trait]
impl<C: CacheClient + ?Sized> CacheClient for Arc<C> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        (**self).mget(keys).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        (**self).set_ex(key, value, ttl).await
    }

    async fn mset(&self, pairs: &[(String, String)]) -> Result<()> {
        (**self).mset(pairs).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        (**self).expire(key, ttl).await
    }

    async fn expire_many(&self, keys: &[String], ttl: Duration) -> Result<Vec<Result<bool>>> {
        (**self).expire_many(keys, ttl).await
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        (**self).del(keys).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key).await
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        (**self).hset(key, fields).await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        (**self).hget(key, field).await
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>> {
        (**self).hmget(key, fields).await
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> Result<u64> {
        (**self).hdel(key, fields).await
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>> {
        (**self).hgetall(key).await
    }

    async fn replace_hash(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<()> {
        (**self).replace_hash(key, fields, ttl).await
    }
}
