//! Keyed cache-aside primitive
//!
//! [`KeyedStore`] reads and writes typed values under string keys, with
//! negative caching and batched variants. Every write carries the
//! configured TTL.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::cache::CacheClient;
use crate::codec::{is_absent, Codec, JsonCodec, ABSENT};
use crate::config::CacheConfig;
use crate::deadline::within;
use crate::error::{CacheError, Result};

// == Lookup Result ==
/// Outcome of a single cached lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Cached<T> {
    /// A value is cached.
    Hit(T),
    /// The negative-result sentinel is cached: the backend is known to have
    /// nothing here, so do not ask it again.
    Absent,
    /// Nothing is cached.
    Miss,
}

impl<T> Cached<T> {
    /// Collapses to the plain "found or not" view; `Absent` and `Miss` are both `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Cached::Hit(value) => Some(value),
            Cached::Absent | Cached::Miss => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Cached::Hit(_))
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Cached::Miss)
    }
}

/// Result of [`KeyedStore::batch_get`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchGet<T> {
    /// One slot per requested key; `None` for misses and cached absences.
    pub values: Vec<Option<T>>,
    /// Positions with nothing cached. Cached absences are not listed.
    pub missed: Vec<usize>,
}

// == Keyed Store ==
/// Typed get/set/delete over a [`CacheClient`].
#[derive(Debug, Clone)]
pub struct KeyedStore<C, S = JsonCodec> {
    client: C,
    codec: S,
    ttl: Duration,
    op_timeout: Option<Duration>,
}

impl<C: CacheClient> KeyedStore<C, JsonCodec> {
    /// Creates a store using the JSON codec.
    pub fn json(client: C, config: &CacheConfig) -> Self {
        Self::new(client, JsonCodec, config)
    }
}

impl<C: CacheClient, S: Codec> KeyedStore<C, S> {
    pub fn new(client: C, codec: S, config: &CacheConfig) -> Self {
        Self {
            client,
            codec,
            ttl: config.ttl(),
            op_timeout: config.op_timeout(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn codec(&self) -> &S {
        &self.codec
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn op_timeout(&self) -> Option<Duration> {
        self.op_timeout
    }

    fn decode_slot<T: DeserializeOwned>(&self, raw: &str) -> Result<Option<T>> {
        if is_absent(raw) {
            return Ok(None);
        }
        self.codec.decode(raw).map(Some)
    }

    // == Single Key ==
    /// Reads one key.
    ///
    /// A malformed payload is a serialization error; a missing key is `Miss`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Cached<T>> {
        let raw = within(self.op_timeout, "get", self.client.get(key)).await?;
        match raw {
            None => Ok(Cached::Miss),
            Some(raw) => Ok(match self.decode_slot(&raw)? {
                Some(value) => Cached::Hit(value),
                None => Cached::Absent,
            }),
        }
    }

    /// Writes one value with the configured TTL.
    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let raw = self.codec.encode(value)?;
        within(
            self.op_timeout,
            "set",
            self.client.set_ex(key, &raw, self.ttl),
        )
        .await
    }

    /// Caches the fact that nothing exists under `key`.
    pub async fn set_absent(&self, key: &str) -> Result<()> {
        within(
            self.op_timeout,
            "set",
            self.client.set_ex(key, ABSENT, self.ttl),
        )
        .await
    }

    // == Batches ==
    /// Reads many keys at once, reporting which positions missed.
    pub async fn batch_get<T: DeserializeOwned>(&self, keys: &[String]) -> Result<BatchGet<T>> {
        if keys.is_empty() {
            return Ok(BatchGet {
                values: Vec::new(),
                missed: Vec::new(),
            });
        }
        let raws = within(self.op_timeout, "mget", self.client.mget(keys)).await?;

        let mut values = Vec::with_capacity(keys.len());
        let mut missed = Vec::new();
        for (i, raw) in raws.into_iter().enumerate() {
            match raw {
                None => {
                    missed.push(i);
                    values.push(None);
                }
                Some(raw) => values.push(self.decode_slot(&raw)?),
            }
        }
        Ok(BatchGet { values, missed })
    }

    /// Writes many values.
    ///
    /// All values are encoded before anything is written, so an encoding
    /// failure leaves the cache untouched. The TTL is applied after the bulk
    /// write; if that step fails for some keys the values stay written and
    /// the error names how many keys lack a refreshed expiry.
    pub async fn batch_set<T: Serialize + Sync>(&self, items: &[(String, T)]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let pairs = items
            .iter()
            .map(|(key, value)| Ok((key.clone(), self.codec.encode(value)?)))
            .collect::<Result<Vec<(String, String)>>>()?;

        self.write_batch(&pairs).await
    }

    /// Negative-caches many keys.
    pub async fn batch_set_absent(&self, keys: &[String]) -> Result<()> {
        let pairs: Vec<(String, String)> = keys
            .iter()
            .map(|key| (key.clone(), ABSENT.to_string()))
            .collect();
        self.write_batch(&pairs).await
    }

    async fn write_batch(&self, pairs: &[(String, String)]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        within(self.op_timeout, "mset", self.client.mset(pairs)).await?;

        let keys: Vec<String> = pairs.iter().map(|(key, _)| key.clone()).collect();
        self.expire_all(&keys).await
    }

    /// Applies the TTL to every key in one batch, reporting every key that
    /// did not get it.
    async fn expire_all(&self, keys: &[String]) -> Result<()> {
        let results = within(
            self.op_timeout,
            "expire",
            self.client.expire_many(keys, self.ttl),
        )
        .await?;

        let mut failed = Vec::new();
        let mut last_error = None;
        for (key, result) in keys.iter().zip(results) {
            if let Err(err) = result {
                failed.push(key.as_str());
                last_error = Some(err);
            }
        }

        match last_error {
            None => Ok(()),
            Some(err) => {
                warn!(
                    "Expiry not applied to {} of {} keys: {}",
                    failed.len(),
                    keys.len(),
                    err
                );
                Err(CacheError::Store(format!(
                    "expiry not applied to {} of {} keys ({}): {}",
                    failed.len(),
                    keys.len(),
                    failed.join(", "),
                    err
                )))
            }
        }
    }

    // == Invalidation ==
    /// Deletes keys. Deleting an absent key succeeds.
    pub async fn invalidate(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        within(self.op_timeout, "del", self.client.del(keys)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        name: String,
    }

    fn item(name: &str) -> Item {
        Item {
            name: name.to_string(),
        }
    }

    fn store() -> KeyedStore<MemoryCache> {
        KeyedStore::json(MemoryCache::new(), &CacheConfig::default().with_ttl(60))
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_get_miss() {
        let store = store();
        let got: Cached<Item> = store.get("nope").await.unwrap();
        assert_eq!(got, Cached::Miss);
        assert_eq!(got.into_option(), None);
    }

    #[tokio::test]
    async fn test_set_then_get_applies_ttl() {
        let store = store();
        store.set("k", &item("a")).await.unwrap();

        assert_eq!(store.get::<Item>("k").await.unwrap(), Cached::Hit(item("a")));
        let ttl = store.client().ttl_remaining("k").await.flatten().unwrap();
        assert!(ttl <= Duration::from_secs(60) && ttl > Duration::from_secs(58));
    }

    #[tokio::test]
    async fn test_absent_sentinel_is_not_found_and_not_miss() {
        let store = store();
        store.set_absent("k").await.unwrap();

        let got = store.get::<Item>("k").await.unwrap();
        assert_eq!(got, Cached::Absent);
        assert!(!got.is_found());
        assert!(!got.is_miss());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_serialization_error() {
        let store = store();
        store
            .client()
            .set_ex("k", "{broken", Duration::from_secs(5))
            .await
            .unwrap();
        let result = store.get::<Item>("k").await;
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_batch_get_reports_missed_positions() {
        let store = store();
        store.set("a", &item("a")).await.unwrap();
        store.set_absent("b").await.unwrap();

        let got: BatchGet<Item> = store.batch_get(&keys(&["a", "b", "c"])).await.unwrap();
        assert_eq!(got.values, vec![Some(item("a")), None, None]);
        assert_eq!(got.missed, vec![2]);
    }

    #[tokio::test]
    async fn test_batch_set_writes_all_with_ttl() {
        let store = store();
        let items = vec![("a".to_string(), item("a")), ("b".to_string(), item("b"))];
        store.batch_set(&items).await.unwrap();

        let got: BatchGet<Item> = store.batch_get(&keys(&["a", "b"])).await.unwrap();
        assert_eq!(got.values, vec![Some(item("a")), Some(item("b"))]);
        assert!(got.missed.is_empty());
        for key in ["a", "b"] {
            assert!(store.client().ttl_remaining(key).await.flatten().is_some());
        }
    }

    #[tokio::test]
    async fn test_batch_set_absent() {
        let store = store();
        store.batch_set_absent(&keys(&["x", "y"])).await.unwrap();

        assert_eq!(store.get::<Item>("x").await.unwrap(), Cached::Absent);
        assert!(store.client().ttl_remaining("y").await.flatten().is_some());
    }

    #[tokio::test]
    async fn test_batch_set_encoding_failure_writes_nothing() {
        use std::collections::HashMap;

        let store = store();
        // JSON objects need string keys; a tuple key fails to encode.
        let mut bad = HashMap::new();
        bad.insert((1, 2), 3);
        let items = vec![("good".to_string(), HashMap::new()), ("bad".to_string(), bad)];

        let result = store.batch_set(&items).await;
        assert!(matches!(result, Err(CacheError::Serialization(_))));
        assert!(store.client().is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate_absent_key_is_ok() {
        let store = store();
        store.invalidate(&keys(&["ghost"])).await.unwrap();
        store.invalidate(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_removes_value() {
        let store = store();
        store.set("k", &item("a")).await.unwrap();
        store.invalidate(&keys(&["k"])).await.unwrap();
        assert_eq!(store.get::<Item>("k").await.unwrap(), Cached::Miss);
    }
}
