//! Whole-collection cache
//!
//! [`HashedCollectionStore`] mirrors an entire table into one hash keyed by
//! entity ID and reloads it wholesale after every successful write.
//!
//! Only suitable for small, read-heavy tables: every mutation pays a full
//! `list_all` plus a rewrite of the whole hash. Concurrent reloads are not
//! coordinated; each one replaces the snapshot atomically from a fresh read,
//! so overlapping reloads are redundant but never produce a mixed snapshot.

use std::marker::PhantomData;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::cache::CacheClient;
use crate::codec::{Codec, JsonCodec};
use crate::config::CacheConfig;
use crate::deadline::within;
use crate::error::{CacheError, Result};
use crate::keys::collection_key;
use crate::models::{Entity, Fields};

/// Caches a whole table as one versioned snapshot.
pub struct HashedCollectionStore<T, B, C, S = JsonCodec> {
    backend: B,
    client: C,
    codec: S,
    table: String,
    key: String,
    ttl: Duration,
    op_timeout: Option<Duration>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, B, C> HashedCollectionStore<T, B, C, JsonCodec>
where
    T: Entity,
    B: Backend<T>,
    C: CacheClient,
{
    /// Creates a store using the JSON codec.
    pub fn json(backend: B, client: C, table: &str, config: &CacheConfig) -> Self {
        Self::new(backend, client, JsonCodec, table, config)
    }
}

impl<T, B, C, S> HashedCollectionStore<T, B, C, S>
where
    T: Entity,
    B: Backend<T>,
    C: CacheClient,
    S: Codec,
{
    /// The snapshot lives under `{config.prefix}/{table}/full`.
    pub fn new(backend: B, client: C, codec: S, table: &str, config: &CacheConfig) -> Self {
        Self {
            backend,
            client,
            codec,
            table: table.to_string(),
            key: collection_key(&config.prefix, table),
            ttl: config.ttl(),
            op_timeout: config.op_timeout(),
            _entity: PhantomData,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Key of the snapshot hash.
    pub fn cache_key(&self) -> &str {
        &self.key
    }

    // == Load ==
    /// Reads the whole table and replaces the cached snapshot with it.
    ///
    /// Returns the number of rows loaded.
    pub async fn load(&self) -> Result<usize> {
        let rows = within(self.op_timeout, "list_all", self.backend.list_all()).await?;

        let fields = rows
            .iter()
            .map(|row| {
                let id = row.id().ok_or_else(|| {
                    CacheError::Backend(format!("{} row without an id", self.table))
                })?;
                Ok((id.to_string(), self.codec.encode(row)?))
            })
            .collect::<Result<Vec<(String, String)>>>()?;

        let key = self.cache_key();
        within(
            self.op_timeout,
            "replace_hash",
            self.client.replace_hash(key, &fields, self.ttl),
        )
        .await?;

        info!("Loaded {} rows into {}", fields.len(), key);
        Ok(fields.len())
    }

    /// Loads the snapshot if it is missing. Returns whether a load ran.
    async fn ensure_loaded(&self, key: &str) -> Result<bool> {
        let present = within(self.op_timeout, "exists", self.client.exists(key)).await?;
        if !present {
            debug!("Snapshot {} missing, loading", key);
            self.load().await?;
        }
        Ok(!present)
    }

    async fn read_one(&self, key: &str, id: &T::Id) -> Result<Option<T>> {
        let raw = within(
            self.op_timeout,
            "hget",
            self.client.hget(key, &id.to_string()),
        )
        .await?;
        raw.map(|raw| self.codec.decode(&raw)).transpose()
    }

    // == Reads ==
    /// Looks one entity up, reloading the snapshot if it is absent from it.
    pub async fn get(&self, id: &T::Id) -> Result<Option<T>> {
        let key = self.cache_key();
        if let Some(found) = self.read_one(key, id).await? {
            return Ok(Some(found));
        }
        debug!("{} not in snapshot {}, reloading", id, key);
        self.load().await?;
        self.read_one(key, id).await
    }

    /// Entities for `ids`, in request order. IDs missing from the snapshot are skipped.
    pub async fn list(&self, ids: &[T::Id]) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let key = self.cache_key();
        self.ensure_loaded(key).await?;

        let fields: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let raws = within(self.op_timeout, "hmget", self.client.hmget(key, &fields)).await?;
        raws.into_iter()
            .flatten()
            .map(|raw| self.codec.decode(&raw))
            .collect()
    }

    /// Every entity in the table.
    pub async fn list_all(&self) -> Result<Vec<T>> {
        let key = self.cache_key();
        let just_loaded = self.ensure_loaded(key).await?;

        let mut raws = within(self.op_timeout, "hgetall", self.client.hgetall(key)).await?;
        if raws.is_empty() && !just_loaded {
            // Expired between the existence check and the read.
            self.load().await?;
            raws = within(self.op_timeout, "hgetall", self.client.hgetall(key)).await?;
        }
        raws.into_iter()
            .map(|(_, raw)| self.codec.decode(&raw))
            .collect()
    }

    // == Writes ==
    async fn reload_after_write(&self, affected: u64) -> Result<()> {
        self.load().await.map(|_| ()).map_err(|err| {
            warn!(
                "Reload of {} failed after a successful write: {}",
                self.cache_key(),
                err
            );
            CacheError::stale(affected, err)
        })
    }

    /// Inserts `entity` (assigning an ID if it has none) and reloads.
    pub async fn create(&self, entity: &mut T) -> Result<()> {
        within(self.op_timeout, "create", self.backend.create(entity)).await?;
        self.reload_after_write(1).await
    }

    /// Upsert: creates when the ID is unset or unknown, replaces otherwise.
    pub async fn save(&self, entity: &mut T) -> Result<()> {
        let exists = match entity.id() {
            Some(id) => self.get(&id).await?.is_some(),
            None => false,
        };
        if exists {
            within(self.op_timeout, "save", self.backend.save(entity)).await?;
        } else {
            within(self.op_timeout, "create", self.backend.create(entity)).await?;
        }
        self.reload_after_write(1).await
    }

    /// Applies a partial update and reloads. Returns matched rows.
    pub async fn update(&self, id: &T::Id, fields: &Fields) -> Result<u64> {
        let affected = within(self.op_timeout, "update", self.backend.update(id, fields)).await?;
        self.reload_after_write(affected).await?;
        Ok(affected)
    }

    /// Deletes rows and reloads. Returns deleted rows.
    pub async fn delete(&self, ids: &[T::Id]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let affected = within(self.op_timeout, "delete", self.backend.delete(ids)).await?;
        self.reload_after_write(affected).await?;
        Ok(affected)
    }

    /// Drops the cached snapshot; the next read reloads it.
    pub async fn clear_cache(&self) -> Result<()> {
        within(
            self.op_timeout,
            "del",
            self.client.del(&[self.key.clone()]),
        )
        .await?;
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.backend.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::cache::MemoryCache;
    use crate::models::{Index, Indexes};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Country {
        id: Option<String>,
        name: String,
    }

    impl Entity for Country {
        type Id = String;

        fn id(&self) -> Option<String> {
            self.id.clone()
        }

        fn set_id(&mut self, id: String) {
            self.id = Some(id);
        }

        fn indexes(&self) -> Indexes {
            std::iter::once(Index::new("name", self.name.as_str())).collect()
        }
    }

    fn country(id: &str, name: &str) -> Country {
        Country {
            id: Some(id.to_string()),
            name: name.to_string(),
        }
    }

    type Store = HashedCollectionStore<Country, Arc<MemoryBackend<Country>>, MemoryCache>;

    fn store() -> (Store, Arc<MemoryBackend<Country>>, MemoryCache) {
        let backend = Arc::new(MemoryBackend::new());
        let cache = MemoryCache::new();
        let store = HashedCollectionStore::json(
            backend.clone(),
            cache.clone(),
            "countries",
            &CacheConfig::default().with_prefix("test").with_ttl(60),
        );
        (store, backend, cache)
    }

    #[tokio::test]
    async fn test_get_loads_snapshot_once() {
        let (store, backend, cache) = store();
        backend.seed(country("fr", "France")).await.unwrap();
        backend.seed(country("de", "Germany")).await.unwrap();

        assert_eq!(
            store.get(&"fr".to_string()).await.unwrap(),
            Some(country("fr", "France"))
        );
        assert_eq!(backend.reads(), 1);
        assert!(cache.ttl_remaining(&store.cache_key()).await.flatten().is_some());

        assert!(store.get(&"de".to_string()).await.unwrap().is_some());
        assert_eq!(backend.reads(), 1, "second read served from the snapshot");
    }

    #[tokio::test]
    async fn test_get_unknown_id_reloads_and_reports_not_found() {
        let (store, backend, _) = store();
        backend.seed(country("fr", "France")).await.unwrap();

        assert_eq!(store.get(&"zz".to_string()).await.unwrap(), None);
        assert_eq!(backend.reads(), 1);
    }

    #[tokio::test]
    async fn test_list_skips_absent_ids() {
        let (store, backend, _) = store();
        backend.seed(country("fr", "France")).await.unwrap();
        backend.seed(country("de", "Germany")).await.unwrap();

        let ids = vec!["de".to_string(), "zz".to_string(), "fr".to_string()];
        let names: Vec<String> = store
            .list(&ids)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Germany", "France"]);
    }

    #[tokio::test]
    async fn test_writes_reload_whole_snapshot() {
        let (store, backend, _) = store();
        backend.seed(country("fr", "France")).await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 1);

        store.create(&mut country("de", "Germany")).await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 2);

        let deleted = store.delete(&["fr".to_string()]).await.unwrap();
        assert_eq!(deleted, 1);
        let all = store.list_all().await.unwrap();
        assert_eq!(all, vec![country("de", "Germany")]);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_snapshot_untouched() {
        let (store, backend, _) = store();
        backend.seed(country("fr", "France")).await.unwrap();
        store.list_all().await.unwrap();
        let reads = backend.reads();

        backend.set_fail_writes(true);
        let result = store.create(&mut country("de", "Germany")).await;
        assert!(matches!(result, Err(CacheError::Backend(_))));
        assert_eq!(backend.reads(), reads, "no reload after a rejected write");
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_reload() {
        let (store, backend, cache) = store();
        backend.seed(country("fr", "France")).await.unwrap();
        store.list_all().await.unwrap();

        store.clear_cache().await.unwrap();
        assert!(!cache.exists(&store.cache_key()).await.unwrap());

        store.list_all().await.unwrap();
        assert_eq!(backend.reads(), 2);
    }

    #[tokio::test]
    async fn test_empty_table_lists_nothing() {
        let (store, backend, _) = store();
        assert_eq!(store.cache_key(), "test/countries/full");
        assert!(store.list_all().await.unwrap().is_empty());
        assert_eq!(backend.reads(), 1, "one load per read of an empty table");
        assert!(store.list(&["x".to_string()]).await.unwrap().is_empty());
    }
}
