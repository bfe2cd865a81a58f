//! Entity-level cache coordinator
//!
//! [`CacheCoordinator`] is the CRUD + query API callers use. Reads go
//! through the cache and fall back to the backend on a miss; writes go to
//! the backend first and invalidate every cache key the write may have
//! made stale.
//!
//! There is no in-process locking. Concurrent misses on one key may each
//! query the backend and each fill the cache (a stampede); every fill
//! writes what the backend returned, so the last writer wins with a value
//! that was true when read. Single-flight de-duplication of misses is not
//! implemented. Two concurrent `update`s of one entity may each capture a
//! different pre-update index set; the union each invalidates still covers
//! its own write.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::cache::CacheClient;
use crate::codec::{Codec, JsonCodec};
use crate::config::CacheConfig;
use crate::deadline::within;
use crate::error::{CacheError, Result};
use crate::invalidator::{dedupe, IndexInvalidator};
use crate::keyed::{Cached, KeyedStore};
use crate::keys::KeySpace;
use crate::models::{compare_by, Entity, Fields, Index, Indexes, OrderBy};

// == Index Entry ==
/// What an index key holds: the IDs reachable through that index.
///
/// `get_by` writes `One`; `list_by` needs the complete match set and writes
/// `All`, replacing a `One` it finds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexEntry<I> {
    One(I),
    All(Vec<I>),
}

impl<I> IndexEntry<I> {
    /// The first reachable ID, if any.
    pub fn first(&self) -> Option<&I> {
        match self {
            IndexEntry::One(id) => Some(id),
            IndexEntry::All(ids) => ids.first(),
        }
    }
}

// == Coordinator ==
/// Read-through, write-then-invalidate cache for one entity type.
pub struct CacheCoordinator<T, B, C, S = JsonCodec> {
    backend: B,
    store: KeyedStore<C, S>,
    invalidator: IndexInvalidator,
    op_timeout: Option<Duration>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, B, C> CacheCoordinator<T, B, C, JsonCodec>
where
    T: Entity,
    B: Backend<T>,
    C: CacheClient,
{
    /// Creates a coordinator using the JSON codec.
    pub fn json(backend: B, client: C, table: &str, id_field: &str, config: &CacheConfig) -> Self {
        Self::new(backend, client, JsonCodec, table, id_field, config)
    }
}

impl<T, B, C, S> CacheCoordinator<T, B, C, S>
where
    T: Entity,
    B: Backend<T>,
    C: CacheClient,
    S: Codec,
{
    /// Keys are derived from `config.prefix`, `table` and `id_field`.
    pub fn new(
        backend: B,
        client: C,
        codec: S,
        table: &str,
        id_field: &str,
        config: &CacheConfig,
    ) -> Self {
        Self {
            backend,
            store: KeyedStore::new(client, codec, config),
            invalidator: IndexInvalidator::new(KeySpace::from_config(config, table, id_field)),
            op_timeout: config.op_timeout(),
            _entity: PhantomData,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn keyed(&self) -> &KeyedStore<C, S> {
        &self.store
    }

    pub fn invalidator(&self) -> &IndexInvalidator {
        &self.invalidator
    }

    fn keys(&self) -> &KeySpace {
        self.invalidator.key_space()
    }

    // == Reads ==
    /// Looks one entity up by ID.
    ///
    /// A cached absence is returned without asking the backend, even if the
    /// backend has since gained the row; it clears on invalidation or expiry.
    pub async fn get(&self, id: &T::Id) -> Result<Option<T>> {
        let key = self.keys().primary_key(id);
        match self.store.get::<T>(&key).await? {
            Cached::Hit(entity) => {
                debug!("Cache hit: {}", key);
                Ok(Some(entity))
            }
            Cached::Absent => {
                debug!("Cached absence: {}", key);
                Ok(None)
            }
            Cached::Miss => {
                debug!("Cache miss: {}", key);
                let found = within(self.op_timeout, "backend get", self.backend.get(id)).await?;
                match &found {
                    Some(entity) => self.store.set(&key, entity).await?,
                    None => self.store.set_absent(&key).await?,
                }
                Ok(found)
            }
        }
    }

    /// Entities for `ids`, in request order; unknown IDs are skipped.
    ///
    /// Only the IDs that missed the cache are fetched from the backend.
    pub async fn list(&self, ids: &[T::Id]) -> Result<Vec<T>> {
        let mut seen = HashSet::new();
        let ids: Vec<T::Id> = ids.iter().filter(|id| seen.insert(*id)).cloned().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.keys().primary_key(id)).collect();
        let mut batch = self.store.batch_get::<T>(&keys).await?;
        if batch.missed.is_empty() {
            return Ok(batch.values.into_iter().flatten().collect());
        }

        let missing: Vec<T::Id> = batch.missed.iter().map(|&i| ids[i].clone()).collect();
        debug!("Cache missed {} of {} ids", missing.len(), ids.len());
        let fetched = within(self.op_timeout, "backend list", self.backend.list(&missing)).await?;
        let mut fetched: HashMap<T::Id, T> = fetched
            .into_iter()
            .filter_map(|entity| entity.id().map(|id| (id, entity)))
            .collect();

        let mut found = Vec::new();
        let mut absent = Vec::new();
        for &i in &batch.missed {
            match fetched.remove(&ids[i]) {
                Some(entity) => {
                    found.push((keys[i].clone(), entity.clone()));
                    batch.values[i] = Some(entity);
                }
                None => absent.push(keys[i].clone()),
            }
        }
        self.store.batch_set(&found).await?;
        self.store.batch_set_absent(&absent).await?;

        Ok(batch.values.into_iter().flatten().collect())
    }

    /// An index on the ID field alone is a primary-key lookup and shares
    /// the primary key's cache entry.
    fn primary_lookup(&self, index: &Index) -> Option<T::Id> {
        let (field, value) = index.fields().next()?;
        if index.len() != 1 || !field.eq_ignore_ascii_case(self.keys().id_field()) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Whether `entity` currently declares the index stored under `key`.
    fn indexed_by(&self, entity: &T, key: &str) -> bool {
        self.invalidator.keys_for(entity).iter().any(|k| k == key)
    }

    /// One entity matching `index`.
    ///
    /// Only declared index shapes (see [`Entity::index_shapes`]) are cached.
    /// A cached entry is used only while the entity it names still declares
    /// the index; otherwise the lookup goes back to the backend.
    pub async fn get_by(&self, index: &Index) -> Result<Option<T>> {
        if let Some(id) = self.primary_lookup(index) {
            return self.get(&id).await;
        }
        if !T::declares(index) {
            debug!("Undeclared index {:?}, reading through", index);
            return within(self.op_timeout, "backend get_by", self.backend.get_by(index)).await;
        }

        let key = self.keys().index_key(index);
        match self.store.get::<IndexEntry<T::Id>>(&key).await? {
            Cached::Absent => return Ok(None),
            Cached::Hit(entry) => {
                let Some(id) = entry.first() else {
                    return Ok(None);
                };
                match self.get(id).await? {
                    Some(entity) if self.indexed_by(&entity, &key) => {
                        debug!("Index hit: {}", key);
                        return Ok(Some(entity));
                    }
                    _ => debug!("Index entry {} is stale", key),
                }
            }
            Cached::Miss => debug!("Index miss: {}", key),
        }

        let found = within(self.op_timeout, "backend get_by", self.backend.get_by(index)).await?;
        match found.as_ref() {
            Some(entity) => {
                if let Some(id) = entity.id() {
                    self.store.set(&self.keys().primary_key(&id), entity).await?;
                    if self.indexed_by(entity, &key) {
                        self.store.set(&key, &IndexEntry::One(id)).await?;
                    }
                }
            }
            None => self.store.set_absent(&key).await?,
        }
        Ok(found)
    }

    /// Every entity matching `index`, ordered by `order_bys`.
    ///
    /// The order never takes part in the cache key: a cached match set is
    /// re-sorted for each caller. Caching follows the same rules as
    /// [`CacheCoordinator::get_by`].
    pub async fn list_by(&self, index: &Index, order_bys: &[OrderBy]) -> Result<Vec<T>> {
        if let Some(id) = self.primary_lookup(index) {
            return self.list(std::slice::from_ref(&id)).await;
        }
        if !T::declares(index) {
            debug!("Undeclared index {:?}, reading through", index);
            return within(
                self.op_timeout,
                "backend list_by",
                self.backend.list_by(index, order_bys),
            )
            .await;
        }

        let key = self.keys().index_key(index);
        match self.store.get::<IndexEntry<T::Id>>(&key).await? {
            Cached::Absent => return Ok(Vec::new()),
            Cached::Hit(IndexEntry::All(ids)) => {
                let mut rows = self.list(&ids).await?;
                if rows.len() == ids.len() && rows.iter().all(|row| self.indexed_by(row, &key)) {
                    debug!("Index hit: {}", key);
                    sort_rows(&mut rows, order_bys)?;
                    return Ok(rows);
                }
                debug!("Index entry {} is stale", key);
            }
            Cached::Hit(IndexEntry::One(_)) | Cached::Miss => debug!("Index miss: {}", key),
        }

        let rows = within(
            self.op_timeout,
            "backend list_by",
            self.backend.list_by(index, order_bys),
        )
        .await?;

        let mut ids = Vec::with_capacity(rows.len());
        let mut bodies = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(id) = row.id() {
                bodies.push((self.keys().primary_key(&id), row.clone()));
                ids.push(id);
            }
        }
        self.store.batch_set(&bodies).await?;
        if ids.len() == rows.len() && rows.iter().all(|row| self.indexed_by(row, &key)) {
            self.store.set(&key, &IndexEntry::All(ids)).await?;
        }
        Ok(rows)
    }

    // == Writes ==
    async fn invalidate_after_write(&self, affected: u64, keys: &[String]) -> Result<()> {
        debug!("Invalidating {} keys", keys.len());
        self.store.invalidate(keys).await.map_err(|err| {
            warn!(
                "Invalidation failed after a successful write, {} keys may be stale: {}",
                keys.len(),
                err
            );
            CacheError::stale(affected, err)
        })
    }

    /// Inserts `entity`, letting the backend assign an ID if it has none.
    ///
    /// Clears any cached absence for the new entity's primary and index keys.
    pub async fn create(&self, entity: &mut T) -> Result<()> {
        within(self.op_timeout, "backend create", self.backend.create(entity)).await?;
        let keys = self.invalidator.keys_for(entity);
        self.invalidate_after_write(1, &keys).await
    }

    /// Upsert by presence: creates when the ID is unset or unknown, otherwise
    /// replaces the row and invalidates its previous and current keys.
    pub async fn save(&self, entity: &mut T) -> Result<()> {
        let Some(id) = entity.id() else {
            return self.create(entity).await;
        };
        let Some(previous) = self.get(&id).await? else {
            return self.create(entity).await;
        };

        within(self.op_timeout, "backend save", self.backend.save(entity)).await?;
        let keys = self
            .invalidator
            .keys_for_change(Some(&previous), Some(&*entity));
        self.invalidate_after_write(1, &keys).await
    }

    /// Applies a partial field map. Returns matched rows.
    ///
    /// The entity is read before and after the write so that both its old
    /// and new index keys are invalidated.
    pub async fn update(&self, id: &T::Id, fields: &Fields) -> Result<u64> {
        let before = within(self.op_timeout, "backend get", self.backend.get(id)).await?;
        let affected =
            within(self.op_timeout, "backend update", self.backend.update(id, fields)).await?;
        if affected == 0 {
            return Ok(0);
        }

        let primary = self.keys().primary_key(id);
        let after = match within(self.op_timeout, "backend get", self.backend.get(id)).await {
            Ok(after) => after,
            Err(err) => {
                // New index values are unknown; purge what we can.
                let mut keys = vec![primary];
                keys.extend(self.invalidator.keys_for_change(before.as_ref(), None));
                let keys = dedupe(keys);
                warn!("Post-update read of {} failed: {}", id, err);
                self.store.invalidate(&keys).await.ok();
                return Err(CacheError::stale(affected, err));
            }
        };

        let mut keys = vec![primary];
        keys.extend(
            self.invalidator
                .keys_for_change(before.as_ref(), after.as_ref()),
        );
        self.invalidate_after_write(affected, &dedupe(keys)).await?;
        Ok(affected)
    }

    /// Deletes rows by ID. Returns deleted rows.
    ///
    /// The rows are read first: their index keys cannot be derived once gone.
    pub async fn delete(&self, ids: &[T::Id]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let doomed = within(self.op_timeout, "backend list", self.backend.list(ids)).await?;
        let affected = within(self.op_timeout, "backend delete", self.backend.delete(ids)).await?;

        let keys = self.invalidator.keys_for_all(&doomed);
        self.invalidate_after_write(affected, &keys).await?;
        Ok(affected)
    }

    /// Purges the primary key of `id` (if given) and the keys of `indexes`.
    pub async fn clear_cache(&self, id: Option<&T::Id>, indexes: &Indexes) -> Result<()> {
        let keys = self.invalidator.keys_for_parts(id, indexes);
        self.store.invalidate(&keys).await
    }

    pub async fn close(&self) -> Result<()> {
        self.backend.close().await
    }
}

/// Stable in-process sort by the JSON form of each row.
fn sort_rows<T: Serialize>(rows: &mut Vec<T>, order_bys: &[OrderBy]) -> Result<()> {
    if order_bys.is_empty() || rows.len() < 2 {
        return Ok(());
    }
    let mut keyed = rows
        .drain(..)
        .map(|row| Ok((serde_json::to_value(&row)?, row)))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by(|(a, _), (b, _)| compare_by(a, b, order_bys));
    rows.extend(keyed.into_iter().map(|(_, row)| row));
    Ok(())
}
