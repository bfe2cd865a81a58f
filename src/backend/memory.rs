//! In-process backend adapter
//!
//! Rows live in a `BTreeMap` keyed by ID. Index matching and ordering work
//! on each entity's JSON form, so any serde entity can be stored without
//! extra glue.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::backend::Backend;
use crate::error::{CacheError, Result};
use crate::models::{compare_by, Entity, Fields, GenerateId, Index, OrderBy};

/// Reference [`Backend`] holding rows in memory.
pub struct MemoryBackend<T: Entity> {
    rows: RwLock<BTreeMap<T::Id, T>>,
    reads: AtomicU64,
    writes: AtomicU64,
    fail_writes: AtomicBool,
    closed: AtomicBool,
}

impl<T: Entity> Default for MemoryBackend<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            fail_writes: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }
}

impl<T: Entity> MemoryBackend<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of read calls served so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write calls accepted so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every subsequent write fail with a backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Inserts or replaces a row directly, bypassing counters and failures.
    pub async fn seed(&self, entity: T) -> Result<()> {
        let id = entity
            .id()
            .ok_or_else(|| CacheError::InvalidRequest("seeded entity has no id".to_string()))?;
        self.rows.write().await.insert(id, entity);
        Ok(())
    }

    fn begin_read(&self) -> Result<()> {
        self.ensure_open()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn begin_write(&self) -> Result<()> {
        self.ensure_open()?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Backend("write rejected".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Backend("backend is closed".to_string()));
        }
        Ok(())
    }
}

/// Entities paired with their JSON form, for matching and sorting.
fn documents<'a, T: Entity>(rows: impl Iterator<Item = &'a T>) -> Result<Vec<(Value, T)>> {
    rows.map(|row| Ok((serde_json::to_value(row)?, row.clone())))
        .collect()
}

/// Writes `value` at a dotted path, creating intermediate objects as needed.
/// Array segments must address an existing element.
pub(crate) fn set_path(doc: &mut Value, path: &str, value: Value) -> Result<()> {
    let invalid = || CacheError::InvalidRequest(format!("cannot update path '{}'", path));
    let mut segments = path.split('.').peekable();
    let mut current = doc;

    while let Some(segment) = segments.next() {
        if segment.is_empty() {
            return Err(invalid());
        }
        let last = segments.peek().is_none();
        current = match current {
            Value::Object(map) => {
                if last {
                    map.insert(segment.to_string(), value);
                    return Ok(());
                }
                map.entry(segment.to_string())
                    .or_insert_with(|| Value::Object(serde_json::Map::new()))
            }
            Value::Array(items) => {
                let slot = segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or_else(invalid)?;
                if last {
                    *slot = value;
                    return Ok(());
                }
                slot
            }
            _ => return Err(invalid()),
        };
    }
    Err(invalid())
}

#[async_trait]
impl<T> Backend<T> for MemoryBackend<T>
where
    T: Entity,
    T::Id: GenerateId,
{
    async fn get(&self, id: &T::Id) -> Result<Option<T>> {
        self.begin_read()?;
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn list(&self, ids: &[T::Id]) -> Result<Vec<T>> {
        self.begin_read()?;
        let rows = self.rows.read().await;
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| rows.get(id).cloned())
            .collect())
    }

    async fn get_by(&self, index: &Index) -> Result<Option<T>> {
        self.begin_read()?;
        let rows = self.rows.read().await;
        for row in rows.values() {
            if index.matches(&serde_json::to_value(row)?) {
                return Ok(Some(row.clone()));
            }
        }
        Ok(None)
    }

    async fn list_by(&self, index: &Index, order_bys: &[OrderBy]) -> Result<Vec<T>> {
        self.begin_read()?;
        let rows = self.rows.read().await;
        let mut docs: Vec<(Value, T)> = documents(rows.values())?
            .into_iter()
            .filter(|(doc, _)| index.matches(doc))
            .collect();
        docs.sort_by(|(a, _), (b, _)| compare_by(a, b, order_bys));
        Ok(docs.into_iter().map(|(_, row)| row).collect())
    }

    async fn list_all(&self) -> Result<Vec<T>> {
        self.begin_read()?;
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn create(&self, entity: &mut T) -> Result<()> {
        self.begin_write()?;
        let id = match entity.id() {
            Some(id) => id,
            None => {
                let id = T::Id::generate();
                entity.set_id(id.clone());
                id
            }
        };

        let mut rows = self.rows.write().await;
        if rows.contains_key(&id) {
            return Err(CacheError::Backend(format!("duplicate key '{}'", id)));
        }
        rows.insert(id, entity.clone());
        Ok(())
    }

    async fn save(&self, entity: &T) -> Result<()> {
        self.begin_write()?;
        let id = entity
            .id()
            .ok_or_else(|| CacheError::InvalidRequest("save requires an assigned id".to_string()))?;
        self.rows.write().await.insert(id, entity.clone());
        Ok(())
    }

    async fn update(&self, id: &T::Id, fields: &Fields) -> Result<u64> {
        self.begin_write()?;
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get(id) else {
            return Ok(0);
        };

        let mut doc = serde_json::to_value(row)?;
        for (path, value) in fields {
            set_path(&mut doc, path, value.clone())?;
        }
        let updated: T = serde_json::from_value(doc)?;
        if updated.id().as_ref() != Some(id) {
            return Err(CacheError::InvalidRequest(
                "the primary key cannot be updated".to_string(),
            ));
        }
        rows.insert(id.clone(), updated);
        Ok(1)
    }

    async fn delete(&self, ids: &[T::Id]) -> Result<u64> {
        self.begin_write()?;
        let mut rows = self.rows.write().await;
        Ok(ids.iter().filter(|id| rows.remove(*id).is_some()).count() as u64)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
