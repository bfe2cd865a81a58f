//! Backend Adapter Module
//!
//! The uniform CRUD contract every storage engine adapter implements, plus
//! an in-process reference adapter.

mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Entity, Fields, Index, OrderBy};

pub use memory::MemoryBackend;

/// Source-of-truth storage for one entity type.
///
/// Not-found is `Ok(None)` / an empty list / a zero count, never an error.
#[async_trait]
pub trait Backend<T: Entity>: Send + Sync {
    async fn get(&self, id: &T::Id) -> Result<Option<T>>;

    /// Entities matching `ids`; missing IDs are skipped.
    async fn list(&self, ids: &[T::Id]) -> Result<Vec<T>>;

    /// One entity matching every field of `index`.
    async fn get_by(&self, index: &Index) -> Result<Option<T>>;

    /// Every entity matching `index`, sorted by `order_bys`.
    async fn list_by(&self, index: &Index, order_bys: &[OrderBy]) -> Result<Vec<T>>;

    async fn list_all(&self) -> Result<Vec<T>>;

    /// Inserts `entity`, assigning an ID first if it has none.
    async fn create(&self, entity: &mut T) -> Result<()>;

    /// Full replace of the row with `entity`'s ID.
    async fn save(&self, entity: &T) -> Result<()>;

    /// Applies a partial field map; returns matched rows.
    async fn update(&self, id: &T::Id, fields: &Fields) -> Result<u64>;

    /// Returns deleted rows.
    async fn delete(&self, ids: &[T::Id]) -> Result<u64>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
impl<T: Entity, B: Backend<T> + ?Sized> Backend<T> for Arc<B> {
    async fn get(&self, id: &T::Id) -> Result<Option<T>> {
        (**self).get(id).await
    }

    async fn list(&self, ids: &[T::Id]) -> Result<Vec<T>> {
        (**self).list(ids).await
    }

    async fn get_by(&self, index: &Index) -> Result<Option<T>> {
        (**self).get_by(index).await
    }

    async fn list_by(&self, index: &Index, order_bys: &[OrderBy]) -> Result<Vec<T>> {
        (**self).list_by(index, order_bys).await
    }

    async fn list_all(&self) -> Result<Vec<T>> {
        (**self).list_all().await
    }

    async fn create(&self, entity: &mut T) -> Result<()> {
        (**self).create(entity).await
    }

    async fn save(&self, entity: &T) -> Result<()> {
        (**self).save(entity).await
    }

    async fn update(&self, id: &T::Id, fields: &Fields) -> Result<u64> {
        (**self).update(id, fields).await
    }

    async fn delete(&self, ids: &[T::Id]) -> Result<u64> {
        (**self).delete(ids).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}
