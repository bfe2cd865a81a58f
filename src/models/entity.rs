//! Entity identity
//!
//! The capability every cached type must provide: an optional ID and the
//! set of indexes it is discoverable by.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{Index, Indexes};

/// Types usable as entity identifiers.
pub trait EntityId:
    Clone + Eq + Ord + Hash + Display + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> EntityId for T where
    T: Clone + Eq + Ord + Hash + Display + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// A cacheable entity.
///
/// # Implementation Requirements
///
/// - `id()` returns `None` until an ID has been assigned; an assigned ID is
///   never represented by an empty or zero value
/// - `indexes()` must be a pure function of the entity's current fields
/// - the primary key is implied and must not be listed in `indexes()`
/// - `index_shapes()` lists the field names of every index `indexes()` can
///   produce, in the same order
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Id: EntityId;

    /// The assigned ID, or None if not yet assigned.
    fn id(&self) -> Option<Self::Id>;

    /// Stores an ID assigned by the backend adapter.
    fn set_id(&mut self, id: Self::Id);

    /// Secondary indexes this entity should be reachable through.
    fn indexes(&self) -> Indexes;

    /// Field-name shapes of the declared indexes.
    ///
    /// Only lookups with one of these shapes are cached: writes invalidate
    /// declared index keys and nothing else. The default declares none, so
    /// every `get_by`/`list_by` reaches the backend.
    fn index_shapes() -> &'static [&'static [&'static str]] {
        &[]
    }

    /// Whether `index` is one of the declared lookup paths.
    fn declares(index: &Index) -> bool {
        Self::index_shapes()
            .iter()
            .any(|shape| index.has_shape(shape))
    }
}

/// ID types an in-process adapter can mint on its own.
pub trait GenerateId: EntityId {
    fn generate() -> Self;
}

impl GenerateId for uuid::Uuid {
    fn generate() -> Self {
        uuid::Uuid::now_v7()
    }
}

impl GenerateId for String {
    fn generate() -> Self {
        uuid::Uuid::now_v7().simple().to_string()
    }
}
