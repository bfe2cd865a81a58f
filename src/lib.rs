//! Cachelayer - A cache-aside layer over arbitrary backing stores
//!
//! Keeps a key-value cache consistent with a backend that supports primary
//! key and secondary-index lookups: read-through caching, negative caching,
//! index-aware invalidation on writes, and whole-collection snapshots for
//! small tables.

pub mod backend;
pub mod cache;
pub mod codec;
pub mod config;
pub mod coordinator;
mod deadline;
pub mod error;
pub mod hashed;
pub mod invalidator;
pub mod keyed;
pub mod keys;
pub mod models;

pub use backend::{Backend, MemoryBackend};
pub use cache::{CacheClient, MemoryCache};
pub use codec::{Codec, JsonCodec};
pub use config::CacheConfig;
pub use coordinator::{CacheCoordinator, IndexEntry};
pub use error::{CacheError, Result};
pub use hashed::HashedCollectionStore;
pub use invalidator::IndexInvalidator;
pub use keyed::{BatchGet, Cached, KeyedStore};
pub use keys::KeySpace;
pub use models::{Entity, EntityId, Fields, GenerateId, Index, Indexes, OrderBy, OrderBys};
