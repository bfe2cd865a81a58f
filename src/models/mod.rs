//! Data Models Module
//!
//! Entity identity, secondary indexes, ordering and partial-update types.

mod entity;
mod index;

pub use entity::{Entity, EntityId, GenerateId};
pub use index::{
    compare_by, compare_values, lookup_path, render_value, Fields, Index, Indexes, OrderBy,
    OrderBys,
};
