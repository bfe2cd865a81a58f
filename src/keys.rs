//! Cache key derivation
//!
//! Keys are slash-delimited and lowercased:
//! `{prefix}/{table}/{field}/{value}` per entity or index,
//! `{prefix}/{table}/full` for a whole collection.

use std::fmt::Display;

use crate::config::CacheConfig;
use crate::models::{render_value, Index};

/// Key namespace for one table.
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
    table: String,
    id_field: String,
}

impl KeySpace {
    pub fn new(
        prefix: impl Into<String>,
        table: impl Into<String>,
        id_field: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            table: table.into(),
            id_field: id_field.into(),
        }
    }

    /// Key namespace under the configured prefix.
    pub fn from_config(
        config: &CacheConfig,
        table: impl Into<String>,
        id_field: impl Into<String>,
    ) -> Self {
        Self::new(config.prefix.clone(), table, id_field)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Key of the entry holding the entity body.
    pub fn primary_key(&self, id: &impl Display) -> String {
        format!("{}/{}/{}/{}", self.prefix, self.table, self.id_field, id).to_lowercase()
    }

    /// Key of the entry for one secondary index.
    pub fn index_key(&self, index: &Index) -> String {
        let mut key = format!("{}/{}", self.prefix, self.table);
        for (field, value) in index.fields() {
            key.push('/');
            key.push_str(field);
            key.push('/');
            key.push_str(&render_value(value));
        }
        key.to_lowercase()
    }

    /// Key of the hash holding a whole collection.
    pub fn full_key(&self) -> String {
        collection_key(&self.prefix, &self.table)
    }
}

/// Key of the hash holding the whole of `table`.
pub fn collection_key(prefix: &str, table: &str) -> String {
    format!("{}/{}/full", prefix, table).to_lowercase()
}
