//! Index-aware invalidation
//!
//! Works out which cache keys go stale when an entity is written. The set
//! always covers the primary key plus every index the entity declared
//! before and after the write.

use crate::keys::KeySpace;
use crate::models::{Entity, Indexes};

/// Derives invalidation key sets for one table.
#[derive(Debug, Clone)]
pub struct IndexInvalidator {
    keys: KeySpace,
}

impl IndexInvalidator {
    pub fn new(keys: KeySpace) -> Self {
        Self { keys }
    }

    pub fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    /// Keys for an explicit ID and index set, duplicates dropped.
    pub fn keys_for_parts<I: std::fmt::Display>(
        &self,
        id: Option<&I>,
        indexes: &Indexes,
    ) -> Vec<String> {
        let mut keys = Vec::with_capacity(indexes.len() + 1);
        if let Some(id) = id {
            keys.push(self.keys.primary_key(id));
        }
        for index in indexes {
            keys.push(self.keys.index_key(index));
        }
        dedupe(keys)
    }

    /// `{primary(e)} ∪ {key(i) : i ∈ e.indexes()}`
    pub fn keys_for<T: Entity>(&self, entity: &T) -> Vec<String> {
        self.keys_for_parts(entity.id().as_ref(), &entity.indexes())
    }

    /// Keys for an entity that changed from `old` to `new`.
    ///
    /// Either side may be missing (row absent before or after the write).
    pub fn keys_for_change<T: Entity>(&self, old: Option<&T>, new: Option<&T>) -> Vec<String> {
        let mut keys = Vec::new();
        for entity in [old, new].into_iter().flatten() {
            keys.extend(self.keys_for(entity));
        }
        dedupe(keys)
    }

    /// Keys for a batch of entities.
    pub fn keys_for_all<'a, T: Entity>(&self, entities: impl IntoIterator<Item = &'a T>) -> Vec<String> {
        let keys = entities
            .into_iter()
            .flat_map(|entity| self.keys_for(entity))
            .collect();
        dedupe(keys)
    }
}

/// Removes duplicates, keeping first-seen order.
pub(crate) fn dedupe(keys: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(keys.len());
    keys.into_iter()
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Index;
    use serde::{Deserialize, Serialize};
    use std::collections::HashSet;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Tagged {
        id: Option<String>,
        tags: Vec<String>,
    }

    impl Entity for Tagged {
        type Id = String;

        fn id(&self) -> Option<String> {
            self.id.clone()
        }

        fn set_id(&mut self, id: String) {
            self.id = Some(id);
        }

        fn indexes(&self) -> Indexes {
            self.tags.iter().map(|t| Index::new("tag", t.as_str())).collect()
        }
    }

    fn tagged(id: &str, tags: &[&str]) -> Tagged {
        Tagged {
            id: Some(id.to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn invalidator() -> IndexInvalidator {
        IndexInvalidator::new(KeySpace::new("p", "t", "id"))
    }

    fn as_set(keys: Vec<String>) -> HashSet<String> {
        keys.into_iter().collect()
    }

    #[test]
    fn test_keys_for_entity() {
        let keys = invalidator().keys_for(&tagged("e1", &["a", "b"]));
        assert_eq!(keys, vec!["p/t/id/e1", "p/t/tag/a", "p/t/tag/b"]);
    }

    #[test]
    fn test_unassigned_id_contributes_no_primary_key() {
        let mut entity = tagged("x", &["a"]);
        entity.id = None;
        assert_eq!(invalidator().keys_for(&entity), vec!["p/t/tag/a"]);
    }

    #[test]
    fn test_update_invalidates_exact_union() {
        let old = tagged("e1", &["i1", "i2"]);
        let new = tagged("e1", &["i2", "i3"]);

        let keys = invalidator().keys_for_change(Some(&old), Some(&new));
        assert_eq!(keys.len(), 4);
        assert_eq!(
            as_set(keys),
            as_set(vec![
                "p/t/id/e1".to_string(),
                "p/t/tag/i1".to_string(),
                "p/t/tag/i2".to_string(),
                "p/t/tag/i3".to_string(),
            ])
        );
    }

    #[test]
    fn test_change_with_missing_side() {
        let old = tagged("e1", &["a"]);
        let keys = invalidator().keys_for_change(Some(&old), None);
        assert_eq!(keys, vec!["p/t/id/e1", "p/t/tag/a"]);
        assert!(invalidator()
            .keys_for_change::<Tagged>(None, None)
            .is_empty());
    }

    #[test]
    fn test_keys_for_all_dedupes_shared_indexes() {
        let a = tagged("a", &["shared"]);
        let b = tagged("b", &["shared"]);
        let keys = invalidator().keys_for_all([&a, &b]);
        assert_eq!(keys, vec!["p/t/id/a", "p/t/tag/shared", "p/t/id/b"]);
    }

    #[test]
    fn test_case_variants_collapse_to_one_key() {
        let keys = invalidator().keys_for(&tagged("E1", &["Red", "red"]));
        assert_eq!(keys, vec!["p/t/id/e1", "p/t/tag/red"]);
    }
}
