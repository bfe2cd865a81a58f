//! Cache Store Module
//!
//! In-process key space with string and hash values and lazy TTL expiration.
//! Expired entries are dropped when touched; nothing sweeps in the background.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::cache::entry::{CacheEntry, Slot};
use crate::cache::{CacheStats, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Key space backing [`MemoryCache`](crate::cache::MemoryCache).
#[derive(Debug, Default)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Performance statistics
    stats: CacheStats,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    // == Validation ==
    fn validate(key: &str, value: &Slot) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        if value.size() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }
        Ok(())
    }

    /// Returns the live entry for `key`, dropping it first if expired.
    fn live(&mut self, key: &str) -> Option<&mut CacheEntry> {
        if self.entries.get(key).is_some_and(CacheEntry::is_expired) {
            self.entries.remove(key);
            self.stats.record_expirations(1);
        }
        self.entries.get_mut(key)
    }

    fn wrong_type(key: &str) -> CacheError {
        CacheError::Store(format!(
            "WRONGTYPE operation against key '{}' holding the wrong kind of value",
            key
        ))
    }

    // == Strings ==
    /// Retrieves a string value. Missing and expired keys are `None`.
    pub fn get(&mut self, key: &str) -> Result<Option<String>> {
        let value = match self.live(key) {
            Some(entry) => match &entry.value {
                Slot::Text(s) => Some(s.clone()),
                Slot::Hash(_) => return Err(Self::wrong_type(key)),
            },
            None => None,
        };
        self.stats.record_read(value.is_some());
        Ok(value)
    }

    /// Stores a string value, overwriting any previous value and TTL.
    pub fn set(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let slot = Slot::Text(value.to_string());
        Self::validate(key, &slot)?;
        self.entries
            .insert(key.to_string(), CacheEntry::new(slot, ttl));
        Ok(())
    }

    // == Key Operations ==
    /// Applies a TTL to an existing key. Returns false if the key is absent.
    pub fn expire(&mut self, key: &str, ttl: Duration) -> bool {
        match self.live(key) {
            Some(entry) => {
                entry.expire_in(ttl);
                true
            }
            None => false,
        }
    }

    /// Removes keys; returns how many existed.
    pub fn delete(&mut self, keys: &[String]) -> usize {
        keys.iter()
            .filter(|key| match self.entries.remove(key.as_str()) {
                Some(entry) => !entry.is_expired(),
                None => false,
            })
            .count()
    }

    pub fn exists(&mut self, key: &str) -> bool {
        self.live(key).is_some()
    }

    /// Remaining TTL of a live key; `Some(None)` when it never expires.
    pub fn ttl_remaining(&mut self, key: &str) -> Option<Option<Duration>> {
        self.live(key).map(|entry| entry.ttl_remaining())
    }

    // == Hashes ==
    fn hash_mut(&mut self, key: &str) -> Result<Option<&mut BTreeMap<String, String>>> {
        match self.live(key) {
            Some(CacheEntry {
                value: Slot::Hash(map),
                ..
            }) => Ok(Some(map)),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(None),
        }
    }

    /// Writes hash fields, creating the hash (without expiry) if needed.
    /// An existing hash keeps its TTL.
    pub fn hset(&mut self, key: &str, fields: &[(String, String)]) -> Result<()> {
        match self.hash_mut(key)? {
            Some(map) => {
                for (field, value) in fields {
                    map.insert(field.clone(), value.clone());
                }
            }
            None => {
                if fields.is_empty() {
                    return Ok(());
                }
                let map: BTreeMap<String, String> = fields.iter().cloned().collect();
                let slot = Slot::Hash(map);
                Self::validate(key, &slot)?;
                self.entries.insert(key.to_string(), CacheEntry::new(slot, None));
            }
        }
        Ok(())
    }

    pub fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>> {
        let value = self
            .hash_mut(key)?
            .and_then(|map| map.get(field).cloned());
        self.stats.record_field_read(value.is_some());
        Ok(value)
    }

    pub fn hmget(&mut self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>> {
        let values: Vec<Option<String>> = match self.hash_mut(key)? {
            Some(map) => fields.iter().map(|f| map.get(f).cloned()).collect(),
            None => vec![None; fields.len()],
        };
        for value in &values {
            self.stats.record_field_read(value.is_some());
        }
        Ok(values)
    }

    /// Removes hash fields; the hash itself disappears once empty.
    pub fn hdel(&mut self, key: &str, fields: &[String]) -> Result<usize> {
        let (removed, now_empty) = match self.hash_mut(key)? {
            Some(map) => {
                let removed = fields.iter().filter(|f| map.remove(*f).is_some()).count();
                (removed, map.is_empty())
            }
            None => return Ok(0),
        };
        if now_empty {
            self.entries.remove(key);
        }
        Ok(removed)
    }

    pub fn hgetall(&mut self, key: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .hash_mut(key)?
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    /// Replaces whatever `key` holds with a fresh hash and TTL.
    /// An empty field list leaves the key absent.
    pub fn replace_hash(
        &mut self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<()> {
        let slot = Slot::Hash(fields.iter().cloned().collect());
        Self::validate(key, &slot)?;
        self.entries.remove(key);
        if !fields.is_empty() {
            self.entries
                .insert(key.to_string(), CacheEntry::new(slot, Some(ttl)));
        }
        Ok(())
    }

    // == Maintenance ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            ..self.stats
        }
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn purge_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let count = before - self.entries.len();
        self.stats.record_expirations(count);
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
