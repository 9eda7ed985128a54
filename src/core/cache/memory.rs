//! In-memory cache backend.

use super::{CacheEntry, CacheStats, EvidenceCache};
use crate::error::CacheError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// In-memory cache backend
///
/// Useful for testing and scenarios where persistence isn't needed.
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    /// Create a new in-memory cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn poisoned() -> CacheError {
        CacheError::Corrupted {
            path: PathBuf::from("memory"),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceCache for InMemoryCache {
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;

        Ok(entries
            .get(key)
            .filter(|entry| entry.is_valid_at(now))
            .cloned())
    }

    fn set(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.clear();
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;

        let total_size_bytes = entries
            .values()
            .map(|e| serde_json::to_vec(&e.report).map(|v| v.len() as u64))
            .sum::<Result<u64, _>>()
            .map_err(|e| CacheError::SerializationFailed(e.to_string()))?;

        Ok(CacheStats {
            total_entries: entries.len(),
            total_size_bytes,
            oldest_entry: entries.values().map(|e| e.cached_at).min(),
            newest_entry: entries.values().map(|e| e.cached_at).max(),
        })
    }

    fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;

        let before = entries.len();
        entries.retain(|_, entry| entry.is_valid_at(now));
        Ok(before - entries.len())
    }
}
