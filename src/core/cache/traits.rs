//! Cache backend trait definition.

use super::{CacheEntry, CacheStats};
use crate::error::CacheError;
use chrono::{DateTime, Utc};

/// Trait for evidence cache backends
pub trait EvidenceCache: Send + Sync {
    /// Get a cached report if one exists and has not expired at `now`
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError>;

    /// Store a report, replacing any previous entry for the key
    fn set(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Remove a specific entry
    fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Clear all cached entries
    fn clear(&self) -> Result<(), CacheError>;

    /// Get cache statistics
    fn stats(&self) -> Result<CacheStats, CacheError>;

    /// Remove entries that expired before `now`
    ///
    /// Returns the number of entries removed.
    fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError>;
}
