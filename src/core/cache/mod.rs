//! # Cache Module
//!
//! Stores finished [`SearchReport`]s by image content so a repeated query
//! skips fingerprinting, backend fan-out and candidate downloads.
//!
//! ## Keys and Expiry
//! - Key: hex XXH3-128 of the raw query bytes ([`content_key`])
//! - Entries expire after a TTL (24 hours by default); expired entries are
//!   never returned and can be purged with `prune_expired`
//!
//! Two concurrent identical requests may both compute and store; the last
//! write wins.
//!
//! ## Backends
//! - `SqliteCache` - Persistent storage using SQLite
//! - `InMemoryCache` - For testing and single-process use

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryCache;
pub use sqlite::SqliteCache;
pub use traits::EvidenceCache;

use crate::core::pipeline::SearchReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use xxhash_rust::xxh3::xxh3_128;

/// Default time-to-live of a cached report
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache key for a query image
pub fn content_key(bytes: &[u8]) -> String {
    format!("{:032x}", xxh3_128(bytes))
}

/// A cached report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Content key of the query image
    pub key: String,
    pub report: SearchReport,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Entry cached now and valid for `ttl`
    pub fn new(key: impl Into<String>, report: SearchReport, ttl: Duration) -> Self {
        let cached_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            key: key.into(),
            report,
            cached_at,
            expires_at: cached_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Check if this entry may still be served at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of entries, expired ones included
    pub total_entries: usize,
    /// Total size of the serialized reports in bytes
    pub total_size_bytes: u64,
    /// Oldest entry timestamp
    pub oldest_entry: Option<DateTime<Utc>>,
    /// Newest entry timestamp
    pub newest_entry: Option<DateTime<Utc>>,
}
