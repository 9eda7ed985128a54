//! SQLite cache backend for persistent storage.

use super::{CacheEntry, CacheStats, EvidenceCache};
use crate::error::CacheError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed persistent cache
///
/// Reports are stored as JSON. Uses WAL (Write-Ahead Logging) mode so
/// readers proceed while a write is in progress.
pub struct SqliteCache {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteCache {
    /// Open or create a cache database at the given path
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| CacheError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS reports (
                content_key TEXT PRIMARY KEY,
                report TEXT NOT NULL,
                cached_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_expires_at ON reports(expires_at)",
            [],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    /// Platform cache location, e.g. `~/.cache/image-provenance/evidence.db`
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("image-provenance")
            .join("evidence.db")
    }

    /// Open the cache at [`SqliteCache::default_path`]
    pub fn open_default() -> Result<Self, CacheError> {
        Self::open(&Self::default_path())
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::Corrupted {
            path: self.db_path.clone(),
        })
    }

    fn timestamp(&self, millis: i64) -> Result<DateTime<Utc>, CacheError> {
        DateTime::from_timestamp_millis(millis).ok_or_else(|| CacheError::Corrupted {
            path: self.db_path.clone(),
        })
    }
}

impl EvidenceCache for SqliteCache {
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError> {
        let conn = self.lock()?;

        let result = conn.query_row(
            "SELECT report, cached_at, expires_at FROM reports
             WHERE content_key = ? AND expires_at > ?",
            params![key, now.timestamp_millis()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        );

        let (json, cached_at, expires_at) = match result {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(CacheError::QueryFailed(e.to_string())),
        };

        let report = serde_json::from_str(&json).map_err(|_| CacheError::Corrupted {
            path: self.db_path.clone(),
        })?;

        Ok(Some(CacheEntry {
            key: key.to_string(),
            report,
            cached_at: self.timestamp(cached_at)?,
            expires_at: self.timestamp(expires_at)?,
        }))
    }

    fn set(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let json = serde_json::to_string(&entry.report)
            .map_err(|e| CacheError::SerializationFailed(e.to_string()))?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO reports (content_key, report, cached_at, expires_at)
             VALUES (?, ?, ?, ?)",
            params![
                entry.key,
                json,
                entry.cached_at.timestamp_millis(),
                entry.expires_at.timestamp_millis(),
            ],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM reports WHERE content_key = ?", [key])
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM reports", [])
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let conn = self.lock()?;

        let (total_entries, total_size_bytes, oldest, newest) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(LENGTH(report)), 0), MIN(cached_at), MAX(cached_at)
                 FROM reports",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)? as usize,
                        row.get::<_, i64>(1)? as u64,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                    ))
                },
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(CacheStats {
            total_entries,
            total_size_bytes,
            oldest_entry: oldest.and_then(DateTime::from_timestamp_millis),
            newest_entry: newest.and_then(DateTime::from_timestamp_millis),
        })
    }

    fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM reports WHERE expires_at <= ?",
            [now.timestamp_millis()],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::test_support::entry;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, SqliteCache) {
        let temp_dir = TempDir::new().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("nested").join("cache.db")).unwrap();
        (temp_dir, cache)
    }

    #[test]
    fn sqlite_cache_creates_database() {
        let (_dir, cache) = open_temp();

        assert!(cache.path().exists());
        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn sqlite_cache_stores_and_retrieves() {
        let (_dir, cache) = open_temp();
        let stored = entry("deadbeef");
        let expected = stored.report.clone();

        cache.set(stored).unwrap();
        let hit = cache.get("deadbeef", Utc::now()).unwrap().unwrap();

        assert_eq!(hit.report.request_id, expected.request_id);
        assert_eq!(hit.report.content_key, "deadbeef");
        assert_eq!(hit.report.query_fingerprint.phash, expected.query_fingerprint.phash);
        assert_eq!(hit.report.evidence.suspicious_flags, expected.evidence.suspicious_flags);
    }

    #[test]
    fn sqlite_cache_hides_expired_entries() {
        let (_dir, cache) = open_temp();
        let stored = entry("k");
        let after = stored.expires_at + chrono::Duration::minutes(1);
        cache.set(stored).unwrap();

        assert!(cache.get("k", after).unwrap().is_none());
        assert_eq!(cache.prune_expired(after).unwrap(), 1);
        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn sqlite_cache_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.db");

        SqliteCache::open(&path).unwrap().set(entry("persisted")).unwrap();
        let reopened = SqliteCache::open(&path).unwrap();

        assert!(reopened.get("persisted", Utc::now()).unwrap().is_some());
    }

    #[test]
    fn sqlite_cache_clears_all() {
        let (_dir, cache) = open_temp();
        cache.set(entry("a")).unwrap();
        cache.set(entry("b")).unwrap();
        cache.remove("a").unwrap();
        assert_eq!(cache.stats().unwrap().total_entries, 1);

        cache.clear().unwrap();

        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn default_path_is_under_cache_dir() {
        let path = SqliteCache::default_path();
        assert!(path.ends_with("image-provenance/evidence.db"));
    }
}
