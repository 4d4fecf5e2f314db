//! SQLite package cache
//!
//! Features:
//! - Stores index entries together with their archives
//! - Acts as a feed, consulted before any remote feed
//! - WAL mode, auto-recovery on corruption

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::config::EndpointKind;
use crate::endpoint::{CacheStore, PackageFeed};
use crate::error::{RepoError, Result};
use crate::index::{PackageEntry, compute_digest};

const CACHE_NAME: &str = "cache";

/// SQLite cache of downloaded packages
pub struct PackageCache {
    conn: Mutex<Connection>,
    locator: String,
}

impl PackageCache {
    /// Open or create cache at default location
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open_at(&path)
    }

    /// Open or create cache at specific path
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = match Self::connect(path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Cache corrupted, recreating: {}", e);
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
                Self::connect(path)?
            }
        };

        Ok(Self {
            conn: Mutex::new(conn),
            locator: path.display().to_string(),
        })
    }

    /// Open in-memory cache (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            locator: ":memory:".to_string(),
        })
    }

    /// Get default cache path
    pub fn default_path() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir().ok_or_else(|| RepoError::CacheError {
            message: "Could not determine cache directory".to_string(),
        })?;
        Ok(cache_dir.join("pkgmirror").join("packages.db"))
    }

    fn connect(path: &Path) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        init(&conn)?;
        Ok(conn)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepoError::CacheError {
            message: "cache connection lock poisoned".to_string(),
        })
    }

    /// Number of cached packages
    pub fn len(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM packages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn init(conn: &Connection) -> Result<()> {
    // In-memory databases answer "memory" instead of "wal"
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS packages (
            id TEXT NOT NULL,
            version TEXT NOT NULL,
            entry TEXT NOT NULL,
            payload BLOB NOT NULL,
            digest TEXT NOT NULL,
            cached_at INTEGER NOT NULL,
            PRIMARY KEY (id, version)
        );
        "#,
    )?;
    Ok(())
}

#[async_trait]
impl PackageFeed for PackageCache {
    fn name(&self) -> &str {
        CACHE_NAME
    }

    fn locator(&self) -> &str {
        &self.locator
    }

    fn kind(&self) -> EndpointKind {
        EndpointKind::Local
    }

    async fn entries(&self, id: &str) -> Result<Vec<PackageEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT entry FROM packages WHERE id = ?1 ORDER BY cached_at")?;
        let rows = stmt.query_map([id], |row| row.get::<_, String>(0))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(serde_json::from_str(&row?)?);
        }
        Ok(entries)
    }

    async fn download(&self, entry: &PackageEntry) -> Result<Vec<u8>> {
        let identity = entry.identity()?;
        let conn = self.conn()?;
        let payload: Option<Vec<u8>> = conn
            .query_row(
                "SELECT payload FROM packages WHERE id = ?1 AND version = ?2",
                params![identity.id, identity.version.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        payload.ok_or_else(|| RepoError::PackageNotFound {
            id: identity.to_string(),
            endpoint: CACHE_NAME.to_string(),
        })
    }
}

#[async_trait]
impl CacheStore for PackageCache {
    async fn store(&self, entry: &PackageEntry, payload: &[u8]) -> Result<()> {
        let identity = entry.identity()?;
        let digest = compute_digest(payload);

        let mut cached = entry.clone();
        cached.version = identity.version.to_string();
        cached.digest = Some(digest.clone());
        let json = serde_json::to_string(&cached)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO packages (id, version, entry, payload, digest, cached_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id, version) DO UPDATE SET
                entry = excluded.entry,
                payload = excluded.payload,
                digest = excluded.digest,
                cached_at = excluded.cached_at
            "#,
            params![
                identity.id,
                cached.version,
                json,
                payload,
                digest,
                Utc::now().timestamp()
            ],
        )?;
        tracing::debug!("Cached {}", identity);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgmirror_core::PackageIdentity;

    fn entry(id: &str, version: &str) -> PackageEntry {
        let mut entry = PackageEntry::new(&PackageIdentity::parse(id, version).unwrap());
        entry.urls.push(format!("{}-{}.tgz", id, version));
        entry
    }

    #[tokio::test]
    async fn test_store_and_read_back() {
        let cache = PackageCache::open_memory().unwrap();
        assert!(cache.is_empty().unwrap());

        cache.store(&entry("Foo", "1.0.0"), b"payload").await.unwrap();
        assert_eq!(cache.len().unwrap(), 1);

        let entries = cache.entries("Foo").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].digest.as_deref(), Some(compute_digest(b"payload").as_str()));

        let payload = cache.download(&entries[0]).await.unwrap();
        assert_eq!(payload, b"payload");
    }

    #[tokio::test]
    async fn test_store_replaces_existing() {
        let cache = PackageCache::open_memory().unwrap();
        cache.store(&entry("Foo", "1.0.0"), b"old").await.unwrap();
        cache.store(&entry("Foo", "1.0"), b"new").await.unwrap();

        assert_eq!(cache.len().unwrap(), 1);
        let identity = PackageIdentity::parse("Foo", "1.0.0").unwrap();
        let found = cache.find(&identity).await.unwrap().unwrap();
        assert_eq!(cache.download(&found).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_download_miss() {
        let cache = PackageCache::open_memory().unwrap();
        assert!(matches!(
            cache.download(&entry("Foo", "1.0.0")).await,
            Err(RepoError::PackageNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_at_recovers_from_corruption() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("packages.db");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"this is not a sqlite database at all, not even close").unwrap();

        let cache = PackageCache::open_at(&path).unwrap();
        cache.store(&entry("Foo", "1.0.0"), b"payload").await.unwrap();
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_persists_across_opens() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("packages.db");

        {
            let cache = PackageCache::open_at(&path).unwrap();
            cache.store(&entry("Foo", "1.0.0"), b"payload").await.unwrap();
        }

        let reopened = PackageCache::open_at(&path).unwrap();
        assert_eq!(reopened.entries("Foo").await.unwrap().len(), 1);
    }
}
