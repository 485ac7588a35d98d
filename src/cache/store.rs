//! Persistent key-value store with per-entry expiry

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Absent or expired entry
    #[error("cache miss")]
    Miss,
    #[error("cached value is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
    #[error("value cannot be cached: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("cache storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("cache directory error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }
}

/// SQLite-backed cache of serialized values keyed by `(bucket, key)`
#[derive(Debug)]
pub struct CacheStore {
    pool: SqlitePool,
}

impl CacheStore {
    /// Default database location under the user's cache directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".cache").join("honey-cachedb").join("cache.db"))
    }

    /// Open the store at the default location
    pub async fn open_default() -> Result<Self, CacheError> {
        let path = Self::default_path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "home directory not found")
        })?;
        Self::open(path).await
    }

    /// Open or create the store at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    /// Store kept in memory for the lifetime of this value
    pub async fn in_memory() -> Result<Self, CacheError> {
        // an in-memory database lives in a single connection, keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                bucket TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                expires_at INTEGER,
                PRIMARY KEY (bucket, key)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Serialize `value` and store it under `(bucket, key)`.
    ///
    /// A zero `ttl` stores the entry without expiry.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        bucket: &str,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let data = serde_json::to_string(value).map_err(CacheError::Encode)?;
        let expires_at = (!ttl.is_zero()).then(|| now_millis().saturating_add(duration_millis(ttl)));

        sqlx::query(
            r#"
            INSERT INTO cache_entries (bucket, key, value, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (bucket, key)
            DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            "#,
        )
        .bind(bucket)
        .bind(key)
        .bind(data)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Read and deserialize the entry under `(bucket, key)`
    pub async fn get<T: DeserializeOwned>(&self, bucket: &str, key: &str) -> Result<T, CacheError> {
        let row = sqlx::query("SELECT value, expires_at FROM cache_entries WHERE bucket = ?1 AND key = ?2")
            .bind(bucket)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(CacheError::Miss)?;

        let expires_at: Option<i64> = row.try_get("expires_at")?;
        if expires_at.is_some_and(|at| at <= now_millis()) {
            if let Err(e) = self.delete(bucket, key).await {
                tracing::debug!("Failed to drop expired cache entry {}/{}: {}", bucket, key, e);
            }
            return Err(CacheError::Miss);
        }

        let value: String = row.try_get("value")?;
        serde_json::from_str(&value).map_err(CacheError::Corrupt)
    }

    /// Remove one entry
    pub async fn delete(&self, bucket: &str, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entries WHERE bucket = ?1 AND key = ?2")
            .bind(bucket)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove every expired entry, returning how many were dropped
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1")
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Release the underlying storage.
    ///
    /// Later calls on this store, or on any handle sharing it, fail with
    /// [`CacheError::Storage`].
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    #[cfg(test)]
    pub(crate) async fn break_storage(&self) {
        sqlx::query("DROP TABLE cache_entries")
            .execute(&self.pool)
            .await
            .unwrap();
    }

    #[cfg(test)]
    pub(crate) async fn put_raw(&self, bucket: &str, key: &str, raw: &str) {
        sqlx::query("INSERT INTO cache_entries (bucket, key, value, expires_at) VALUES (?1, ?2, ?3, NULL)")
            .bind(bucket)
            .bind(key)
            .bind(raw)
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn duration_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}
