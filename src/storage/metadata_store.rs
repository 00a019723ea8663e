//! SQLite Metadata Index
//!
//! Persistent record store for frame assets.
//!
//! ## Database Schema
//!
//! - `assets`: one row per stored frame. `canonical_path`, `url_path` and
//!   `fingerprint` carry UNIQUE constraints; these constraints, not any caller
//!   pre-check, decide whether a frame is stored at most once.
//!
//! Timestamps are stored as Unix milliseconds so ordering is numeric.
//!
//! ## Concurrency
//!
//! The index owns a pooled set of connections in WAL mode, so readers never
//! wait on the writer. Writes are serialised one level up by the store's
//! write gate (see [`crate::storage::AssetStore`]).

use crate::error::{AppError, Result};
use crate::models::{AssetRecord, NewAsset};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const SELECT_COLUMNS: &str = "id, canonical_path, url_path, file_name, captured_at, satellite, \
     sector, product, band, caption, file_size, fingerprint, created_at";

/// SQLite metadata index
#[derive(Debug, Clone)]
pub struct MetadataIndex {
    pool: SqlitePool,
}

impl MetadataIndex {
    /// Open (or create) the index database
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path of the SQLite file; parent directories are created
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Failed to create the parent directory
    /// - Failed to connect to database
    /// - Failed to create tables
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::io_error(
                    format!("Failed to create database directory: {}", e),
                    Some(parent.to_path_buf()),
                )
            })?;
        }

        info!(path = %db_path.display(), "Initializing metadata index");

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            // WAL 模式：写入时允许并发读取
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::database_error(format!("Failed to connect to database: {}", e))
            })?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    /// Initialize database schema
    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS assets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                canonical_path TEXT NOT NULL UNIQUE,
                url_path TEXT NOT NULL UNIQUE,
                file_name TEXT NOT NULL,
                captured_at INTEGER NOT NULL,
                satellite TEXT NOT NULL,
                sector TEXT NOT NULL,
                product TEXT NOT NULL,
                band TEXT NOT NULL,
                caption TEXT,
                file_size INTEGER NOT NULL,
                fingerprint TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| AppError::database_error(format!("Failed to create assets table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_assets_captured_at ON assets(captured_at, id)",
        )
        .execute(pool)
        .await
        .map_err(|e| AppError::database_error(format!("Failed to create index: {}", e)))?;

        info!("Database schema initialized successfully");
        Ok(())
    }

    /// Insert an asset record
    ///
    /// # Returns
    ///
    /// The auto-generated record ID
    ///
    /// # Errors
    ///
    /// - `AppError::DuplicateKey` if the url path, canonical path or
    ///   fingerprint is already stored
    /// - `AppError::DatabaseError` for any other failure
    pub async fn insert(&self, asset: &NewAsset) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO assets (
                canonical_path, url_path, file_name, captured_at, satellite,
                sector, product, band, caption, file_size, fingerprint, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(asset.canonical_path.to_string_lossy().into_owned())
        .bind(&asset.url_path)
        .bind(&asset.file_name)
        .bind(asset.captured_at.timestamp_millis())
        .bind(&asset.frame.satellite)
        .bind(&asset.frame.sector)
        .bind(&asset.frame.product)
        .bind(&asset.frame.band)
        .bind(&asset.caption)
        .bind(asset.file_size_bytes as i64)
        .bind(&asset.fingerprint)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        let id = result.last_insert_rowid();

        debug!(
            id = id,
            url_path = %asset.url_path,
            fingerprint = %asset.fingerprint,
            "Inserted asset record"
        );

        Ok(id)
    }

    /// All records, newest capture first
    pub async fn list_all(&self) -> Result<Vec<AssetRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM assets ORDER BY captured_at DESC, id DESC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database_error(format!("Failed to list assets: {}", e)))?;

        rows.iter().map(row_to_record).collect()
    }

    /// Get record by url path
    pub async fn find_by_url_path(&self, url_path: &str) -> Result<Option<AssetRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM assets WHERE url_path = ?",
            SELECT_COLUMNS
        ))
        .bind(url_path)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database_error(format!("Failed to query asset: {}", e)))?;

        row.as_ref().map(row_to_record).transpose()
    }

    /// Get record by id
    pub async fn find_by_id(&self, id: i64) -> Result<Option<AssetRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM assets WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database_error(format!("Failed to query asset: {}", e)))?;

        row.as_ref().map(row_to_record).transpose()
    }

    /// Record with the newest capture timestamp
    pub async fn find_latest(&self) -> Result<Option<AssetRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM assets ORDER BY captured_at DESC, id DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database_error(format!("Failed to query latest asset: {}", e)))?;

        row.as_ref().map(row_to_record).transpose()
    }

    /// Oldest `limit` records: smallest capture timestamp first, ties by id
    pub async fn list_oldest(&self, limit: u64) -> Result<Vec<AssetRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM assets ORDER BY captured_at ASC, id ASC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database_error(format!("Failed to query oldest assets: {}", e)))?;

        rows.iter().map(row_to_record).collect()
    }

    /// Whether a record with this fingerprint is stored
    pub async fn fingerprint_exists(&self, fingerprint: &str) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM assets WHERE fingerprint = ?")
            .bind(fingerprint)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::database_error(format!("Failed to check fingerprint: {}", e))
            })?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    /// Delete a record
    ///
    /// # Returns
    ///
    /// `true` if a row was removed
    pub async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM assets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database_error(format!("Failed to delete asset: {}", e)))?;

        debug!(
            id = id,
            rows_affected = result.rows_affected(),
            "Deleted asset record"
        );

        Ok(result.rows_affected() > 0)
    }

    /// Count total records
    pub async fn count_all(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM assets")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database_error(format!("Failed to count assets: {}", e)))?;

        let count: i64 = row.get("count");
        Ok(count as u64)
    }

    /// Connectivity check
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database_error(format!("Database ping failed: {}", e)))?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_record(r: &SqliteRow) -> Result<AssetRecord> {
    let canonical_path: String = r.try_get("canonical_path")?;
    let captured_at: i64 = r.try_get("captured_at")?;
    let created_at: i64 = r.try_get("created_at")?;
    let file_size: i64 = r.try_get("file_size")?;

    Ok(AssetRecord {
        id: r.try_get("id")?,
        canonical_path: PathBuf::from(canonical_path),
        url_path: r.try_get("url_path")?,
        file_name: r.try_get("file_name")?,
        captured_at: millis_to_datetime(captured_at)?,
        satellite: r.try_get("satellite")?,
        sector: r.try_get("sector")?,
        product: r.try_get("product")?,
        band: r.try_get("band")?,
        caption: r.try_get("caption")?,
        file_size_bytes: file_size.max(0) as u64,
        fingerprint: r.try_get("fingerprint")?,
        created_at: millis_to_datetime(created_at)?,
    })
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::database_error(format!("Timestamp out of range: {}", millis)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FrameDescriptor;
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn create_test_index() -> (MetadataIndex, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let index = MetadataIndex::open(&temp_dir.path().join("metadata.db"))
            .await
            .unwrap();
        (index, temp_dir)
    }

    fn new_asset(name: &str, minute: u32, fingerprint: &str) -> NewAsset {
        NewAsset {
            canonical_path: PathBuf::from(format!("/data/images/{}.png", name)),
            url_path: format!("/api/goes/{}", name),
            file_name: format!("{}.png", name),
            captured_at: Utc.with_ymd_and_hms(2025, 8, 20, 21, minute, 0).unwrap(),
            frame: FrameDescriptor::new("GOES-19", "F", "ABI-L2-MCMIPF", "13"),
            caption: Some(format!("caption {}", name)),
            file_size_bytes: 2048,
            fingerprint: fingerprint.to_string(),
        }
    }

    #[tokio::test]
    async fn test_open_creates_empty_index() {
        let (index, _temp_dir) = create_test_index().await;

        assert_eq!(index.count_all().await.unwrap(), 0);
        assert!(index.find_latest().await.unwrap().is_none());
        index.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_find_by_url_path() {
        let (index, _temp_dir) = create_test_index().await;
        let asset = new_asset("a", 30, "fp-a");

        let id = index.insert(&asset).await.unwrap();
        assert!(id > 0, "Should return valid ID");

        let record = index.find_by_url_path("/api/goes/a").await.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.canonical_path, asset.canonical_path);
        assert_eq!(record.file_name, "a.png");
        assert_eq!(record.captured_at, asset.captured_at);
        assert_eq!(record.frame(), asset.frame);
        assert_eq!(record.caption.as_deref(), Some("caption a"));
        assert_eq!(record.file_size_bytes, 2048);
        assert_eq!(record.fingerprint, "fp-a");

        assert!(index.find_by_url_path("/api/goes/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_caption_is_optional() {
        let (index, _temp_dir) = create_test_index().await;
        let mut asset = new_asset("a", 30, "fp-a");
        asset.caption = None;

        let id = index.insert(&asset).await.unwrap();
        let record = index.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.caption, None);
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let (index, _temp_dir) = create_test_index().await;

        let first = index.insert(&new_asset("a", 30, "fp-a")).await.unwrap();
        let second = index.insert(&new_asset("b", 33, "fp-b")).await.unwrap();
        index.delete_by_id(second).await.unwrap();
        let third = index.insert(&new_asset("c", 36, "fp-c")).await.unwrap();

        assert!(second > first);
        assert!(third > second, "AUTOINCREMENT must not reuse deleted ids");
    }

    #[tokio::test]
    async fn test_list_all_orders_by_capture_desc() {
        let (index, _temp_dir) = create_test_index().await;

        index.insert(&new_asset("mid", 33, "fp-mid")).await.unwrap();
        index.insert(&new_asset("old", 30, "fp-old")).await.unwrap();
        index.insert(&new_asset("new", 36, "fp-new")).await.unwrap();

        let names: Vec<String> = index
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.file_name)
            .collect();
        assert_eq!(names, vec!["new.png", "mid.png", "old.png"]);

        let latest = index.find_latest().await.unwrap().unwrap();
        assert_eq!(latest.file_name, "new.png");
    }

    #[tokio::test]
    async fn test_list_oldest_breaks_ties_by_id() {
        let (index, _temp_dir) = create_test_index().await;

        let first = index.insert(&new_asset("tie1", 30, "fp-1")).await.unwrap();
        let second = index.insert(&new_asset("tie2", 30, "fp-2")).await.unwrap();
        index.insert(&new_asset("later", 40, "fp-3")).await.unwrap();

        let oldest = index.list_oldest(2).await.unwrap();
        let ids: Vec<i64> = oldest.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn test_unique_url_path_is_enforced() {
        let (index, _temp_dir) = create_test_index().await;
        index.insert(&new_asset("a", 30, "fp-a")).await.unwrap();

        let mut clash = new_asset("b", 33, "fp-b");
        clash.url_path = "/api/goes/a".to_string();

        let err = index.insert(&clash).await.unwrap_err();
        assert!(err.is_duplicate(), "Expected DuplicateKey, got {:?}", err);
        assert_eq!(index.count_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unique_canonical_path_is_enforced() {
        let (index, _temp_dir) = create_test_index().await;
        index.insert(&new_asset("a", 30, "fp-a")).await.unwrap();

        let mut clash = new_asset("b", 33, "fp-b");
        clash.canonical_path = PathBuf::from("/data/images/a.png");

        let err = index.insert(&clash).await.unwrap_err();
        assert!(err.is_duplicate(), "Expected DuplicateKey, got {:?}", err);
    }

    #[tokio::test]
    async fn test_unique_fingerprint_is_enforced() {
        let (index, _temp_dir) = create_test_index().await;
        index.insert(&new_asset("a", 30, "same")).await.unwrap();

        let err = index.insert(&new_asset("b", 31, "same")).await.unwrap_err();
        assert!(err.is_duplicate(), "Expected DuplicateKey, got {:?}", err);
        assert!(index.fingerprint_exists("same").await.unwrap());
        assert!(!index.fingerprint_exists("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let (index, _temp_dir) = create_test_index().await;
        let id = index.insert(&new_asset("a", 30, "fp-a")).await.unwrap();

        assert!(index.delete_by_id(id).await.unwrap());
        assert!(!index.delete_by_id(id).await.unwrap(), "Second delete is a no-op");
        assert_eq!(index.count_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reopen_preserves_records() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("metadata.db");

        {
            let index = MetadataIndex::open(&db_path).await.unwrap();
            index.insert(&new_asset("a", 30, "fp-a")).await.unwrap();
            index.close().await;
        }

        let index = MetadataIndex::open(&db_path).await.unwrap();
        assert_eq!(index.count_all().await.unwrap(), 1);
    }
}
