use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::error::StoreError;
use crate::models::{Association, ImageMetadata};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://amazon.db";

/// Persistent UPC -> ASIN associations and item image metadata.
///
/// Inserts never overwrite: a row that already exists is left untouched and
/// the insert reports `false`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_asin(&self, upc: &str) -> Result<Option<String>, StoreError>;

    async fn insert_association(&self, association: &Association) -> Result<bool, StoreError>;

    async fn count_associations(&self) -> Result<i64, StoreError>;

    async fn has_images(&self, asin: &str) -> Result<bool, StoreError>;

    async fn insert_image(&self, image: &ImageMetadata) -> Result<bool, StoreError>;

    async fn images_for(&self, asin: &str) -> Result<Vec<ImageMetadata>, StoreError>;
}

/// Open (creating if needed) a SQLite pool. `sqlite::memory:` yields a
/// single-connection pool so every query sees the same database.
#[instrument(skip(database_url))]
pub async fn connect_sqlite(database_url: &str) -> Result<SqlitePool, StoreError> {
    let in_memory = database_url.contains(":memory:");
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    let mut pool_options = SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(10));
    pool_options = if in_memory {
        pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options.max_connections(4)
    };

    let pool = pool_options.connect_with(options).await?;
    info!(in_memory, "connected to sqlite");
    Ok(pool)
}

#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Wrap an existing pool, creating the tables if they are missing.
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        Self::new(connect_sqlite(database_url).await?).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS amazon_upc (
    upc  TEXT PRIMARY KEY NOT NULL,
    asin TEXT NOT NULL
)"#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS amazon_upc_asin ON amazon_upc (asin)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS amazon_item_image (
    asin   TEXT NOT NULL,
    size   TEXT NOT NULL,
    height INTEGER NOT NULL DEFAULT 0,
    width  INTEGER NOT NULL DEFAULT 0,
    url    TEXT NOT NULL,
    PRIMARY KEY (asin, size)
)"#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn find_asin(&self, upc: &str) -> Result<Option<String>, StoreError> {
        let asin: Option<String> = sqlx::query_scalar("SELECT asin FROM amazon_upc WHERE upc = ?")
            .bind(upc)
            .fetch_optional(&self.pool)
            .await?;
        Ok(asin.filter(|a| !a.is_empty()))
    }

    async fn insert_association(&self, association: &Association) -> Result<bool, StoreError> {
        let done = sqlx::query("INSERT OR IGNORE INTO amazon_upc (upc, asin) VALUES (?, ?)")
            .bind(&association.upc)
            .bind(&association.asin)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn count_associations(&self) -> Result<i64, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM amazon_upc")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn has_images(&self, asin: &str) -> Result<bool, StoreError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM amazon_item_image WHERE asin = ? LIMIT 1")
                .bind(asin)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn insert_image(&self, image: &ImageMetadata) -> Result<bool, StoreError> {
        let done = sqlx::query(
            "INSERT OR IGNORE INTO amazon_item_image (asin, size, height, width, url) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&image.asin)
        .bind(&image.size)
        .bind(image.height)
        .bind(image.width)
        .bind(&image.url)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn images_for(&self, asin: &str) -> Result<Vec<ImageMetadata>, StoreError> {
        let rows = sqlx::query_as::<_, ImageMetadata>(
            "SELECT asin, size, height, width, url FROM amazon_item_image \
             WHERE asin = ? ORDER BY size",
        )
        .bind(asin)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
