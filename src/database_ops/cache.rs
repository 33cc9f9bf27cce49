//! Key/value cache for computed lookup results.
//!
//! Entries are either permanent or carry an absolute expiry; expired entries
//! are invisible to `get` and removed by `purge_expired`.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Permanent,
    At(DateTime<Utc>),
}

impl Expiry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Expiry::Permanent => false,
            Expiry::At(at) => *at <= now,
        }
    }

    fn to_column(self) -> i64 {
        match self {
            Expiry::Permanent => -1,
            Expiry::At(at) => at.timestamp(),
        }
    }

    fn from_column(raw: i64) -> Self {
        if raw < 0 {
            return Expiry::Permanent;
        }
        match Utc.timestamp_opt(raw, 0).single() {
            Some(at) => Expiry::At(at),
            None => Expiry::Permanent,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub cid: String,
    pub data: Value,
    pub expire: Expiry,
    pub tags: Vec<String>,
    pub created: DateTime<Utc>,
}

impl CacheEntry {
    pub fn permanent(cid: impl Into<String>, data: Value, tags: &[&str]) -> Self {
        Self {
            cid: cid.into(),
            data,
            expire: Expiry::Permanent,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created: Utc::now(),
        }
    }

    pub fn expiring(cid: impl Into<String>, data: Value, at: DateTime<Utc>) -> Self {
        Self {
            cid: cid.into(),
            data,
            expire: Expiry::At(at),
            tags: Vec::new(),
            created: Utc::now(),
        }
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, cid: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Insert or overwrite the entry for `entry.cid`.
    async fn set(&self, entry: CacheEntry) -> Result<(), StoreError>;

    async fn delete(&self, cid: &str) -> Result<(), StoreError>;

    /// Remove every entry carrying `tag`; returns how many were removed.
    async fn invalidate_tag(&self, tag: &str) -> Result<u64, StoreError>;

    async fn purge_expired(&self) -> Result<u64, StoreError>;
}

/// Process-local cache, handy for tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, cid: &str) -> Result<Option<CacheEntry>, StoreError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(cid)
            .filter(|e| !e.expire.is_expired(Utc::now()))
            .cloned())
    }

    async fn set(&self, entry: CacheEntry) -> Result<(), StoreError> {
        self.entries.lock().await.insert(entry.cid.clone(), entry);
        Ok(())
    }

    async fn delete(&self, cid: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(cid);
        Ok(())
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| !e.tags.iter().any(|t| t == tag));
        Ok((before - entries.len()) as u64)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| !e.expire.is_expired(now));
        Ok((before - entries.len()) as u64)
    }
}

/// Cache persisted in the `amazon_cache` table.
///
/// Tags are stored space-delimited with leading and trailing spaces so a
/// single `LIKE '% tag %'` matches whole tags only.
#[derive(Debug, Clone)]
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS amazon_cache (
    cid     TEXT PRIMARY KEY NOT NULL,
    data    TEXT NOT NULL,
    expire  INTEGER NOT NULL DEFAULT -1,
    tags    TEXT NOT NULL DEFAULT '',
    created INTEGER NOT NULL
)"#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    fn encode_tags(tags: &[String]) -> String {
        let clean: Vec<&str> = tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty() && !t.contains(' '))
            .collect();
        if clean.is_empty() {
            String::new()
        } else {
            format!(" {} ", clean.join(" "))
        }
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, cid: &str) -> Result<Option<CacheEntry>, StoreError> {
        let Some(row) =
            sqlx::query("SELECT cid, data, expire, tags, created FROM amazon_cache WHERE cid = ?")
                .bind(cid)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let expire = Expiry::from_column(row.try_get::<i64, _>("expire")?);
        if expire.is_expired(Utc::now()) {
            return Ok(None);
        }
        let data: Value = serde_json::from_str(&row.try_get::<String, _>("data")?)?;
        let tags = row
            .try_get::<String, _>("tags")?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let created = Utc
            .timestamp_opt(row.try_get::<i64, _>("created")?, 0)
            .single()
            .unwrap_or_else(Utc::now);

        Ok(Some(CacheEntry {
            cid: row.try_get("cid")?,
            data,
            expire,
            tags,
            created,
        }))
    }

    async fn set(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let data = serde_json::to_string(&entry.data)?;
        sqlx::query(
            r#"
INSERT INTO amazon_cache (cid, data, expire, tags, created)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT (cid) DO UPDATE SET
    data = excluded.data,
    expire = excluded.expire,
    tags = excluded.tags,
    created = excluded.created"#,
        )
        .bind(&entry.cid)
        .bind(data)
        .bind(entry.expire.to_column())
        .bind(Self::encode_tags(&entry.tags))
        .bind(entry.created.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, cid: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM amazon_cache WHERE cid = ?")
            .bind(cid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<u64, StoreError> {
        let done = sqlx::query("DELETE FROM amazon_cache WHERE tags LIKE ?")
            .bind(format!("% {} %", tag.trim()))
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let done = sqlx::query("DELETE FROM amazon_cache WHERE expire >= 0 AND expire <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::db::connect_sqlite;
    use chrono::Duration;
    use serde_json::json;

    async fn sqlite() -> SqliteCacheStore {
        let pool = connect_sqlite("sqlite::memory:").await.unwrap();
        SqliteCacheStore::new(pool).await.unwrap()
    }

    async fn exercise(store: &dyn CacheStore) {
        store
            .set(CacheEntry::permanent("a", json!(["1", "2"]), &["amazon:similar"]))
            .await
            .unwrap();
        store
            .set(CacheEntry::permanent("b", json!({"k": 1}), &["other"]))
            .await
            .unwrap();

        let hit = store.get("a").await.unwrap().unwrap();
        assert_eq!(hit.data, json!(["1", "2"]));
        assert_eq!(hit.expire, Expiry::Permanent);
        assert_eq!(hit.tags, vec!["amazon:similar".to_string()]);

        // overwrite
        store
            .set(CacheEntry::permanent("a", json!(["3"]), &["amazon:similar"]))
            .await
            .unwrap();
        assert_eq!(store.get("a").await.unwrap().unwrap().data, json!(["3"]));

        assert_eq!(store.invalidate_tag("amazon:similar").await.unwrap(), 1);
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.get("b").await.unwrap().is_some());

        store.delete("b").await.unwrap();
        assert!(store.get("b").await.unwrap().is_none());
        store.delete("missing").await.unwrap();
    }

    async fn expiry(store: &dyn CacheStore) {
        let past = Utc::now() - Duration::seconds(30);
        let future = Utc::now() + Duration::hours(1);
        store
            .set(CacheEntry::expiring("old", json!(1), past))
            .await
            .unwrap();
        store
            .set(CacheEntry::expiring("new", json!(2), future))
            .await
            .unwrap();

        assert!(store.get("old").await.unwrap().is_none());
        assert_eq!(store.get("new").await.unwrap().unwrap().data, json!(2));
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn memory_store_semantics() {
        let store = MemoryCacheStore::new();
        exercise(&store).await;
        expiry(&store).await;
    }

    #[tokio::test]
    async fn sqlite_store_semantics() {
        let store = sqlite().await;
        exercise(&store).await;
        expiry(&store).await;
    }

    #[tokio::test]
    async fn tag_match_is_whole_word() {
        let store = sqlite().await;
        store
            .set(CacheEntry::permanent("x", json!(0), &["amazon:similar-extra"]))
            .await
            .unwrap();
        assert_eq!(store.invalidate_tag("amazon:similar").await.unwrap(), 0);
        assert!(store.get("x").await.unwrap().is_some());
    }
}
