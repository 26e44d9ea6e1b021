//! # Cache Repository
//!
//! Raw access to the `item_cache` table: one row per owner, the payload is
//! the JSON-encoded snapshot. Parsing lives one level up in
//! [`crate::cache::LocalCache`], so a corrupt row can still be read,
//! overwritten or removed here.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// A row of `item_cache`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CacheRecord {
    pub cache_key: String,
    pub payload: String,
    pub updated_at: DateTime<Utc>,
}

/// Repository for cached snapshots.
#[derive(Debug, Clone)]
pub struct CacheRepository {
    pool: SqlitePool,
}

impl CacheRepository {
    /// Creates a new CacheRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CacheRepository { pool }
    }

    /// Fetches the row for `key`, if any.
    pub async fn get(&self, key: &str) -> DbResult<Option<CacheRecord>> {
        let record = sqlx::query_as::<_, CacheRecord>(
            r#"
            SELECT cache_key, payload, updated_at
            FROM item_cache
            WHERE cache_key = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Inserts or overwrites the row for `key`.
    pub async fn put(&self, key: &str, payload: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO item_cache (cache_key, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(cache_key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(payload)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(cache_key = %key, bytes = payload.len(), "Cache row written");
        Ok(())
    }

    /// Deletes the row for `key`. Returns whether a row existed.
    pub async fn remove(&self, key: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM item_cache WHERE cache_key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All cached keys, sorted.
    pub async fn keys(&self) -> DbResult<Vec<String>> {
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT cache_key FROM item_cache ORDER BY cache_key")
                .fetch_all(&self.pool)
                .await?;

        Ok(keys)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.cache();

        assert!(repo.get("flashcards_data_u1").await.unwrap().is_none());

        repo.put("flashcards_data_u1", "{}").await.unwrap();
        repo.put("flashcards_data_u1", r#"{"a":1}"#).await.unwrap();

        let record = repo.get("flashcards_data_u1").await.unwrap().unwrap();
        assert_eq!(record.payload, r#"{"a":1}"#);
        assert_eq!(repo.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_keys_and_remove() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.cache();

        repo.put("flashcards_data_b", "{}").await.unwrap();
        repo.put("flashcards_data_a", "{}").await.unwrap();

        assert_eq!(
            repo.keys().await.unwrap(),
            vec!["flashcards_data_a".to_string(), "flashcards_data_b".to_string()]
        );

        assert!(repo.remove("flashcards_data_a").await.unwrap());
        assert!(!repo.remove("flashcards_data_a").await.unwrap());
        assert_eq!(repo.keys().await.unwrap(), vec!["flashcards_data_b".to_string()]);
    }
}
