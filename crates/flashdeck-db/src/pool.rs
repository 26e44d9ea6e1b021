//! # Cache Database
//!
//! Opens the SQLite database behind the local cache.
//!
//! ```text
//! DbConfig::new(path) / DbConfig::in_memory()
//!        │
//!        ▼
//! Database::new ──► SqlitePool ──► migrations ──► CacheRepository
//!                                                   ├── LocalCache::load
//!                                                   └── LocalCache writer task
//! ```
//!
//! A file database runs in WAL mode so the writer task and a concurrent
//! load do not block each other. An in-memory database is a single pinned
//! connection: the data lives exactly as long as the pool.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::cache::CacheRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Where the cache lives and how many connections it may use.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database file; `None` keeps everything in memory.
    pub path: Option<PathBuf>,

    /// Upper bound on pooled connections.
    pub pool_size: u32,

    /// How long to wait for a free connection.
    pub acquire_timeout: Duration,

    /// Apply pending migrations when opening.
    pub run_migrations: bool,
}

impl DbConfig {
    /// A file-backed cache, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: Some(path.into()),
            pool_size: 4,
            acquire_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }

    /// A throwaway cache for tests and dry runs.
    pub fn in_memory() -> Self {
        DbConfig {
            path: None,
            pool_size: 1,
            acquire_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size.max(1);
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the cache database. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, migrates the schema.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let location = config.describe();

        let pool = match &config.path {
            Some(path) => {
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal);
                SqlitePoolOptions::new()
                    .max_connections(config.pool_size)
                    .acquire_timeout(config.acquire_timeout)
                    .connect_with(options)
                    .await
            }
            None => {
                let options = SqliteConnectOptions::from_str("sqlite::memory:")
                    .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(Option::<Duration>::None)
                    .max_lifetime(Option::<Duration>::None)
                    .acquire_timeout(config.acquire_timeout)
                    .connect_with(options)
                    .await
            }
        }
        .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(location = %location, pool_size = config.pool_size, "Cache database opened");

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Repository over the `item_cache` table.
    pub fn cache(&self) -> CacheRepository {
        CacheRepository::new(self.pool.clone())
    }

    /// Closes the pool; later queries fail.
    pub async fn close(&self) {
        info!("Closing cache database");
        self.pool.close().await;
    }

    /// True while a trivial query still succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
        assert!(total >= 1);
    }

    #[tokio::test]
    async fn test_closed_pool_is_unhealthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
    }

    #[tokio::test]
    async fn test_file_database_keeps_rows_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        db.cache().put("flashcards_data_u1", "{}").await.unwrap();
        db.close().await;

        let reopened = Database::new(DbConfig::new(&path).pool_size(2)).await.unwrap();
        assert_eq!(reopened.cache().keys().await.unwrap(), vec!["flashcards_data_u1".to_string()]);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/flashdeck.db").pool_size(0).run_migrations(false);
        assert_eq!(config.pool_size, 1);
        assert!(!config.run_migrations);
        assert_eq!(DbConfig::in_memory().describe(), ":memory:");
    }
}
