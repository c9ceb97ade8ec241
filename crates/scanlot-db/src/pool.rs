//! # SQLite Handle
//!
//! Opens the single SQLite file behind the local key-value store.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::new(path)            one file, `kv_store` table             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await    pool + WAL + busy timeout + migrations │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LocalStore::new(Arc::new(db))  repositories over KeyValueStore        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A CLI command and a `sync --watch` process may open the same file at
//! once. WAL keeps readers off the writer's back; the busy timeout makes a
//! second writer wait instead of failing with `database is locked`.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;

const IN_MEMORY_PATH: &str = ":memory:";

/// Where the store lives and how long a writer waits for the lock.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,
    /// Default: 4. Forced to 1 in memory, where each connection would be a
    /// separate database.
    pub max_connections: u32,
    /// Default: 5 seconds.
    pub busy_timeout: Duration,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Private in-memory database, gone when the handle is dropped.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            ..Self::new(IN_MEMORY_PATH)
        }
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };
        Ok(options.busy_timeout(self.busy_timeout))
    }
}

/// SQLite handle. Implements [`crate::KeyValueStore`].
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database and applies migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let max_connections = if config.is_in_memory() {
            1
        } else {
            config.max_connections.max(1)
        };

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(config.busy_timeout);
        if config.is_in_memory() {
            // Dropping the only connection would drop the data
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        migrations::run_migrations(&pool).await?;
        info!(
            path = %config.database_path.display(),
            max_connections,
            "Local store opened"
        );

        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the pool. Later operations fail with [`DbError::Unavailable`].
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KeyValueStore;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let path = std::env::temp_dir().join(format!("scanlot-pool-{}.db", std::process::id()));

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        db.set("meta:marker", "kept").await.unwrap();
        db.close().await;

        let reopened = Database::new(DbConfig::new(&path).busy_timeout(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(reopened.get("meta:marker").await.unwrap().as_deref(), Some("kept"));
        reopened.close().await;

        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[test]
    fn test_in_memory_config() {
        let config = DbConfig::in_memory();
        assert!(config.is_in_memory());
        assert_eq!(config.max_connections, 1);
        assert!(!DbConfig::new("/tmp/scanlot.db").is_in_memory());
    }
}
