//! # Storage Error Types
//!
//! Error types for local store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        serde_json::Error                   │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError::Database (scanlot-sync) ← gateway / coordinator            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CLI prints a one-line message                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Local store errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Key or entity not found.
    ///
    /// ## When This Occurs
    /// - Restoring a backup timestamp that was never written or was pruned
    /// - Marking a sync queue item that was already drained
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The store cannot be reached right now.
    ///
    /// ## When This Occurs
    /// - Pool closed or timed out
    /// - Database file locked by another process
    /// - I/O error opening the file
    #[error("Local store unavailable: {0}")]
    Unavailable(String),

    /// The store refused a write because it is full.
    ///
    /// ## When This Occurs
    /// - SQLite reports "database or disk is full"
    /// - A capacity-limited in-memory store reached its limit
    #[error("Local store quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization failed for '{key}': {message}")]
    Serialization { key: String, message: String },

    /// Internal storage error.
    #[error("Internal storage error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Serialization error for a key.
    pub fn serialization(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        DbError::Serialization {
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// Returns true if the store could not be reached at all (as opposed to
    /// rejecting one operation).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DbError::Unavailable(_) | DbError::ConnectionFailed(_))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound              → DbError::NotFound
/// "database or disk is full"            → DbError::QuotaExceeded
/// "database is locked"                  → DbError::Unavailable
/// sqlx::Error::PoolTimedOut / Closed    → DbError::Unavailable
/// sqlx::Error::Io                       → DbError::Unavailable
/// Other                                 → DbError::QueryFailed / Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                if msg.contains("database or disk is full") {
                    DbError::QuotaExceeded(msg.to_string())
                } else if msg.contains("database is locked") {
                    DbError::Unavailable(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::Unavailable("Connection pool timed out".into()),

            sqlx::Error::PoolClosed => DbError::Unavailable("Pool is closed".into()),

            sqlx::Error::Io(io) => DbError::Unavailable(io.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::serialization("<value>", err)
    }
}

/// Result type for storage operations.
pub type DbResult<T> = Result<T, DbError>;
