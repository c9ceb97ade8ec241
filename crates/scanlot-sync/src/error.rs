//! # Sync Error Types
//!
//! Error types for the persistence gateway and the sync coordinator.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Remote      │  │     Export              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  NotConfigured  │  │  Unimplemented{format}  │ │
//! │  │  ConfigLoad     │  │  Remote         │  │  Export                 │ │
//! │  │  ConfigSave     │  │  PartialFailure │  │  Serialization          │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Database     │  │    Internal     │                              │
//! │  │  (local store)  │  │  ShuttingDown   │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only `RemoteNotConfigured` is fatal, and only to sync: scanning,
//! sessions and local commits keep working without a remote.

use thiserror::Error;

use crate::coordinator::ItemFailure;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering gateway and coordinator failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// No remote client was ever provided.
    ///
    /// ## When This Occurs
    /// - `perform_sync` or `load_relations` on a gateway built without a
    ///   remote store
    #[error("Remote store not configured")]
    RemoteNotConfigured,

    /// The remote store rejected or failed an operation.
    ///
    /// ## When This Occurs
    /// - Network failure or unreachable remote during a write
    /// - Remote rejected the row (constraint, permission)
    #[error("Remote store error: {0}")]
    Remote(String),

    /// Some queued writes could not be replayed. Itemized per queue entry.
    #[error("{} queued write(s) failed to sync", .0.len())]
    PartialFailure(Vec<ItemFailure>),

    // =========================================================================
    // Export Errors
    // =========================================================================
    /// An export format that has no implementation. Never silently
    /// degraded to JSON.
    #[error("Export format '{format}' is not implemented")]
    Unimplemented { format: String },

    /// Writing an export failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// JSON encoding or decoding failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    // =========================================================================
    // Local Store Errors
    // =========================================================================
    /// Local store operation failed.
    #[error("Local store error: {0}")]
    Database(#[from] scanlot_db::DbError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal coordinator error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The periodic scheduler is shutting down.
    #[error("Sync scheduler is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for SyncError {
    fn from(err: csv::Error) -> Self {
        SyncError::Export(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if the operation may succeed when retried later.
    ///
    /// ## Retryable Errors
    /// - Remote failures (network, transient rejection)
    /// - Partial sync failures
    /// - Local store temporarily unavailable
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote(_) | SyncError::PartialFailure(_) => true,
            SyncError::Database(db) => db.is_unavailable(),
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
                | SyncError::RemoteNotConfigured
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanlot_db::DbError;

    #[test]
    fn test_error_categorization() {
        assert!(SyncError::Remote("timeout".into()).is_retryable());
        assert!(SyncError::Database(DbError::Unavailable("locked".into())).is_retryable());
        assert!(!SyncError::Database(DbError::QuotaExceeded("full".into())).is_retryable());
        assert!(!SyncError::RemoteNotConfigured.is_retryable());

        assert!(SyncError::RemoteNotConfigured.is_config_error());
        assert!(SyncError::InvalidConfig("x".into()).is_config_error());
        assert!(!SyncError::Remote("x".into()).is_config_error());
    }

    #[test]
    fn test_error_messages() {
        let err = SyncError::Unimplemented {
            format: "xlsx".into(),
        };
        assert_eq!(err.to_string(), "Export format 'xlsx' is not implemented");

        let failures = vec![ItemFailure {
            id: 1,
            table: "inventario".into(),
            retry_count: 1,
            error: "boom".into(),
        }];
        assert_eq!(
            SyncError::PartialFailure(failures).to_string(),
            "1 queued write(s) failed to sync"
        );
    }
}
