//! # CLI Error Type
//!
//! One error type for every subcommand, with an exit code per category.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CoreError (decode, session rules)   ─► Input     exit 2               │
//! │  SyncError::is_config_error()        ─► Config    exit 3               │
//! │  SyncError / DbError (everything else) ─► Storage exit 4               │
//! │  io / serde_json (session, remote files) ─► File  exit 5               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use thiserror::Error;

use scanlot_core::{CoreError, DecodeError};
use scanlot_db::DbError;
use scanlot_sync::SyncError;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// Bad scan or session input.
    #[error(transparent)]
    Input(#[from] CoreError),

    /// Invalid or missing configuration.
    #[error("{0}")]
    Config(String),

    /// Local store, remote store or sync failure.
    #[error(transparent)]
    Storage(SyncError),

    /// Reading or writing a session or remote file failed.
    #[error("{path}: {message}")]
    File { path: PathBuf, message: String },

    /// Arguments that parse but make no sense together.
    #[error("{0}")]
    Usage(String),
}

impl CliError {
    pub fn file(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        CliError::File {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Input(_) | CliError::Usage(_) => 2,
            CliError::Config(_) => 3,
            CliError::Storage(_) => 4,
            CliError::File { .. } => 5,
        }
    }
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        if err.is_config_error() {
            CliError::Config(err.to_string())
        } else {
            CliError::Storage(err)
        }
    }
}

impl From<DecodeError> for CliError {
    fn from(err: DecodeError) -> Self {
        CliError::Input(CoreError::Decode(err))
    }
}

impl From<DbError> for CliError {
    fn from(err: DbError) -> Self {
        CliError::Storage(SyncError::Database(err))
    }
}
