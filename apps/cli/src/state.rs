//! # CLI State
//!
//! What a subcommand gets to work with.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AppContext                                                             │
//! │  ├── config: ScanlotConfig       (scanlot.toml + SCANLOT_* env)        │
//! │  ├── gateway: PersistenceGateway                                       │
//! │  │     ├── LocalStore (SQLite file, or memory in tests)                │
//! │  │     └── RemoteStore (JSON file via --remote-file, optional)         │
//! │  └── remote file: written back by finish()                             │
//! │                                                                         │
//! │  SessionFile: the open batch session, kept as JSON between runs        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use scanlot_core::BatchSession;
use scanlot_db::{DbConfig, LocalStore};
use scanlot_sync::{InMemoryRemoteStore, PersistenceGateway, RemoteStore, ScanlotConfig};

use crate::error::{CliError, CliResult};

/// A remote store mirrored to a JSON file of `{ table: [rows] }`.
struct RemoteFile {
    path: PathBuf,
    store: Arc<InMemoryRemoteStore>,
}

impl RemoteFile {
    async fn open(path: PathBuf, offline: bool) -> CliResult<Self> {
        let store = Arc::new(InMemoryRemoteStore::new());

        if path.exists() {
            let contents =
                std::fs::read_to_string(&path).map_err(|e| CliError::file(&path, e))?;
            let tables: HashMap<String, Vec<serde_json::Value>> =
                serde_json::from_str(&contents).map_err(|e| CliError::file(&path, e))?;
            for (table, rows) in tables {
                store.seed(&table, rows).await;
            }
            debug!(?path, "Remote file loaded");
        }

        store.set_reachable(!offline);
        Ok(RemoteFile { path, store })
    }

    async fn save(&self) -> CliResult<()> {
        let tables = self.store.dump().await;
        let contents = serde_json::to_string_pretty(&tables)
            .map_err(|e| CliError::file(&self.path, e))?;
        std::fs::write(&self.path, contents).map_err(|e| CliError::file(&self.path, e))?;
        debug!(path = ?self.path, "Remote file saved");
        Ok(())
    }
}

/// Everything a subcommand needs.
pub struct AppContext {
    pub config: ScanlotConfig,
    pub gateway: PersistenceGateway,
    remote: Option<RemoteFile>,
}

impl AppContext {
    /// Opens the SQLite local store and the optional remote file.
    pub async fn open(
        config: ScanlotConfig,
        remote_file: Option<PathBuf>,
        offline: bool,
    ) -> CliResult<Self> {
        let db_path = config.database_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CliError::file(parent, e))?;
        }
        info!(?db_path, "Opening local store");
        let local = LocalStore::sqlite(DbConfig::new(db_path)).await?;

        let remote = match remote_file {
            Some(path) => Some(RemoteFile::open(path, offline).await?),
            None => None,
        };

        Ok(Self::assemble(config, local, remote))
    }

    /// In-memory local store; for tests.
    #[cfg(test)]
    pub fn in_memory(config: ScanlotConfig, remote: Option<Arc<InMemoryRemoteStore>>) -> Self {
        let remote = remote.map(|store| RemoteFile {
            path: PathBuf::from("remote.json"),
            store,
        });
        Self::assemble(config, LocalStore::in_memory(), remote)
    }

    fn assemble(config: ScanlotConfig, local: LocalStore, remote: Option<RemoteFile>) -> Self {
        let remote_store = remote
            .as_ref()
            .map(|file| file.store.clone() as Arc<dyn RemoteStore>);
        let gateway = PersistenceGateway::with_config(local, remote_store, &config);
        AppContext {
            config,
            gateway,
            remote,
        }
    }

    /// Writes the remote file back, if one was opened.
    pub async fn finish(&self) -> CliResult<()> {
        match &self.remote {
            Some(file) => file.save().await,
            None => Ok(()),
        }
    }
}

// =============================================================================
// Session File
// =============================================================================

/// The open batch session, stored as JSON.
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SessionFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved session, or a new one under `config`'s rules.
    pub fn load(&self, config: &ScanlotConfig) -> CliResult<BatchSession> {
        if !self.path.exists() {
            return Ok(BatchSession::new(config.session.rules()));
        }
        let contents =
            std::fs::read_to_string(&self.path).map_err(|e| CliError::file(&self.path, e))?;
        serde_json::from_str(&contents).map_err(|e| CliError::file(&self.path, e))
    }

    pub fn save(&self, session: &BatchSession) -> CliResult<()> {
        let contents =
            serde_json::to_string_pretty(session).map_err(|e| CliError::file(&self.path, e))?;
        std::fs::write(&self.path, contents).map_err(|e| CliError::file(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanlot_core::{ProductMeta, Money};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("scanlot-cli-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_session_file_round_trip() {
        let config = ScanlotConfig::default();
        let file = SessionFile::new(temp_path("session.json"));

        let mut session = file.load(&config).unwrap();
        assert!(session.is_empty());

        session
            .add_manual("7501234567897", &ProductMeta::new("Arroz", "pz"), 2, Money::from_cents(2500))
            .unwrap();
        file.save(&session).unwrap();

        let reloaded = file.load(&config).unwrap();
        assert_eq!(reloaded.entries(), session.entries());
        std::fs::remove_file(file.path()).unwrap();
    }

    #[tokio::test]
    async fn test_remote_file_persists_rows() {
        let path = temp_path("remote.json");
        let first = RemoteFile::open(path.clone(), false).await.unwrap();
        first
            .store
            .insert("inventario", serde_json::json!({ "codigo": "a" }))
            .await
            .unwrap();
        first.save().await.unwrap();

        let second = RemoteFile::open(path.clone(), true).await.unwrap();
        assert_eq!(second.store.rows("inventario").await.len(), 1);
        assert!(!scanlot_sync::remote::is_reachable(second.store.as_ref()).await);
        std::fs::remove_file(path).unwrap();
    }
}
