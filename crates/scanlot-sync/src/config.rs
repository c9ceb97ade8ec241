//! # Scanlot Configuration
//!
//! Configuration for the sync scheduler, caches, backups, session rules and
//! storage location.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SCANLOT_SYNC_INTERVAL_SECS=60                                      │
//! │     SCANLOT_DATABASE_PATH=/data/scanlot.db                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/scanlot/scanlot.toml (Linux)                             │
//! │     ~/Library/Application Support/com.scanlot.scanlot/scanlot.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [sync]
//! interval_secs = 300
//! max_retries = 3      # 0 = unlimited
//! enabled = true
//!
//! [cache]
//! price_ttl_days = 30
//!
//! [backup]
//! retention_days = 7
//!
//! [session]
//! min_price_cents = 1
//! max_price_cents = 9999999
//! max_quantity = 999
//! default_price_per_kilo_cents = 10000
//! debounce_ms = 5000
//!
//! [storage]
//! database_path = "/var/lib/scanlot/scanlot.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use scanlot_core::{Money, SessionRules, MAX_ITEM_QUANTITY};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Sections
// =============================================================================

/// Sync scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Seconds between periodic sync passes.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Attempts per queued write before it is skipped (0 = unlimited).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// When false no periodic trigger is started; manual sync still works.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_interval() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    3
}
fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            interval_secs: default_interval(),
            max_retries: default_max_retries(),
            enabled: true,
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Price cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_price_ttl")]
    pub price_ttl_days: u32,
}

fn default_price_ttl() -> u32 {
    30
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            price_ttl_days: default_price_ttl(),
        }
    }
}

/// Backup retention settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSettings {
    #[serde(default = "default_retention")]
    pub retention_days: u32,
}

fn default_retention() -> u32 {
    7
}

impl Default for BackupSettings {
    fn default() -> Self {
        BackupSettings {
            retention_days: default_retention(),
        }
    }
}

/// Session validation and scanner settings. Prices in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_min_price")]
    pub min_price_cents: i64,

    #[serde(default = "default_max_price")]
    pub max_price_cents: i64,

    #[serde(default = "default_max_quantity")]
    pub max_quantity: i64,

    /// Used for weighted labels whose PLU has no fresh cached price.
    #[serde(default = "default_price_per_kilo")]
    pub default_price_per_kilo_cents: i64,

    /// Re-scans of the same code within this window are ignored.
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
}

fn default_min_price() -> i64 {
    1
}
fn default_max_price() -> i64 {
    9_999_999
}
fn default_max_quantity() -> i64 {
    MAX_ITEM_QUANTITY
}
fn default_price_per_kilo() -> i64 {
    10_000
}
fn default_debounce() -> u64 {
    5000
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            min_price_cents: default_min_price(),
            max_price_cents: default_max_price(),
            max_quantity: default_max_quantity(),
            default_price_per_kilo_cents: default_price_per_kilo(),
            debounce_ms: default_debounce(),
        }
    }
}

impl SessionSettings {
    /// Validation rules for a new session.
    pub fn rules(&self) -> SessionRules {
        SessionRules {
            min_price: Money::from_cents(self.min_price_cents),
            max_price: Money::from_cents(self.max_price_cents),
            max_quantity: self.max_quantity,
        }
    }

    pub fn default_price_per_kilo(&self) -> Money {
        Money::from_cents(self.default_price_per_kilo_cents)
    }
}

/// Where the local database lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Explicit database file; the platform data directory when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanlotConfig {
    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub backup: BackupSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl ScanlotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (scanlot.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.sync.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.interval_secs must be greater than 0".into(),
            ));
        }

        if self.session.min_price_cents > self.session.max_price_cents {
            return Err(SyncError::InvalidConfig(format!(
                "session.min_price_cents ({}) exceeds max_price_cents ({})",
                self.session.min_price_cents, self.session.max_price_cents
            )));
        }

        if self.session.default_price_per_kilo_cents <= 0 {
            return Err(SyncError::InvalidConfig(
                "session.default_price_per_kilo_cents must be positive".into(),
            ));
        }

        if self.session.max_quantity <= 0 {
            return Err(SyncError::InvalidConfig(
                "session.max_quantity must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Applies `SCANLOT_*` overrides read through `lookup`.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("SCANLOT_SYNC_INTERVAL_SECS") {
            match raw.parse() {
                Ok(secs) => {
                    debug!(secs, "Overriding sync interval from environment");
                    self.sync.interval_secs = secs;
                }
                Err(_) => warn!(value = %raw, "Ignoring invalid SCANLOT_SYNC_INTERVAL_SECS"),
            }
        }

        if let Some(raw) = lookup("SCANLOT_SYNC_MAX_RETRIES") {
            if let Ok(n) = raw.parse() {
                self.sync.max_retries = n;
            }
        }

        if let Some(raw) = lookup("SCANLOT_SYNC_ENABLED") {
            match raw.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.sync.enabled = true,
                "0" | "false" | "no" => self.sync.enabled = false,
                _ => warn!(value = %raw, "Unknown SCANLOT_SYNC_ENABLED value"),
            }
        }

        if let Some(raw) = lookup("SCANLOT_PRICE_TTL_DAYS") {
            if let Ok(days) = raw.parse() {
                self.cache.price_ttl_days = days;
            }
        }

        if let Some(raw) = lookup("SCANLOT_BACKUP_RETENTION_DAYS") {
            if let Ok(days) = raw.parse() {
                self.backup.retention_days = days;
            }
        }

        if let Some(raw) = lookup("SCANLOT_MAX_QUANTITY") {
            if let Ok(qty) = raw.parse() {
                self.session.max_quantity = qty;
            }
        }

        if let Some(path) = lookup("SCANLOT_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.storage.database_path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "scanlot", "scanlot")
            .map(|dirs| dirs.config_dir().join("scanlot.toml"))
    }

    /// The configured database path, or `scanlot.db` in the platform data
    /// directory (current directory as a last resort).
    pub fn database_path(&self) -> PathBuf {
        if let Some(ref path) = self.storage.database_path {
            return path.clone();
        }
        directories::ProjectDirs::from("com", "scanlot", "scanlot")
            .map(|dirs| dirs.data_dir().join("scanlot.db"))
            .unwrap_or_else(|| PathBuf::from("scanlot.db"))
    }
}
