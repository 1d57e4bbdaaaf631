//! # Register Configuration
//!
//! One TOML file configures a register: ERP connection, store identity,
//! receipt layout and the database location.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     D365POS_STORE_ID, D365POS_TERMINAL_ID, D365POS_DB_PATH, ...        │
//! │     D365POS_ERP_* (see ErpConfig)                                      │
//! │                                                                         │
//! │  2. TOML Config File (--config, or the platform default)              │
//! │     ~/.config/d365pos/register.toml (Linux)                            │
//! │     ~/Library/Application Support/com.d365pos.register/... (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [erp]
//! resource = "https://contoso.operations.dynamics.com"
//! tenant_id = "..."
//! client_id = "..."
//! client_secret = "..."
//! company = "usmf"
//!
//! [store]
//! store_id = "S001"
//! terminal_id = "T01"
//! staff_id = "000160"
//! shift_id = "1"
//! currency = "AED"
//!
//! [receipt]
//! width = 42
//! header = ["Contoso Market", "Dubai Mall"]
//! footer = ["Thank you"]
//!
//! [database]
//! path = "/var/lib/d365pos/register.db"
//! ```

use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use d365pos_core::receipt::DEFAULT_RECEIPT_WIDTH;
use d365pos_sync::{ErpConfig, RegisterIdentity, SyncError, SyncResult};

const CONFIG_FILE: &str = "register.toml";
const DB_FILE: &str = "d365pos.db";

// =============================================================================
// Sections
// =============================================================================

/// Who this register is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub store_id: String,

    #[serde(default)]
    pub terminal_id: String,

    /// Signed-in operator.
    #[serde(default)]
    pub staff_id: String,

    #[serde(default = "default_shift")]
    pub shift_id: String,

    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_shift() -> String {
    "1".to_string()
}

fn default_currency() -> String {
    "AED".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            store_id: String::new(),
            terminal_id: String::new(),
            staff_id: String::new(),
            shift_id: default_shift(),
            currency: default_currency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptSettings {
    #[serde(default = "default_width")]
    pub width: usize,

    #[serde(default)]
    pub header: Vec<String>,

    #[serde(default)]
    pub footer: Vec<String>,

    /// Also append every receipt to this file.
    #[serde(default)]
    pub archive_path: Option<PathBuf>,
}

fn default_width() -> usize {
    DEFAULT_RECEIPT_WIDTH
}

impl Default for ReceiptSettings {
    fn default() -> Self {
        ReceiptSettings {
            width: default_width(),
            header: Vec::new(),
            footer: Vec::new(),
            archive_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file; the platform data directory when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// App Config
// =============================================================================

/// Complete register configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub erp: ErpConfig,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub receipt: ReceiptSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file
    /// 3. Environment variables
    ///
    /// The ERP section is not validated here; commands that talk to the ERP
    /// call [`ErpConfig::validate`] themselves so offline commands still work.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::read_file(config_path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Reads the config file as written, without environment overrides or
    /// validation. Defaults when the file does not exist.
    ///
    /// Used by commands that rewrite the file, so environment values never
    /// end up persisted.
    pub fn read_file(config_path: Option<PathBuf>) -> SyncResult<Self> {
        match config_path.or_else(Self::default_config_path) {
            Some(path) if path.exists() => {
                info!(?path, "Loading register config from file");
                let contents = std::fs::read_to_string(&path)?;
                Ok(toml::from_str(&contents)?)
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Loads config or returns defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load register config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Register config saved");
        Ok(path)
    }

    /// Records where a signed-in operator works: company, store and the
    /// operator as staff id. Terminal and shift are left alone.
    pub fn apply_sign_in(&mut self, identity: &RegisterIdentity) {
        self.erp.company = identity.company.clone();
        self.store.store_id = identity.store_id.clone();
        self.store.staff_id = identity.user_id.clone();
    }

    /// Validates the store identity.
    pub fn validate(&self) -> SyncResult<()> {
        for (name, value) in [
            ("store.store_id", &self.store.store_id),
            ("store.terminal_id", &self.store.terminal_id),
            ("store.staff_id", &self.store.staff_id),
        ] {
            if value.trim().is_empty() {
                return Err(SyncError::MissingSetting(name.to_string()));
            }
        }

        if self.store.currency.trim().len() != 3 {
            return Err(SyncError::InvalidConfig(format!(
                "store.currency must be a 3-letter code, got '{}'",
                self.store.currency
            )));
        }

        Ok(())
    }

    /// Applies `D365POS_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.erp.apply_overrides_from(&lookup);

        for (key, slot) in [
            ("D365POS_STORE_ID", &mut self.store.store_id),
            ("D365POS_TERMINAL_ID", &mut self.store.terminal_id),
            ("D365POS_STAFF_ID", &mut self.store.staff_id),
            ("D365POS_SHIFT_ID", &mut self.store.shift_id),
            ("D365POS_CURRENCY", &mut self.store.currency),
        ] {
            if let Some(value) = lookup(key) {
                debug!(key, "Overriding store setting from environment");
                *slot = value;
            }
        }

        if let Some(path) = lookup("D365POS_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Database file: configured path or the platform data directory.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database
            .path
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().join(DB_FILE)))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "d365pos", "register")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn configured() -> AppConfig {
        AppConfig {
            store: StoreSettings {
                store_id: "S001".into(),
                terminal_id: "T01".into(),
                staff_id: "000160".into(),
                ..StoreSettings::default()
            },
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.receipt.width, 42);
        assert_eq!(config.store.currency, "AED");
        assert_eq!(config.erp.sales_timeout_secs, 30);
    }

    #[test]
    fn test_validation() {
        assert!(configured().validate().is_ok());

        let mut config = configured();
        config.store.terminal_id.clear();
        assert!(matches!(
            config.validate(),
            Err(SyncError::MissingSetting(name)) if name == "store.terminal_id"
        ));

        let mut config = configured();
        config.store.currency = "DIRHAM".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_reach_every_section() {
        let vars: HashMap<&str, &str> = [
            ("D365POS_TERMINAL_ID", "T09"),
            ("D365POS_DB_PATH", "/tmp/register.db"),
            ("D365POS_ERP_COMPANY", "dat"),
        ]
        .into_iter()
        .collect();

        let mut config = configured();
        config.apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.store.terminal_id, "T09");
        assert_eq!(config.erp.company, "dat");
        assert_eq!(config.database_path(), Some(PathBuf::from("/tmp/register.db")));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("d365pos-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("register.toml");

        let mut config = configured();
        config.receipt.header = vec!["Contoso Market".into()];
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[store]"));
        assert!(contents.contains("[receipt]"));

        let loaded: AppConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.store, config.store);
        assert_eq!(loaded.receipt.header, vec!["Contoso Market".to_string()]);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_sign_in_fills_identity_and_keeps_terminal() {
        let mut config = AppConfig::default();
        config.store.terminal_id = "T01".into();

        config.apply_sign_in(&RegisterIdentity {
            user_id: "000160".into(),
            company: "usmf".into(),
            store_id: "S001".into(),
        });

        assert_eq!(config.erp.company, "usmf");
        assert_eq!(config.store.store_id, "S001");
        assert_eq!(config.store.staff_id, "000160");
        assert_eq!(config.store.terminal_id, "T01");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_read_file_skips_validation() {
        let dir = std::env::temp_dir().join(format!("d365pos-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("register.toml");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&path, "[store]\nterminal_id = \"T01\"\n").unwrap();

        let config = AppConfig::read_file(Some(path.clone())).unwrap();
        assert_eq!(config.store.terminal_id, "T01");
        assert!(AppConfig::load(Some(path)).is_err());

        let missing = AppConfig::read_file(Some(dir.join("absent.toml"))).unwrap();
        assert_eq!(missing.store, StoreSettings::default());

        std::fs::remove_dir_all(dir).ok();
    }
}
