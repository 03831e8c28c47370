//! Configuration management for cmg-migrate
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the CMG collections were exported to
    #[serde(default)]
    pub source: SourceConfig,

    /// Bioloop database settings
    #[serde(default)]
    pub target: TargetConfig,

    /// Dataset identity resolution settings
    #[serde(default)]
    pub datasets: DatasetConfig,

    /// Service account used as fallback actor
    #[serde(default)]
    pub accounts: AccountConfig,

    /// CMG role -> Bioloop role
    #[serde(default = "default_role_mapping")]
    pub roles: BTreeMap<String, String>,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Source dump configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory containing one `<collection>.json` file per collection
    #[serde(default = "default_dump_dir")]
    pub dump_dir: PathBuf,
}

/// Target database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// SQLite database file; relative paths resolve against the config dir
    #[serde(default = "default_target_database")]
    pub database: PathBuf,
}

/// How dependent passes locate the dataset a CMG record was migrated to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// `cmg_id` first, similarity scoring for rows without one
    #[default]
    Auto,
    /// `cmg_id` only
    BackReference,
    /// Similarity scoring only
    Similarity,
}

/// Dataset identity resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Visibility assumed for data products without a `visible` field.
    /// Decides whether such a record is migrated as deleted.
    #[serde(default = "default_visible")]
    pub default_visible: bool,

    /// Store the CMG `_id` in `dataset.cmg_id`
    #[serde(default = "default_store_back_reference")]
    pub store_back_reference: bool,

    #[serde(default)]
    pub matching: MatchStrategy,

    /// Bound on duplicate-name probing per record
    #[serde(default = "default_max_duplicate_attempts")]
    pub max_duplicate_attempts: u32,
}

/// Service account configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default = "default_service_username")]
    pub service_username: String,

    #[serde(default = "default_service_email")]
    pub service_email: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// CMG role names, mapped through `roles`
    #[serde(default = "default_service_roles")]
    pub service_roles: Vec<String>,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for cmg-migrate data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            target: TargetConfig::default(),
            datasets: DatasetConfig::default(),
            accounts: AccountConfig::default(),
            roles: default_role_mapping(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dump_dir: default_dump_dir(),
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            database: default_target_database(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            default_visible: default_visible(),
            store_back_reference: default_store_back_reference(),
            matching: MatchStrategy::default(),
            max_duplicate_attempts: default_max_duplicate_attempts(),
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            service_username: default_service_username(),
            service_email: default_service_email(),
            service_name: default_service_name(),
            service_roles: default_service_roles(),
        }
    }
}

impl Config {
    /// Get the default base directory (~/.cmg-migrate)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cmg-migrate")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Absolute path of the target database
    pub fn target_database(&self) -> PathBuf {
        self.resolve(&self.target.database)
    }

    /// Absolute path of the dump directory
    pub fn dump_dir(&self) -> PathBuf {
        self.resolve(&self.source.dump_dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.paths.base_dir.join(path)
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.accounts.service_username.trim().is_empty() {
            return Err(Error::Config(
                "accounts.service_username must not be empty".to_string(),
            ));
        }

        if self.accounts.service_email.trim().is_empty() {
            return Err(Error::Config(
                "accounts.service_email must not be empty".to_string(),
            ));
        }

        if self.datasets.max_duplicate_attempts == 0 {
            return Err(Error::Config(
                "datasets.max_duplicate_attempts must be at least 1".to_string(),
            ));
        }

        if self.datasets.matching == MatchStrategy::BackReference
            && !self.datasets.store_back_reference
        {
            return Err(Error::Config(
                "datasets.matching = \"back_reference\" requires datasets.store_back_reference = true"
                    .to_string(),
            ));
        }

        for (cmg_role, bioloop_role) in &self.roles {
            if !BIOLOOP_ROLES.iter().any(|(name, _)| name == bioloop_role) {
                return Err(Error::Config(format!(
                    "roles.{} maps to unknown Bioloop role '{}'",
                    cmg_role, bioloop_role
                )));
            }
        }

        Ok(())
    }
}
