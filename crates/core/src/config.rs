//! Configuration management
//!
//! This module handles loading, saving, and migrating the s3ctl configuration file.
//! The configuration file is stored in TOML format at ~/.config/s3ctl/config.toml,
//! or under the directory named by `S3CTL_CONFIG_DIR`.
//!
//! PROTECTED FILE: Changes to schema_version require migration support.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::profile::{Profile, SignatureVersion};
use crate::traits::DEFAULT_PAGE_SIZE;

/// Current configuration schema version
///
/// IMPORTANT: Bumping this version requires adding a migration step in
/// `ConfigManager::migrate` and marking the change as BREAKING.
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "S3CTL_CONFIG_DIR";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Name of the selected profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Configured profiles keyed by name
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

/// Default settings for CLI behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Show progress bars
    #[serde(default = "default_true")]
    pub progress: bool,

    /// Keys requested per listing page
    #[serde(default = "default_page_size")]
    pub page_size: i32,
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> i32 {
    DEFAULT_PAGE_SIZE
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            progress: true,
            page_size: default_page_size(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            current: None,
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Starter configuration written by `config init`
    pub fn example() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "default".to_string(),
            Profile {
                name: "default".to_string(),
                endpoint: "play.min.io".to_string(),
                access_key_id: "THISISKEYID".to_string(),
                secret_access_key: "THISISSECRETKEY".to_string(),
                use_ssl: true,
                signature: SignatureVersion::V4,
                region: "us-east-1".to_string(),
            },
        );
        profiles.insert(
            "example".to_string(),
            Profile {
                name: "example".to_string(),
                endpoint: "s3.example.com".to_string(),
                access_key_id: "EXAMPLEKEYID".to_string(),
                secret_access_key: "EXAMPLESECRETKEY".to_string(),
                use_ssl: true,
                signature: SignatureVersion::V4,
                region: "us-east-1".to_string(),
            },
        );

        Self {
            current: Some("default".to_string()),
            profiles,
            ..Self::default()
        }
    }
}

/// Configuration manager handles loading and saving config
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
                .join("s3ctl"),
        };
        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
        })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Whether the configuration file exists
    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    /// If the schema version doesn't match, attempts migration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)
            .map_err(|e| Error::local_io("read", &self.config_path, e))?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config)?;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade s3ctl.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        for (name, profile) in config.profiles.iter_mut() {
            profile.name.clone_from(name);
        }

        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories if they don't exist.
    /// Sets file permissions to 600 (owner read/write only).
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::local_io("create_dir", parent, e))?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)
            .map_err(|e| Error::local_io("write", &self.config_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }

    /// Write the starter configuration unless a file is already present
    ///
    /// Returns false when an existing file was left untouched.
    pub fn init_default(&self) -> Result<bool> {
        if self.exists() {
            return Ok(false);
        }
        self.save(&Config::example())?;
        tracing::info!(path = %self.config_path.display(), "created default configuration");
        Ok(true)
    }

    /// Migrate configuration from older schema version
    fn migrate(&self, mut config: Config) -> Result<Config> {
        tracing::debug!(
            from = config.schema_version,
            to = SCHEMA_VERSION,
            "migrating configuration"
        );
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}
