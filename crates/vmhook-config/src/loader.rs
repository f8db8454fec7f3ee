//! Configuration Loader
//!
//! Handles loading configuration and applying environment overrides.

use crate::debug::{DebugConfig, FilenameMatch, NextStrategy};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// File name searched for by [`ConfigLoader::load_from_directory`]
pub const CONFIG_FILE_NAME: &str = "vmhook.toml";

/// Configuration loader
///
/// Loads configuration and merges it with proper precedence:
/// 1. Defaults - lowest priority
/// 2. Project config (./vmhook.toml) - overrides defaults
/// 3. Environment variables (VMHOOK_*) - overrides project
pub struct ConfigLoader {
    /// Prefix for environment overrides
    env_prefix: String,
}

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Debug hook configuration
    pub debug: DebugConfig,

    /// Directory where vmhook.toml was found
    pub config_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            env_prefix: "VMHOOK".to_string(),
        }
    }

    /// Create a loader that reads overrides from `<prefix>_*` variables
    pub fn with_env_prefix(prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: prefix.into(),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find vmhook.toml. A missing file is not
    /// an error: defaults are used.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (config_root, debug) = self.find_config(start_dir)?;
        let debug = self.apply_env_overrides(debug)?;
        Ok(Config { debug, config_root })
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let debug = DebugConfig::load_from_file(config_path)?;
        let debug = self.apply_env_overrides(debug)?;
        Ok(Config {
            debug,
            config_root: config_path.parent().map(|p| p.to_path_buf()),
        })
    }

    /// Find configuration by walking up directory tree
    fn find_config(&self, start_dir: &Path) -> ConfigResult<(Option<PathBuf>, DebugConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let config = DebugConfig::load_from_file(&config_path)?;
                return Ok((Some(current), config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, DebugConfig::default())),
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Recognized variables:
    /// - `VMHOOK_FILENAME_MATCH=identity|content`
    /// - `VMHOOK_NEXT_STRATEGY=frame-index|depth-recount`
    /// - `VMHOOK_ENRICH_LISTINGS=true|false`
    pub fn apply_env_overrides(&self, mut config: DebugConfig) -> ConfigResult<DebugConfig> {
        if let Ok(mode) = env::var(self.var("FILENAME_MATCH")) {
            config = config.with_filename_match(mode.parse::<FilenameMatch>()?);
        }

        if let Ok(strategy) = env::var(self.var("NEXT_STRATEGY")) {
            config = config.with_next_strategy(strategy.parse::<NextStrategy>()?);
        }

        if let Ok(enrich) = env::var(self.var("ENRICH_LISTINGS")) {
            let enrich = match enrich.to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: "inspect.enrich_listings".to_string(),
                        reason: format!("expected a boolean, got '{}'", other),
                    })
                }
            };
            config = config.with_enriched_listings(enrich);
        }

        Ok(config)
    }

    fn var(&self, key: &str) -> String {
        format!("{}_{}", self.env_prefix, key)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Check if a config file was found
    pub fn has_file(&self) -> bool {
        self.config_root.is_some()
    }

    /// Directory containing the config file
    pub fn config_root(&self) -> Option<&Path> {
        self.config_root.as_deref()
    }
}
