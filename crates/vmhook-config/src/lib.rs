//! vmhook Configuration
//!
//! Configuration for the code-fetch debug hook:
//! - Location tracking (`[tracker]`)
//! - Step predicates (`[stepping]`)
//! - Variable inspection output (`[inspect]`)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Project config (./vmhook.toml, searched upward from the start directory)
//! 3. Environment variables (VMHOOK_*)
//!
//! # Example
//!
//! ```no_run
//! use vmhook_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("{:?}", config.debug.next_strategy());
//! ```

pub mod debug;
pub mod loader;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use debug::{DebugConfig, FilenameMatch, InspectConfig, NextStrategy, SteppingConfig, TrackerConfig};
pub use loader::{Config, ConfigLoader, CONFIG_FILE_NAME};
