//! Debug hook configuration (vmhook.toml)
//!
//! Every section and key is optional; accessors fall back to the defaults
//! documented on each field.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Debug hook configuration from vmhook.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Location tracker settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker: Option<TrackerConfig>,

    /// Step predicate settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stepping: Option<SteppingConfig>,

    /// Variable inspection settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspect: Option<InspectConfig>,
}

/// Location tracker settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct TrackerConfig {
    /// How filenames are compared (default: content)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename_match: Option<FilenameMatch>,
}

/// Step predicate settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SteppingConfig {
    /// Depth test used by `check_next` (default: depth-recount)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_strategy: Option<NextStrategy>,
}

/// Variable inspection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct InspectConfig {
    /// Render name/value/type records for "all" queries instead of bare
    /// names (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrich_listings: Option<bool>,
}

/// Filename equality used when deciding whether the location changed.
///
/// Handle identity is always tried first. `Content` additionally compares
/// the filename text, which is required when the host does not intern
/// filenames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FilenameMatch {
    /// Handle identity only.
    Identity,
    /// Handle identity, then text.
    #[default]
    Content,
}

/// How `check_next` decides that execution has not descended below the
/// armed frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NextStrategy {
    /// Compare raw call-stack indices. O(1), counts native frames.
    FrameIndex,
    /// Recount interpreted frames with a resolvable line. O(frames).
    #[default]
    DepthRecount,
}

impl FromStr for FilenameMatch {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "identity" => Ok(FilenameMatch::Identity),
            "content" => Ok(FilenameMatch::Content),
            other => Err(ConfigError::InvalidValue {
                field: "tracker.filename_match".to_string(),
                reason: format!("expected 'identity' or 'content', got '{}'", other),
            }),
        }
    }
}

impl FromStr for NextStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "frame-index" => Ok(NextStrategy::FrameIndex),
            "depth-recount" => Ok(NextStrategy::DepthRecount),
            other => Err(ConfigError::InvalidValue {
                field: "stepping.next_strategy".to_string(),
                reason: format!("expected 'frame-index' or 'depth-recount', got '{}'", other),
            }),
        }
    }
}

impl fmt::Display for FilenameMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilenameMatch::Identity => write!(f, "identity"),
            FilenameMatch::Content => write!(f, "content"),
        }
    }
}

impl fmt::Display for NextStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextStrategy::FrameIndex => write!(f, "frame-index"),
            NextStrategy::DepthRecount => write!(f, "depth-recount"),
        }
    }
}

impl DebugConfig {
    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::TomlParseError { error, .. } => ConfigError::TomlParseError {
                file: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: Path::new("<inline>").to_path_buf(),
            error: e,
        })
    }

    /// Effective filename comparison mode
    pub fn filename_match(&self) -> FilenameMatch {
        self.tracker
            .as_ref()
            .and_then(|t| t.filename_match)
            .unwrap_or_default()
    }

    /// Effective `check_next` strategy
    pub fn next_strategy(&self) -> NextStrategy {
        self.stepping
            .as_ref()
            .and_then(|s| s.next_strategy)
            .unwrap_or_default()
    }

    /// Whether "all" inspection queries render full records
    pub fn enrich_listings(&self) -> bool {
        self.inspect
            .as_ref()
            .and_then(|i| i.enrich_listings)
            .unwrap_or(false)
    }

    /// Builder-style override for the filename comparison mode
    pub fn with_filename_match(mut self, mode: FilenameMatch) -> Self {
        self.tracker.get_or_insert_with(Default::default).filename_match = Some(mode);
        self
    }

    /// Builder-style override for the `check_next` strategy
    pub fn with_next_strategy(mut self, strategy: NextStrategy) -> Self {
        self.stepping.get_or_insert_with(Default::default).next_strategy = Some(strategy);
        self
    }

    /// Builder-style override for listing enrichment
    pub fn with_enriched_listings(mut self, enrich: bool) -> Self {
        self.inspect.get_or_insert_with(Default::default).enrich_listings = Some(enrich);
        self
    }
}
