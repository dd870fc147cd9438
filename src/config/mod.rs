use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

pub mod defaults;

use defaults::*;

/// What to do with a playlist that carries neither master nor variant tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguousPlaylistPolicy {
    /// Treat it as a variant (tolerant default)
    #[default]
    Variant,
    /// Fail the pass as malformed
    Reject,
}

/// Engine behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Extension identifying adaptive manifests, compared case-insensitively. Every
    /// engine-side playlist check goes through [`crate::playlist::Classifier`], which
    /// carries this value.
    #[serde(default = "default_playlist_extension")]
    pub playlist_extension: String,
    /// Suffix appended to temp files created next to a rewritten playlist
    #[serde(default = "default_temp_suffix")]
    pub temp_suffix: String,
    /// Policy for playlists matching neither tag set
    #[serde(default)]
    pub ambiguous_playlist: AmbiguousPlaylistPolicy,
    /// Reject any set where two tracks share a file name. When off, only references
    /// that match several tracks by name alone are rejected.
    #[serde(default = "default_reject_duplicate_names")]
    pub reject_duplicate_names: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default = "default_log_json")]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            playlist_extension: default_playlist_extension(),
            temp_suffix: default_temp_suffix(),
            ambiguous_playlist: AmbiguousPlaylistPolicy::default(),
            reject_duplicate_names: default_reject_duplicate_names(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_log_json(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when it does not exist.
    pub fn load_from_file<P: AsRef<Path>>(config_file: P) -> Result<Self> {
        let path = config_file.as_ref();
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            info!("Configuration loaded from: {}", path.display());
            Ok(config)
        } else {
            info!(
                "No config file at {}, using built-in defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }
}
