/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Engine defaults
pub const DEFAULT_PLAYLIST_EXTENSION: &str = "m3u8";
pub const DEFAULT_TEMP_SUFFIX: &str = ".tmp";
pub const DEFAULT_REJECT_DUPLICATE_NAMES: bool = false;

// Logging defaults
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_JSON: bool = false;

// Serde default functions
pub fn default_playlist_extension() -> String {
    DEFAULT_PLAYLIST_EXTENSION.to_string()
}

pub fn default_temp_suffix() -> String {
    DEFAULT_TEMP_SUFFIX.to_string()
}

pub fn default_reject_duplicate_names() -> bool {
    DEFAULT_REJECT_DUPLICATE_NAMES
}

pub fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

pub fn default_log_json() -> bool {
    DEFAULT_LOG_JSON
}
