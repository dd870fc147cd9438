//! Playlist role classification.
//!
//! A file is a playlist at all only if its extension is the manifest extension
//! (case-insensitive). Playlist content is then scanned for two disjoint tag sets:
//!
//! - master tags: `#EXT-X-MEDIA:`, `#EXT-X-STREAM-INF:`, `#EXT-X-I-FRAME-STREAM-INF:`,
//!   `#EXT-X-SESSION-DATA:`
//! - variant tags: `#EXT-X-MAP:`, `#EXT-X-TARGETDURATION:`, `#EXTINF`, `#EXT-X-BYTERANGE:`
//!
//! Master tags win. A playlist with neither is ambiguous and the caller's
//! [`AmbiguousPlaylistPolicy`] decides.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::defaults::DEFAULT_PLAYLIST_EXTENSION;
use crate::config::{AmbiguousPlaylistPolicy, EngineConfig};
use crate::errors::{EngineError, EngineResult};

pub const MASTER_TAGS: [&str; 4] = [
    "#EXT-X-MEDIA:",
    "#EXT-X-STREAM-INF:",
    "#EXT-X-I-FRAME-STREAM-INF:",
    "#EXT-X-SESSION-DATA:",
];

pub const VARIANT_TAGS: [&str; 4] = [
    "#EXT-X-MAP:",
    "#EXT-X-TARGETDURATION:",
    "#EXTINF",
    "#EXT-X-BYTERANGE:",
];

static MASTER_PATTERN: LazyLock<Regex> = LazyLock::new(|| tag_prefix_pattern(&MASTER_TAGS));
static VARIANT_PATTERN: LazyLock<Regex> = LazyLock::new(|| tag_prefix_pattern(&VARIANT_TAGS));

fn tag_prefix_pattern(tags: &[&str]) -> Regex {
    let alternatives: Vec<String> = tags.iter().map(|t| regex::escape(t)).collect();
    Regex::new(&format!(r"(?i)^\s*(?:{})", alternatives.join("|")))
        .expect("tag prefixes are escaped literals")
}

/// Role of a track inside an adaptive set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistRole {
    /// Top-level playlist listing variant playlists
    Master,
    /// Media playlist listing segments
    Variant,
    /// Raw media, never parsed
    Segment,
}

impl PlaylistRole {
    pub fn is_playlist(self) -> bool {
        !matches!(self, PlaylistRole::Segment)
    }
}

/// True if any line starts with a master-indicating tag.
pub fn is_master_content(content: &str) -> bool {
    content.lines().any(|line| MASTER_PATTERN.is_match(line))
}

/// True if any line starts with a variant-indicating tag.
pub fn is_variant_content(content: &str) -> bool {
    content.lines().any(|line| VARIANT_PATTERN.is_match(line))
}

/// True if `name` carries the default manifest extension. Use
/// [`Classifier::is_playlist`] where the extension is configured.
pub fn is_playlist(name: &str) -> bool {
    has_extension(name, DEFAULT_PLAYLIST_EXTENSION)
}

fn has_extension(name: &str, extension: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Read a manifest for tag scanning. Invalid UTF-8 is tolerated here; scanning only
/// looks at ASCII tag prefixes.
pub(crate) fn read_lossy(path: &Path) -> EngineResult<String> {
    let bytes = std::fs::read(path).map_err(|e| EngineError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Master playlist check on a file with the default extension.
pub fn check_for_master(path: &Path) -> EngineResult<bool> {
    Classifier::default().check_for_master(path)
}

/// Variant playlist check on a file with the default extension.
pub fn check_for_variant(path: &Path) -> EngineResult<bool> {
    Classifier::default().check_for_variant(path)
}

/// Configured classifier (extension + ambiguity policy).
#[derive(Debug, Clone)]
pub struct Classifier {
    extension: String,
    ambiguous: AmbiguousPlaylistPolicy,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Classifier {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            extension: config.playlist_extension.trim_start_matches('.').to_string(),
            ambiguous: config.ambiguous_playlist,
        }
    }

    pub fn is_playlist(&self, name: &str) -> bool {
        has_extension(name, &self.extension)
    }

    /// Master playlist check on a file. Non-playlists are never masters.
    pub fn check_for_master(&self, path: &Path) -> EngineResult<bool> {
        if !self.is_playlist(&path.to_string_lossy()) {
            return Ok(false);
        }
        Ok(is_master_content(&read_lossy(path)?))
    }

    /// Variant playlist check on a file. Non-playlists are never variants.
    pub fn check_for_variant(&self, path: &Path) -> EngineResult<bool> {
        if !self.is_playlist(&path.to_string_lossy()) {
            return Ok(false);
        }
        Ok(is_variant_content(&read_lossy(path)?))
    }

    /// Classify from a name and the file content.
    ///
    /// Returns `None` for a playlist that matches neither tag set.
    pub fn classify_content(&self, name: &str, content: &str) -> Option<PlaylistRole> {
        if !self.is_playlist(name) {
            return Some(PlaylistRole::Segment);
        }
        if is_master_content(content) {
            Some(PlaylistRole::Master)
        } else if is_variant_content(content) {
            Some(PlaylistRole::Variant)
        } else {
            None
        }
    }

    /// Classify a file on disk, applying the ambiguity policy.
    ///
    /// Segments are recognised by name alone and never opened.
    pub fn classify_file(&self, path: &Path) -> EngineResult<PlaylistRole> {
        let name = path.to_string_lossy();
        if !self.is_playlist(&name) {
            return Ok(PlaylistRole::Segment);
        }
        let content = read_lossy(path)?;
        match self.classify_content(&name, &content) {
            Some(role) => Ok(role),
            None => match self.ambiguous {
                AmbiguousPlaylistPolicy::Variant => {
                    debug!(
                        path = %path.display(),
                        "playlist carries no master or variant tags, treating as variant"
                    );
                    Ok(PlaylistRole::Variant)
                }
                AmbiguousPlaylistPolicy::Reject => Err(EngineError::malformed(format!(
                    "playlist {} carries neither master nor variant tags",
                    path.display()
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    const MASTER: &str = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nv1.m3u8\n";
    const VARIANT: &str = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:10.0,\nseg1.mp4\n";

    #[rstest]
    #[case("playlist.m3u8", true)]
    #[case("PLAYLIST.M3U8", true)]
    #[case("dir/sub/variant_0.m3u8", true)]
    #[case("file_0.mp4", false)]
    #[case("playlist.m3u", false)]
    #[case("m3u8", false)]
    fn test_is_playlist(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_playlist(name), expected);
    }

    #[rstest]
    #[case("#EXT-X-MEDIA:TYPE=AUDIO,URI=\"a.m3u8\"")]
    #[case("#EXT-X-STREAM-INF:BANDWIDTH=1")]
    #[case("#ext-x-i-frame-stream-inf:URI=\"i.m3u8\"")]
    #[case("#EXT-X-SESSION-DATA:DATA-ID=\"x\"")]
    fn test_master_tags(#[case] line: &str) {
        assert!(is_master_content(line));
        assert!(!is_variant_content(line));
    }

    #[rstest]
    #[case("#EXT-X-MAP:URI=\"init.mp4\"")]
    #[case("#EXT-X-TARGETDURATION:10")]
    #[case("#EXTINF:9.97,")]
    #[case("#ext-x-byterange:1325@0")]
    fn test_variant_tags(#[case] line: &str) {
        assert!(is_variant_content(line));
        assert!(!is_master_content(line));
    }

    #[test]
    fn test_media_sequence_is_not_a_master_tag() {
        assert!(!is_master_content("#EXT-X-MEDIA-SEQUENCE:0"));
    }

    #[test]
    fn test_tag_must_prefix_the_line() {
        assert!(!is_master_content("seg#EXT-X-STREAM-INF:.mp4"));
    }

    #[test]
    fn test_classify_content() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify_content("master.m3u8", MASTER),
            Some(PlaylistRole::Master)
        );
        assert_eq!(
            classifier.classify_content("v1.m3u8", VARIANT),
            Some(PlaylistRole::Variant)
        );
        assert_eq!(
            classifier.classify_content("seg1.mp4", MASTER),
            Some(PlaylistRole::Segment)
        );
        assert_eq!(classifier.classify_content("empty.m3u8", "#EXTM3U\n"), None);
    }

    #[test]
    fn test_master_wins_over_variant_tags() {
        let mixed = format!("{MASTER}{VARIANT}");
        assert_eq!(
            Classifier::default().classify_content("mixed.m3u8", &mixed),
            Some(PlaylistRole::Master)
        );
    }

    #[test]
    fn test_ambiguous_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.m3u8");
        std::fs::write(&path, "#EXTM3U\nclip.mp4\n").unwrap();

        let tolerant = Classifier::default();
        assert_eq!(tolerant.classify_file(&path).unwrap(), PlaylistRole::Variant);

        let strict = Classifier::new(&EngineConfig {
            ambiguous_playlist: AmbiguousPlaylistPolicy::Reject,
            ..EngineConfig::default()
        });
        assert!(strict.classify_file(&path).unwrap_err().is_malformed());
    }

    #[test]
    fn test_unreadable_playlist_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Classifier::default()
            .classify_file(&dir.path().join("missing.m3u8"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }

    #[test]
    fn test_segment_file_is_not_opened() {
        let dir = tempfile::tempdir().unwrap();
        let role = Classifier::default()
            .classify_file(&dir.path().join("missing.mp4"))
            .unwrap();
        assert_eq!(role, PlaylistRole::Segment);
    }

    #[test]
    fn test_check_for_master_and_variant() {
        let dir = tempfile::tempdir().unwrap();
        let master = dir.path().join("master.m3u8");
        let variant = dir.path().join("variant_0.m3u8");
        let segment = dir.path().join("file_0.mp4");
        std::fs::write(&master, MASTER).unwrap();
        std::fs::write(&variant, VARIANT).unwrap();
        std::fs::write(&segment, b"\x00\x00\x00\x18ftyp").unwrap();

        assert!(check_for_master(&master).unwrap());
        assert!(!check_for_master(&variant).unwrap());
        assert!(check_for_variant(&variant).unwrap());
        assert!(!check_for_master(&segment).unwrap());
        assert!(!check_for_variant(&segment).unwrap());
    }

    #[test]
    fn test_configured_extension_drives_file_checks() {
        let dir = tempfile::tempdir().unwrap();
        let master = dir.path().join("master.m3u");
        let variant = dir.path().join("v1.m3u");
        std::fs::write(&master, MASTER).unwrap();
        std::fs::write(&variant, VARIANT).unwrap();

        let classifier = Classifier::new(&EngineConfig {
            playlist_extension: ".m3u".to_string(),
            ..EngineConfig::default()
        });
        assert!(classifier.is_playlist("v1.M3U"));
        assert!(!classifier.is_playlist("v1.m3u8"));
        assert!(classifier.check_for_master(&master).unwrap());
        assert!(classifier.check_for_variant(&variant).unwrap());
        assert_eq!(classifier.classify_file(&variant).unwrap(), PlaylistRole::Variant);

        // the free functions only know the default extension
        assert!(!check_for_master(&master).unwrap());
    }

    proptest! {
        #[test]
        fn classification_is_idempotent(lines in proptest::collection::vec("(#EXT[-A-Z:]{0,24})?[a-z0-9_.]{0,12}", 0..12)) {
            let content = lines.join("\n");
            let classifier = Classifier::default();
            let first = classifier.classify_content("p.m3u8", &content);
            let second = classifier.classify_content("p.m3u8", &content);
            prop_assert_eq!(first, second);
        }
    }
}
