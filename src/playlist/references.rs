//! Reference extraction from playlist text.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use super::classifier::{Classifier, read_lossy};
use crate::errors::{EngineError, EngineResult};
use crate::paths;

/// A bare file reference: path characters ending in an extension.
static FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.\-/]+\.\w+$").expect("static file reference pattern")
});

/// `URI="..."` attribute on a tag line.
static URI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"URI="([^"]+)""#).expect("static URI attribute pattern"));

/// Tags whose `URI` attribute names another file in the set.
pub const URI_TAGS: [&str; 2] = ["#EXT-X-MAP:", "#EXT-X-MEDIA:"];

/// True if the line is one of the URI-bearing tags understood by the rewriter.
pub fn is_uri_tag(line: &str) -> bool {
    URI_TAGS.iter().any(|tag| {
        line.get(..tag.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(tag))
    })
}

/// Byte range and value of the `URI` attribute on a tag line.
pub(crate) fn uri_attribute_span(line: &str) -> Option<(std::ops::Range<usize>, &str)> {
    let group = URI_PATTERN.captures(line)?.get(1)?;
    Some((group.range(), group.as_str()))
}

/// Value of the `URI` attribute on a tag line, if any.
pub fn uri_attribute(line: &str) -> Option<&str> {
    uri_attribute_span(line).map(|(_, value)| value)
}

/// Distinct bare references in playlist text. Tag lines are ignored.
pub fn references_in(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| FILE_PATTERN.is_match(line))
        .map(str::to_string)
        .collect()
}

/// Distinct `URI` attribute values on `#EXT-X-MAP:` and `#EXT-X-MEDIA:` lines.
pub fn tag_uri_references(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .filter(|line| is_uri_tag(line))
        .filter_map(uri_attribute)
        .map(str::to_string)
        .collect()
}

/// Distinct bare references of a playlist file, exactly as written.
pub fn extract_references(playlist: &Path) -> EngineResult<BTreeSet<String>> {
    Ok(references_in(&read_lossy(playlist)?))
}

/// All files referenced by a playlist, following relative playlist references. Nested
/// playlists are recognised by the default manifest extension; see
/// [`Classifier::extract_referenced_files_recursive`] for a configured one.
pub fn extract_referenced_files_recursive(
    playlist: &Path,
    segments_only: bool,
) -> EngineResult<BTreeSet<String>> {
    Classifier::default().extract_referenced_files_recursive(playlist, segments_only)
}

impl Classifier {
    /// All files referenced by a playlist, following relative playlist references.
    ///
    /// Non-playlist references are always kept; playlist references only when
    /// `segments_only` is false. Nested playlists are read relative to the directory of
    /// the playlist that names them and contribute their segments. Absolute URLs are
    /// never followed. A playlist that references itself, directly or through others,
    /// is rejected as malformed.
    pub fn extract_referenced_files_recursive(
        &self,
        playlist: &Path,
        segments_only: bool,
    ) -> EngineResult<BTreeSet<String>> {
        let mut chain = Vec::new();
        let mut found = BTreeSet::new();
        collect_recursive(self, playlist, segments_only, &mut chain, &mut found)?;
        Ok(found)
    }
}

fn collect_recursive(
    classifier: &Classifier,
    playlist: &Path,
    segments_only: bool,
    chain: &mut Vec<PathBuf>,
    found: &mut BTreeSet<String>,
) -> EngineResult<()> {
    let canonical = playlist
        .canonicalize()
        .map_err(|e| EngineError::io(playlist, e))?;
    if chain.contains(&canonical) {
        return Err(EngineError::malformed(format!(
            "playlist reference cycle through {}",
            canonical.display()
        )));
    }
    chain.push(canonical);

    let references = extract_references(playlist)?;
    let (nested, segments): (Vec<String>, Vec<String>) =
        references.into_iter().partition(|r| classifier.is_playlist(r));

    found.extend(segments);
    if !segments_only {
        found.extend(nested.iter().cloned());
    }

    let directory = playlist.parent().unwrap_or_else(|| Path::new(""));
    for reference in &nested {
        if paths::is_absolute_url(reference) {
            debug!(reference = %reference, "external playlist reference not followed");
            continue;
        }
        let child = directory.join(reference);
        trace!(parent = %playlist.display(), child = %child.display(), "descending into playlist");
        collect_recursive(classifier, &child, true, chain, found)?;
    }

    chain.pop();
    Ok(())
}
