//! Line-by-line playlist rewriting.
//!
//! - blank lines are dropped, every kept line is terminated with `\n`
//! - tag lines pass through untouched, except `#EXT-X-MAP:` / `#EXT-X-MEDIA:` whose
//!   `URI` attribute is substituted when it is mapped
//! - reference lines are trimmed and looked up by full value, then by file name; a
//!   file-name hit keeps the reference's directory part
//!
//! Unmapped references are never an error: they are written unchanged, logged and
//! listed in [`RewriteOutcome::unresolved`].

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info};

use super::classifier::Classifier;
use super::reference_map::ReferenceMap;
use super::references::{is_uri_tag, uri_attribute_span};
use super::swap::TempSwap;
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult, RewriteError, RewriteResult};
use crate::paths;

/// What a rewrite did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteOutcome {
    /// Lines written
    pub lines: usize,
    /// References found in the map
    pub substituted: usize,
    /// References not found in the map, in order of first appearance
    pub unresolved: Vec<String>,
}

impl RewriteOutcome {
    /// Rewrite one line, or `None` if the line is dropped.
    fn apply<'a>(&mut self, line: &'a str, map: &ReferenceMap) -> Option<Cow<'a, str>> {
        if line.trim().is_empty() {
            return None;
        }
        self.lines += 1;

        if line.starts_with('#') {
            if !is_uri_tag(line) {
                return Some(Cow::Borrowed(line));
            }
            let Some((range, value)) = uri_attribute_span(line) else {
                return Some(Cow::Borrowed(line));
            };
            return match map.get(value) {
                Some(new) => {
                    self.substituted += 1;
                    let mut out = String::with_capacity(line.len() + new.len());
                    out.push_str(&line[..range.start]);
                    out.push_str(new);
                    out.push_str(&line[range.end..]);
                    Some(Cow::Owned(out))
                }
                None => {
                    self.unresolved(value);
                    Some(Cow::Borrowed(line))
                }
            };
        }

        let reference = line.trim();
        if let Some(new) = map.get(reference) {
            self.substituted += 1;
            return Some(Cow::Owned(new.to_string()));
        }
        let by_name = if paths::is_absolute_url(reference) {
            None
        } else {
            map.get(paths::file_name(reference))
        };
        if let Some(new) = by_name {
            self.substituted += 1;
            let directory = paths::directory_of(reference);
            let rewritten = if directory.is_empty() {
                new.to_string()
            } else {
                paths::join(directory, new)
            };
            return Some(Cow::Owned(rewritten));
        }
        self.unresolved(reference);
        Some(Cow::Borrowed(reference))
    }

    fn unresolved(&mut self, reference: &str) {
        if !self.unresolved.iter().any(|r| r == reference) {
            debug!(reference = %reference, "unresolved reference left unchanged");
            self.unresolved.push(reference.to_string());
        }
    }
}

/// Rewrite playlist text in memory.
pub fn rewrite_str(content: &str, map: &ReferenceMap) -> (String, RewriteOutcome) {
    let mut outcome = RewriteOutcome::default();
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        if let Some(text) = outcome.apply(line, map) {
            out.push_str(&text);
            out.push('\n');
        }
    }
    (out, outcome)
}

/// Rewrite `source` into `dest` (truncated first).
///
/// The source must be valid UTF-8; it is never written to. On error `dest` may hold a
/// partial result and the caller must treat it as garbage.
pub fn rewrite(source: &Path, dest: &Path, map: &ReferenceMap) -> RewriteResult<RewriteOutcome> {
    let input = File::open(source).map_err(|e| RewriteError::io(source, e))?;
    let output = File::create(dest).map_err(|e| RewriteError::io(dest, e))?;
    let mut writer = BufWriter::new(output);
    let mut outcome = RewriteOutcome::default();

    for line in BufReader::new(input).lines() {
        let line = line.map_err(|e| RewriteError::io(source, e))?;
        if let Some(text) = outcome.apply(&line, map) {
            writer
                .write_all(text.as_bytes())
                .and_then(|()| writer.write_all(b"\n"))
                .map_err(|e| RewriteError::io(dest, e))?;
        }
    }

    writer.flush().map_err(|e| RewriteError::io(dest, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| RewriteError::io(dest, e))?;

    debug!(
        source = %source.display(),
        dest = %dest.display(),
        lines = outcome.lines,
        substituted = outcome.substituted,
        unresolved = outcome.unresolved.len(),
        "playlist rewritten"
    );
    Ok(outcome)
}

/// Rewrite a playlist in place through a temp-file swap.
///
/// On failure the original content is put back before the error is returned.
pub fn rewrite_in_place(
    playlist: &Path,
    map: &ReferenceMap,
    temp_suffix: &str,
) -> RewriteResult<RewriteOutcome> {
    let swap = TempSwap::acquire(playlist, temp_suffix)?;
    match rewrite(swap.backup(), playlist, map) {
        Ok(outcome) => {
            swap.commit();
            Ok(outcome)
        }
        Err(e) => {
            error!(playlist = %playlist.display(), error = %e, "failed to rewrite playlist");
            if let Err(restore) = swap.restore() {
                error!(playlist = %playlist.display(), error = %restore, "backup restore failed");
            }
            Err(e)
        }
    }
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // rename fails across filesystems
    fs::copy(from, to)?;
    fs::remove_file(from)
}

/// Move a batch of files, then rewrite every moved playlist so references to the old
/// file names point at the new ones. Existing destinations are replaced.
pub fn relink_files(
    moves: &[(PathBuf, PathBuf)],
    config: &EngineConfig,
) -> EngineResult<Vec<PathBuf>> {
    let classifier = Classifier::new(config);
    for (from, to) in moves {
        if from == to {
            continue;
        }
        debug!(from = %from.display(), to = %to.display(), "moving file");
        if to.exists() {
            fs::remove_file(to).map_err(|e| EngineError::io(to, e))?;
        }
        move_file(from, to).map_err(|e| EngineError::io(from, e))?;
    }

    let names: ReferenceMap = moves
        .iter()
        .filter_map(|(from, to)| {
            Some((
                from.file_name()?.to_string_lossy().into_owned(),
                to.file_name()?.to_string_lossy().into_owned(),
            ))
        })
        .collect();

    for (_, to) in moves {
        if classifier.is_playlist(&to.to_string_lossy()) {
            rewrite_in_place(to, &names, &config.temp_suffix).map_err(EngineError::from)?;
        }
    }
    info!(files = moves.len(), "relinked files");
    Ok(moves.iter().map(|(_, to)| to.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::references::references_in;
    use proptest::prelude::*;

    const VARIANT: &str = "#EXTM3U\r\n\
#EXT-X-TARGETDURATION:10\r\n\
#EXT-X-MAP:URI=\"init_0.mp4\",BYTERANGE=\"1325@0\"\r\n\
\r\n\
#EXTINF:9.9,\r\n\
  file_0.mp4  \r\n\
#EXT-X-CUSTOM-VENDOR:keep=me exactly\r\n\
#EXTINF:9.9,\r\n\
media/file_1.mp4\r\n";

    #[test]
    fn test_empty_map_keeps_non_blank_content() {
        let (out, outcome) = rewrite_str(VARIANT, &ReferenceMap::new());
        let expected: Vec<&str> = VARIANT
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| if l.starts_with('#') { l } else { l.trim() })
            .collect();
        assert_eq!(out.lines().collect::<Vec<_>>(), expected);
        assert_eq!(outcome.substituted, 0);
        assert_eq!(outcome.lines, 8);
    }

    #[test]
    fn test_full_and_name_lookup() {
        let map: ReferenceMap = [
            ("file_0.mp4", "../seg/file_0.mp4"),
            ("file_1.mp4", "renamed_1.mp4"),
            ("init_0.mp4", "../init/init_0.mp4"),
        ]
        .into_iter()
        .collect();
        let (out, outcome) = rewrite_str(VARIANT, &map);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines.contains(&"../seg/file_0.mp4"));
        // directory part of the original reference is kept on a name-only hit
        assert!(lines.contains(&"media/renamed_1.mp4"));
        assert!(lines.contains(&"#EXT-X-MAP:URI=\"../init/init_0.mp4\",BYTERANGE=\"1325@0\""));
        assert!(lines.contains(&"#EXT-X-CUSTOM-VENDOR:keep=me exactly"));
        assert_eq!(outcome.substituted, 3);
        assert!(outcome.unresolved.is_empty());
    }

    #[test]
    fn test_name_hit_with_relative_value_is_normalized() {
        let map: ReferenceMap = [("a.ts", "../x/a.ts")].into_iter().collect();
        let (out, _) = rewrite_str("sub/a.ts\n", &map);
        assert_eq!(out, "x/a.ts\n");
    }

    #[test]
    fn test_media_tag_uri_is_rewritten() {
        let map: ReferenceMap = [("audio/en.m3u8", "../9f/en.m3u8")].into_iter().collect();
        let (out, _) = rewrite_str(
            "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",URI=\"audio/en.m3u8\"\n",
            &map,
        );
        assert_eq!(
            out,
            "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",URI=\"../9f/en.m3u8\"\n"
        );
    }

    #[test]
    fn test_other_uri_tags_untouched() {
        let map: ReferenceMap = [("k.key", "other.key")].into_iter().collect();
        let line = "#EXT-X-KEY:METHOD=AES-128,URI=\"k.key\"\n";
        assert_eq!(rewrite_str(line, &map).0, line);
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_unresolved_reference_is_logged_not_fatal() {
        let map: ReferenceMap = [("known.ts", "k.ts")].into_iter().collect();
        let (out, outcome) = rewrite_str("unknown.ts\nknown.ts\nunknown.ts\n", &map);
        assert_eq!(out, "unknown.ts\nk.ts\nunknown.ts\n");
        assert_eq!(outcome.unresolved, vec!["unknown.ts".to_string()]);
        assert!(logs_contain("unresolved reference left unchanged"));
    }

    #[test]
    fn test_rewrite_file_to_dest() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("variant_0.m3u8");
        let dest = dir.path().join("out.m3u8");
        fs::write(&src, VARIANT).unwrap();

        let map: ReferenceMap = [("file_0.mp4", "f0.mp4")].into_iter().collect();
        rewrite(&src, &dest, &map).unwrap();

        assert_eq!(fs::read_to_string(&src).unwrap(), VARIANT);
        assert!(references_in(&fs::read_to_string(&dest).unwrap()).contains("f0.mp4"));
    }

    #[test]
    fn test_unreadable_source_leaves_dest_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.m3u8");
        fs::write(&dest, "keep").unwrap();
        let err = rewrite(&dir.path().join("missing.m3u8"), &dest, &ReferenceMap::new());
        assert!(matches!(err, Err(RewriteError::Io { .. })));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "keep");
    }

    #[test]
    fn test_in_place_failure_restores_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.m3u8");
        let bytes = b"#EXTM3U\nseg.ts\n\xff\xfe\n".to_vec();
        fs::write(&path, &bytes).unwrap();

        let map: ReferenceMap = [("seg.ts", "x.ts")].into_iter().collect();
        assert!(rewrite_in_place(&path, &map, ".tmp").is_err());
        assert_eq!(fs::read(&path).unwrap(), bytes);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_in_place_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.m3u8");
        fs::write(&path, "#EXTM3U\nseg.ts\n").unwrap();
        let map: ReferenceMap = [("seg.ts", "../a/seg.ts")].into_iter().collect();
        rewrite_in_place(&path, &map, ".tmp").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "#EXTM3U\n../a/seg.ts\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_relink_files_renames_and_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        fs::write(
            d.join("master.m3u8"),
            "#EXT-X-STREAM-INF:BANDWIDTH=1\nvariant_0.m3u8\n",
        )
        .unwrap();
        fs::write(
            d.join("variant_0.m3u8"),
            "#EXT-X-TARGETDURATION:10\n#EXTINF:10,\nfile_0.mp4\n",
        )
        .unwrap();
        fs::write(d.join("file_0.mp4"), b"media").unwrap();

        let moves = vec![
            (d.join("master.m3u8"), d.join("m-1.m3u8")),
            (d.join("variant_0.m3u8"), d.join("v-1.m3u8")),
            (d.join("file_0.mp4"), d.join("f-1.mp4")),
        ];
        let moved = relink_files(&moves, &EngineConfig::default()).unwrap();
        assert_eq!(moved.len(), 3);

        assert!(references_in(&fs::read_to_string(d.join("m-1.m3u8")).unwrap()).contains("v-1.m3u8"));
        assert!(references_in(&fs::read_to_string(d.join("v-1.m3u8")).unwrap()).contains("f-1.mp4"));
        assert!(!d.join("file_0.mp4").exists());
    }

    #[test]
    fn test_relink_files_honours_configured_extension() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        fs::write(d.join("v.m3u"), "#EXT-X-TARGETDURATION:10\nfile_0.ts\n").unwrap();
        fs::write(d.join("file_0.ts"), b"media").unwrap();

        let config = EngineConfig {
            playlist_extension: "m3u".to_string(),
            ..EngineConfig::default()
        };
        let moves = vec![
            (d.join("v.m3u"), d.join("v-1.m3u")),
            (d.join("file_0.ts"), d.join("f-1.ts")),
        ];
        relink_files(&moves, &config).unwrap();
        assert_eq!(
            fs::read_to_string(d.join("v-1.m3u")).unwrap(),
            "#EXT-X-TARGETDURATION:10\nf-1.ts\n"
        );
    }

    proptest! {
        #[test]
        fn noop_rewrite_preserves_non_blank_lines(lines in proptest::collection::vec("(#EXT[A-Z:=-]{0,16})?[a-z0-9_./]{0,12}", 0..16)) {
            let content = lines.join("\n");
            let (out, _) = rewrite_str(&content, &ReferenceMap::new());
            let expected: Vec<&str> = content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| if l.starts_with('#') { l } else { l.trim() })
                .collect();
            prop_assert_eq!(out.lines().collect::<Vec<_>>(), expected);
        }
    }
}
