//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use hls_relink::errors::{EngineError, EngineResult};
use hls_relink::package::{FsPackage, PackageContainer, StorageResolver, Track, TrackCopier, TrackId};
use hls_relink::playlist::{is_playlist, references_in, tag_uri_references};
use sha2::{Digest, Sha256};

pub const MASTER: &str = "#EXTM3U\n#EXT-X-VERSION:7\n#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\nv1.m3u8\n";
pub const VARIANT: &str =
    "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:0\n#EXTINF:10.0,\nseg1.mp4\n#EXT-X-ENDLIST\n";

/// Write files under a fresh temp directory and load it as a package.
pub fn package(files: &[(&str, &[u8])]) -> (tempfile::TempDir, FsPackage) {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    let package = FsPackage::builder()
        .base_directory(dir.path())
        .scan(true)
        .build()
        .unwrap();
    (dir, package)
}

/// Relative path → sha256 of every file under `dir`.
pub fn snapshot(dir: &Path) -> BTreeMap<String, String> {
    let mut hashes = BTreeMap::new();
    collect(dir, dir, &mut hashes);
    hashes
}

fn collect(base: &Path, dir: &Path, hashes: &mut BTreeMap<String, String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(base, &path, hashes);
        } else {
            let relative = path.strip_prefix(base).unwrap().to_string_lossy().into_owned();
            let digest = Sha256::digest(fs::read(&path).unwrap());
            hashes.insert(relative, hex::encode(digest));
        }
    }
}

/// Every file reachable from `playlist` by following references on disk. Panics on a
/// dangling reference.
pub fn reachable(playlist: &Path) -> BTreeSet<PathBuf> {
    let mut found = BTreeSet::new();
    walk(playlist, &mut found);
    found
}

fn walk(playlist: &Path, found: &mut BTreeSet<PathBuf>) {
    let content = fs::read_to_string(playlist).unwrap();
    let dir = playlist.parent().unwrap();
    let mut references = references_in(&content);
    references.extend(tag_uri_references(&content));
    for reference in references {
        let target = dir.join(&reference);
        assert!(
            target.exists(),
            "{} references missing {reference}",
            playlist.display()
        );
        let target = target.canonicalize().unwrap();
        if found.insert(target.clone()) && is_playlist(&reference) {
            walk(&target, found);
        }
    }
}

/// Package wrapper whose copier renames the first copy and fails every later one.
pub struct RenamingCopier {
    pub inner: FsPackage,
    pub rename_to: String,
    calls: usize,
}

impl RenamingCopier {
    pub fn new(inner: FsPackage, rename_to: &str) -> Self {
        Self {
            inner,
            rename_to: rename_to.to_string(),
            calls: 0,
        }
    }
}

impl StorageResolver for RenamingCopier {
    fn resolve(&self, uri: &str) -> EngineResult<PathBuf> {
        self.inner.resolve(uri)
    }
}

impl PackageContainer for RenamingCopier {
    fn tracks(&self) -> Vec<Track> {
        self.inner.tracks()
    }

    fn add(&mut self, track: Track) -> EngineResult<()> {
        self.inner.add(track)
    }

    fn remove(&mut self, id: TrackId) -> EngineResult<()> {
        self.inner.remove(id)
    }
}

impl TrackCopier for RenamingCopier {
    fn copy_with_file(&mut self, file: &Path, template: &Track) -> EngineResult<Track> {
        self.calls += 1;
        if self.calls > 1 {
            return Err(EngineError::io(
                file,
                std::io::Error::other("simulated storage failure"),
            ));
        }
        let mut renamed = template.clone();
        renamed.uri = self.rename_to.clone();
        self.inner.copy_with_file(file, &renamed)
    }
}
