//! Directory-backed package implementing all three collaborators.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::collaborators::{PackageContainer, StorageResolver, TrackCopier};
use super::sandbox::{validate_path_within_sandbox, validate_uri};
use super::track::{Track, TrackId};
use crate::errors::{EngineError, EngineResult};

/// A package whose tracks are files under one base directory.
///
/// URIs are paths relative to the base directory. New tracks created by the copier
/// are stored as `<base>/<track id>/<file name>`.
#[derive(Debug, Clone)]
pub struct FsPackage {
    base_dir: PathBuf,
    tracks: Vec<Track>,
}

impl FsPackage {
    #[must_use]
    pub fn builder() -> FsPackageBuilder {
        FsPackageBuilder::new()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Track by id.
    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Track by package URI.
    pub fn find_by_uri(&self, uri: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.uri == uri)
    }

    fn uri_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_dir).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    fn scan_dir(&self, dir: &Path, found: &mut Vec<Track>) -> EngineResult<()> {
        let entries = fs::read_dir(dir).map_err(|e| EngineError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::io(dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| EngineError::io(&path, e))?;
            if file_type.is_dir() {
                self.scan_dir(&path, found)?;
            } else if file_type.is_file() {
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                if hidden {
                    continue;
                }
                if let Some(uri) = self.uri_for(&path) {
                    found.push(Track::new(uri));
                }
            }
        }
        Ok(())
    }
}

impl StorageResolver for FsPackage {
    fn resolve(&self, uri: &str) -> EngineResult<PathBuf> {
        validate_uri(uri)?;
        let path = self.base_dir.join(uri);
        validate_path_within_sandbox(&path, &self.base_dir)?;
        Ok(path)
    }
}

impl PackageContainer for FsPackage {
    fn tracks(&self) -> Vec<Track> {
        self.tracks.clone()
    }

    fn add(&mut self, track: Track) -> EngineResult<()> {
        match self.tracks.iter_mut().find(|t| t.id == track.id) {
            Some(existing) => *existing = track,
            None => {
                debug!(track = %track.id, uri = %track.uri, "track added");
                self.tracks.push(track);
            }
        }
        Ok(())
    }

    fn remove(&mut self, id: TrackId) -> EngineResult<()> {
        let Some(pos) = self.tracks.iter().position(|t| t.id == id) else {
            return Ok(());
        };
        let path = self.resolve(&self.tracks[pos].uri)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(EngineError::io(&path, e)),
        }
        // drop the per-track directory once it is empty
        if let Some(parent) = path.parent()
            && parent != self.base_dir.as_path()
            && fs::read_dir(parent).is_ok_and(|mut entries| entries.next().is_none())
            && let Err(e) = fs::remove_dir(parent)
        {
            warn!(dir = %parent.display(), error = %e, "could not remove empty track directory");
        }
        let removed = self.tracks.remove(pos);
        debug!(track = %removed.id, uri = %removed.uri, "track removed");
        Ok(())
    }
}

impl TrackCopier for FsPackage {
    fn copy_with_file(&mut self, file: &Path, template: &Track) -> EngineResult<Track> {
        let id = TrackId::new();
        let uri = format!("{id}/{}", template.file_name());
        let dest = self.resolve(&uri)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }
        fs::copy(file, &dest).map_err(|e| EngineError::io(file, e))?;
        debug!(from = %file.display(), to = %dest.display(), "copied file into new track");

        Ok(Track {
            id,
            uri,
            logical_name: template.logical_name.clone(),
            refers_to: template.refers_to,
            role: template.role,
            flavor: template.flavor.clone(),
            tags: template.tags.clone(),
        })
    }
}

/// Builder for an [`FsPackage`].
#[derive(Debug, Default)]
pub struct FsPackageBuilder {
    base_directory: Option<PathBuf>,
    scan: bool,
    tracks: Vec<Track>,
}

impl FsPackageBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Set the package directory. Created if missing.
    #[must_use]
    pub fn base_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.base_directory = Some(path.into());
        self
    }

    /// Register every regular, non-hidden file under the base directory as a track.
    #[must_use]
    pub fn scan(mut self, scan: bool) -> Self {
        self.scan = scan;
        self
    }

    /// Register a track explicitly.
    #[must_use]
    pub fn track(mut self, track: Track) -> Self {
        self.tracks.push(track);
        self
    }

    /// Build the package.
    ///
    /// # Errors
    /// Fails if no base directory was set, if it cannot be created, or if scanning
    /// or validating explicit track URIs fails.
    pub fn build(self) -> EngineResult<FsPackage> {
        let base = self
            .base_directory
            .ok_or_else(|| EngineError::storage("", "base directory is required"))?;
        fs::create_dir_all(&base).map_err(|e| EngineError::io(&base, e))?;
        let base_dir = base.canonicalize().map_err(|e| EngineError::io(&base, e))?;

        let mut package = FsPackage {
            base_dir,
            tracks: Vec::new(),
        };

        if self.scan {
            let mut found = Vec::new();
            let dir = package.base_dir.clone();
            package.scan_dir(&dir, &mut found)?;
            found.sort_by(|a, b| a.uri.cmp(&b.uri));
            package.tracks = found;
        }
        for track in self.tracks {
            package.resolve(&track.uri)?;
            package.add(track)?;
        }

        info!(
            base_dir = %package.base_dir.display(),
            tracks = package.tracks.len(),
            "package loaded"
        );
        Ok(package)
    }
}
