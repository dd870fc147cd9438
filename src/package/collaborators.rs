//! Storage-side collaborators the engine is driven through.
//!
//! The engine never invents file locations and never keeps its own track registry:
//! everything goes through these three traits.

use std::path::{Path, PathBuf};

use super::track::{Track, TrackId};
use crate::errors::EngineResult;

/// Maps a package URI to a location on durable storage.
pub trait StorageResolver {
    fn resolve(&self, uri: &str) -> EngineResult<PathBuf>;
}

/// The package grouping tracks together.
pub trait PackageContainer {
    /// Snapshot of the current tracks.
    fn tracks(&self) -> Vec<Track>;

    /// Add a track, replacing any track with the same id.
    fn add(&mut self, track: Track) -> EngineResult<()>;

    /// Remove a track and its file. Removing an unknown id is a no-op.
    fn remove(&mut self, id: TrackId) -> EngineResult<()>;
}

/// Turns a rewritten file into a brand-new track.
pub trait TrackCopier {
    /// Store `file` as a new track carrying the metadata of `template`. The returned
    /// track is not added to any container.
    fn copy_with_file(&mut self, file: &Path, template: &Track) -> EngineResult<Track>;
}
