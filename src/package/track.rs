//! Track handles and lookup helpers over track collections.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::collaborators::StorageResolver;
use crate::errors::EngineResult;
use crate::paths;
use crate::playlist::{PlaylistRole, is_playlist};

/// Stable track identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TrackId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A file belonging to a package, as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    /// Package-relative location, `/`-separated
    pub uri: String,
    /// Key other manifests use to address this track
    pub logical_name: Option<String>,
    /// Master for a variant, owning variant for a segment
    pub refers_to: Option<TrackId>,
    /// Cached classification
    pub role: Option<PlaylistRole>,
    pub flavor: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Track {
    pub fn new<U: Into<String>>(uri: U) -> Self {
        Self {
            id: TrackId::new(),
            uri: uri.into(),
            logical_name: None,
            refers_to: None,
            role: None,
            flavor: None,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_flavor<F: Into<String>>(mut self, flavor: F) -> Self {
        self.flavor = Some(flavor.into());
        self
    }

    #[must_use]
    pub fn with_logical_name<N: Into<String>>(mut self, name: N) -> Self {
        self.logical_name = Some(name.into());
        self
    }

    pub fn file_name(&self) -> &str {
        paths::file_name(&self.uri)
    }

    /// File name without its extension.
    pub fn base_name(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(pos) if pos > 0 => &name[..pos],
            _ => name,
        }
    }

    /// Cached role when classified, the default manifest extension otherwise.
    pub fn is_playlist(&self) -> bool {
        match self.role {
            Some(role) => role.is_playlist(),
            None => is_playlist(&self.uri),
        }
    }

    pub fn is_master(&self) -> bool {
        self.role == Some(PlaylistRole::Master)
    }

    /// Logical name, falling back to the file name.
    pub fn name(&self) -> &str {
        self.logical_name.as_deref().unwrap_or_else(|| self.file_name())
    }
}

/// Logical name = file-name portion of the URI.
pub fn set_logical_name(track: &mut Track) {
    track.logical_name = Some(track.file_name().to_string());
}

/// True if any track is a playlist.
pub fn has_playlist(tracks: &[Track]) -> bool {
    tracks.iter().any(Track::is_playlist)
}

/// Tracks ordered by file base name, optionally without playlists.
pub fn sorted_tracks(tracks: &[Track], segments_only: bool) -> Vec<Track> {
    let mut sorted: Vec<Track> = tracks
        .iter()
        .filter(|t| !segments_only || !t.is_playlist())
        .cloned()
        .collect();
    sorted.sort_by(|a, b| a.base_name().cmp(b.base_name()).then_with(|| a.uri.cmp(&b.uri)));
    sorted
}

/// Logical name to package URI.
pub fn logical_name_uri_map(tracks: &[Track]) -> HashMap<String, String> {
    tracks
        .iter()
        .map(|t| (t.name().to_string(), t.uri.clone()))
        .collect()
}

/// Logical name to resolved storage location.
pub fn logical_name_location_map<R: StorageResolver + ?Sized>(
    tracks: &[Track],
    resolver: &R,
) -> EngineResult<HashMap<String, PathBuf>> {
    tracks
        .iter()
        .map(|t| Ok((t.name().to_string(), resolver.resolve(&t.uri)?)))
        .collect()
}

/// Logical name to URI relative to the master's directory, for every non-master track.
/// Empty when there is no master.
pub fn uri_relative_to_master_map(tracks: &[Track]) -> HashMap<String, String> {
    let Some(master) = tracks.iter().find(|t| t.is_master()) else {
        return HashMap::new();
    };
    tracks
        .iter()
        .filter(|t| !t.is_master())
        .map(|t| (t.name().to_string(), paths::relativize(&master.uri, &t.uri)))
        .collect()
}
