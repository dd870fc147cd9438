//! Per-track working record of one reconciliation pass.

use std::path::PathBuf;

use crate::package::{Track, TrackId};
use crate::playlist::PlaylistRole;

/// A track as handled during one pass. Never persisted.
///
/// `original` is the track as the package held it when the pass started; `track` is the
/// working copy that receives the new logical name and back-reference, and is replaced
/// by the copied track when the playlist is re-ingested.
#[derive(Debug, Clone)]
pub(crate) struct Rep {
    pub original: Track,
    pub track: Track,
    pub location: PathBuf,
    pub role: PlaylistRole,
}

impl Rep {
    pub fn new(track: Track, location: PathBuf, role: PlaylistRole) -> Self {
        Self {
            original: track.clone(),
            track,
            location,
            role,
        }
    }

    pub fn uri(&self) -> &str {
        &self.track.uri
    }

    pub fn id(&self) -> TrackId {
        self.track.id
    }

    /// True once the playlist was replaced by a new track.
    pub fn is_replaced(&self) -> bool {
        self.track.id != self.original.id
    }

    /// Swap in the copy made of this playlist.
    pub fn replace_with(&mut self, copy: Track, location: PathBuf) {
        self.track = copy;
        self.location = location;
    }
}
