use serde::Serialize;

use super::{PassState, RewriteMode};
use crate::package::{Track, TrackId};
use crate::playlist::ReferenceMap;

/// Outcome of a successful reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub state: PassState,
    pub mode: RewriteMode,
    /// False when every reference already pointed where it should and no file was touched
    pub rewritten: bool,
    pub anchor: TrackId,
    pub master: TrackId,
    pub master_is_provisional: bool,
    /// Anchor-relative path per logical name, as staged before rewriting
    pub staged: ReferenceMap,
    /// Tracks after the pass
    pub tracks: Vec<Track>,
    /// Tracks whose playlist file was written by the pass
    pub rewritten_tracks: Vec<TrackId>,
    /// Tracks replaced by a rewritten copy and removed from the package
    pub superseded: Vec<TrackId>,
    /// References left unchanged because no track matched them
    pub unresolved: Vec<String>,
    pub orphans: Vec<TrackId>,
}

impl ReconcileReport {
    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn master_track(&self) -> Option<&Track> {
        self.track(self.master)
    }
}
