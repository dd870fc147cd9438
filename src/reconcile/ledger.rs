//! Rollback ledger of one reconciliation pass.

use tracing::{error, warn};

use crate::package::{PackageContainer, Track, TrackId};
use crate::playlist::TempSwap;

/// Everything a pass changed so far, in the order it happened.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    /// Playlists rewritten in place, original content parked in the backup
    swaps: Vec<TempSwap>,
    /// Tracks added to the package by this pass
    created: Vec<TrackId>,
    /// Package tracks as they were before the pass
    originals: Vec<Track>,
}

impl Ledger {
    pub fn new(originals: Vec<Track>) -> Self {
        Self {
            originals,
            ..Self::default()
        }
    }

    /// Park a swap. Returns it so the caller can read from its backup.
    pub fn push_swap(&mut self, swap: TempSwap) -> &TempSwap {
        self.swaps.push(swap);
        &self.swaps[self.swaps.len() - 1]
    }

    pub fn push_created(&mut self, id: TrackId) {
        self.created.push(id);
    }

    /// Keep every change. Backups are deleted.
    pub fn commit(self) {
        for swap in self.swaps {
            swap.commit();
        }
    }

    /// Undo every change, newest first. Keeps going after individual failures.
    pub fn rollback<C: PackageContainer + ?Sized>(self, package: &mut C) {
        let swaps = self.swaps.len();
        for swap in self.swaps.into_iter().rev() {
            let original = swap.original().to_path_buf();
            if let Err(e) = swap.restore() {
                error!(playlist = %original.display(), error = %e, "rollback could not restore playlist");
            }
        }
        for id in self.created.iter().rev() {
            if let Err(e) = package.remove(*id) {
                error!(track = %id, error = %e, "rollback could not remove new track");
            }
        }
        for track in self.originals {
            if let Err(e) = package.add(track) {
                error!(error = %e, "rollback could not restore track metadata");
            }
        }
        warn!(
            restored_playlists = swaps,
            removed_tracks = self.created.len(),
            "reconciliation rolled back"
        );
    }
}
