//! Package reconciliation.
//!
//! One pass walks a fixed sequence of states:
//!
//! ```text
//! Scanning → Classified → Relativizing → RewritingVariants → RewritingMaster
//!          → ReconcilingSegmentNames → Done
//! ```
//!
//! and drops to `Failed` from any of them. Files are only touched in the two rewriting
//! states; every change is recorded in a ledger that is either committed as a whole
//! when the pass reaches `Done` or rolled back as a whole.

mod ledger;
mod rep;
mod report;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult, ReconcileError};
use crate::package::{PackageContainer, StorageResolver, TrackCopier, TrackId};
use crate::paths;
use crate::playlist::{PlaylistRole, ReferenceMap, TempSwap, rewrite, rewrite_in_place};
use crate::resolver::{DependencyResolver, ResolvedSet};

use ledger::Ledger;
use rep::Rep;
pub use report::ReconcileReport;

/// States of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassState {
    Scanning,
    Classified,
    Relativizing,
    RewritingVariants,
    RewritingMaster,
    ReconcilingSegmentNames,
    Done,
    Failed,
}

/// How rewritten playlists land in the package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RewriteMode {
    /// Overwrite each playlist through a temp-file swap; tracks keep their ids
    #[default]
    InPlace,
    /// Copy each playlist into a new track, rewrite the copy, drop the old track
    Replace,
}

/// Runs reconciliation passes over packages.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: EngineConfig,
    resolver: DependencyResolver,
}

impl Reconciler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.clone(),
            resolver: DependencyResolver::new(config),
        }
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    /// True if any playlist reference differs from the relative path of the track it
    /// points at.
    pub fn needs_rewriting(&self, set: &ResolvedSet) -> bool {
        set.playlists_in_rewrite_order().into_iter().any(|playlist| {
            set.references[playlist].iter().any(|reference| {
                set.target_of(playlist, reference).is_some_and(|target| {
                    let expected =
                        paths::relativize(&set.tracks[playlist].uri, &set.tracks[target].uri);
                    &expected != reference
                })
            })
        })
    }

    /// Run one pass over every track of `package`.
    ///
    /// On failure the package and every file it holds are back to their state before
    /// the pass.
    pub fn reconcile<P>(
        &self,
        package: &mut P,
        mode: RewriteMode,
    ) -> Result<ReconcileReport, ReconcileError>
    where
        P: StorageResolver + PackageContainer + TrackCopier,
    {
        let originals = package.tracks();
        debug!(state = ?PassState::Scanning, tracks = originals.len(), ?mode, "reconciliation pass started");

        let set = match self.resolver.resolve(originals.clone(), &*package) {
            Ok(set) => set,
            Err(e) => {
                error!(state = ?PassState::Scanning, error = %e, "could not process adaptive playlist");
                return Err(ReconcileError::new(PassState::Scanning, e));
            }
        };

        let needs_rewriting = self.needs_rewriting(&set);
        let mut pass = Pass::new(&self.config, package, mode, set, Ledger::new(originals));
        match pass.run(needs_rewriting) {
            Ok(report) => {
                pass.ledger.commit();
                info!(
                    tracks = report.tracks.len(),
                    rewritten = report.rewritten_tracks.len(),
                    superseded = report.superseded.len(),
                    unresolved = report.unresolved.len(),
                    "reconciliation pass done"
                );
                Ok(report)
            }
            Err(e) => {
                let state = pass.state;
                error!(state = ?state, error = %e, "could not process adaptive playlist");
                pass.ledger.rollback(pass.package);
                debug!(state = ?PassState::Failed, "reconciliation pass failed");
                Err(ReconcileError::new(state, e))
            }
        }
    }
}

struct Pass<'a, P> {
    config: &'a EngineConfig,
    package: &'a mut P,
    mode: RewriteMode,
    state: PassState,
    set: ResolvedSet,
    reps: Vec<Rep>,
    ledger: Ledger,
    anchor: usize,
    root: usize,
    /// Anchor-relative path per track
    staged: Vec<String>,
    /// Logical names held by exactly one track when the pass started
    names: HashMap<String, usize>,
    rewritten: Vec<TrackId>,
    unresolved: Vec<String>,
}

impl<'a, P> Pass<'a, P>
where
    P: StorageResolver + PackageContainer + TrackCopier,
{
    fn new(
        config: &'a EngineConfig,
        package: &'a mut P,
        mode: RewriteMode,
        set: ResolvedSet,
        ledger: Ledger,
    ) -> Self {
        let reps = set
            .tracks
            .iter()
            .enumerate()
            .map(|(i, track)| Rep::new(track.clone(), set.locations[i].clone(), set.role(i)))
            .collect();
        // resolve never succeeds without a root
        let root = set.master.unwrap_or_default();
        Self {
            config,
            package,
            mode,
            state: PassState::Scanning,
            set,
            reps,
            ledger,
            anchor: root,
            root,
            staged: Vec::new(),
            names: HashMap::new(),
            rewritten: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    fn enter(&mut self, state: PassState) {
        debug!(from = ?self.state, to = ?state, "reconciliation state change");
        self.state = state;
    }

    fn run(&mut self, needs_rewriting: bool) -> EngineResult<ReconcileReport> {
        self.enter(PassState::Classified);

        self.enter(PassState::Relativizing);
        let staged = self.relativize_from_anchor();

        let root = self.root;
        let order = self.set.playlists_in_rewrite_order();
        self.enter(PassState::RewritingVariants);
        if needs_rewriting {
            for variant in order.into_iter().filter(|&p| p != root) {
                self.rewrite_playlist(variant)?;
            }
        } else {
            debug!("references already consistent, no playlist rewritten");
        }

        self.enter(PassState::RewritingMaster);
        if needs_rewriting {
            self.rewrite_playlist(root)?;
        }

        self.enter(PassState::ReconcilingSegmentNames);
        self.assign_logical_names()?;
        for rep in &self.reps {
            self.package.add(rep.track.clone())?;
        }

        self.enter(PassState::Done);
        let superseded = self.remove_superseded();
        Ok(self.report(needs_rewriting, staged, superseded))
    }

    /// Stage the anchor-relative path of every track, keyed by its logical name.
    fn relativize_from_anchor(&mut self) -> ReferenceMap {
        self.anchor = match self.set.segments.as_slice() {
            [only] => *only,
            _ => self.root,
        };
        let anchor_uri = self.reps[self.anchor].uri().to_string();
        self.staged = self
            .reps
            .iter()
            .map(|rep| paths::relativize(&anchor_uri, rep.uri()))
            .collect();

        let mut holders: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, rep) in self.reps.iter().enumerate() {
            holders.entry(rep.track.name()).or_default().push(i);
        }
        self.names = holders
            .into_iter()
            .filter_map(|(name, holders)| match holders.as_slice() {
                [only] => Some((name.to_string(), *only)),
                _ => None,
            })
            .collect();

        let map: ReferenceMap = self
            .names
            .iter()
            .filter(|&(_, &i)| i != self.anchor)
            .map(|(name, &i)| (name.clone(), self.staged[i].clone()))
            .collect();
        debug!(anchor = %anchor_uri, staged = map.len(), "paths staged relative to anchor");
        map
    }

    /// Where a track lives now, rebased from its staged anchor-relative path.
    fn current_uri(&self, index: usize) -> String {
        let rep = &self.reps[index];
        if rep.is_replaced() {
            return rep.uri().to_string();
        }
        let anchor_dir = paths::directory_of(self.reps[self.anchor].original.uri.as_str());
        paths::join(anchor_dir, &self.staged[index])
    }

    /// Reference map for one playlist at its current location.
    ///
    /// Every logical name maps to the track's path relative to the playlist; the
    /// references the playlist actually contains are then keyed as written.
    fn map_for(&self, playlist: usize) -> ReferenceMap {
        let from = self.reps[playlist].uri().to_string();
        let mut map: ReferenceMap = self
            .names
            .iter()
            .filter(|&(_, &target)| target != playlist)
            .map(|(name, &target)| {
                (
                    name.clone(),
                    paths::relativize(&from, &self.current_uri(target)),
                )
            })
            .collect();
        for reference in &self.set.references[playlist] {
            if let Some(target) = self.set.target_of(playlist, reference) {
                map.insert(
                    reference.clone(),
                    paths::relativize(&from, &self.current_uri(target)),
                );
            }
        }
        map
    }

    fn rewrite_playlist(&mut self, playlist: usize) -> EngineResult<()> {
        let outcome = match self.mode {
            RewriteMode::InPlace => {
                let map = self.map_for(playlist);
                let location = self.reps[playlist].location.clone();
                let swap = TempSwap::acquire(&location, &self.config.temp_suffix)?;
                let backup = self.ledger.push_swap(swap).backup().to_path_buf();
                rewrite(&backup, &location, &map)?
            }
            RewriteMode::Replace => {
                let rep = &self.reps[playlist];
                let mut template = rep.track.clone();
                template.role = Some(rep.role);
                let copy = self.package.copy_with_file(&rep.location, &template)?;
                let location = self.package.resolve(&copy.uri)?;
                self.package.add(copy.clone())?;
                self.ledger.push_created(copy.id);
                debug!(old = %rep.original.id, new = %copy.id, uri = %copy.uri, "playlist copied into new track");
                self.reps[playlist].replace_with(copy, location.clone());

                let map = self.map_for(playlist);
                rewrite_in_place(&location, &map, &self.config.temp_suffix)?
            }
        };

        for reference in outcome.unresolved {
            if !self.unresolved.contains(&reference) {
                self.unresolved.push(reference);
            }
        }
        self.rewritten.push(self.reps[playlist].id());
        Ok(())
    }

    /// Final logical names and back-references.
    ///
    /// Root: its file name. Variants: path relative to the root. Segments: path
    /// relative to their owning playlist (the root for orphans). Segments whose
    /// owner-relative names collide, as in one directory per rendition, take their
    /// root-relative path instead.
    fn assign_logical_names(&mut self) -> EngineResult<()> {
        let root_uri = self.reps[self.root].uri().to_string();
        let root_id = self.reps[self.root].id();

        let mut assigned = Vec::with_capacity(self.reps.len());
        for index in 0..self.reps.len() {
            let relative_to_root = paths::relativize(&root_uri, self.reps[index].uri());
            let entry = if index == self.root {
                (paths::file_name(&root_uri).to_string(), None)
            } else {
                match self.reps[index].role {
                    PlaylistRole::Segment => match self.set.owner_of(index) {
                        Some(owner) => (
                            paths::relativize(self.reps[owner].uri(), self.reps[index].uri()),
                            Some(self.reps[owner].id()),
                        ),
                        None => (relative_to_root, None),
                    },
                    _ => (relative_to_root, Some(root_id)),
                }
            };
            assigned.push(entry);
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for (name, _) in &assigned {
            *counts.entry(name.clone()).or_default() += 1;
        }
        for (index, (name, _)) in assigned.iter_mut().enumerate() {
            if counts[name.as_str()] > 1 && self.reps[index].role == PlaylistRole::Segment {
                *name = paths::relativize(&root_uri, self.reps[index].uri());
            }
        }

        for (rep, (name, refers_to)) in self.reps.iter_mut().zip(assigned) {
            rep.track.logical_name = Some(name);
            rep.track.refers_to = refers_to;
            rep.track.role = Some(rep.role);
        }

        let mut seen = HashSet::new();
        for rep in &self.reps {
            let name = rep.track.name();
            if !seen.insert(name) {
                return Err(EngineError::malformed(format!(
                    "logical name {name} is not unique in the adaptive set"
                )));
            }
        }
        Ok(())
    }

    /// Drop tracks replaced by a copy. The pass is committed at this point, so
    /// failures only cost disk space.
    fn remove_superseded(&mut self) -> Vec<TrackId> {
        let mut superseded = Vec::new();
        for rep in self.reps.iter().filter(|rep| rep.is_replaced()) {
            match self.package.remove(rep.original.id) {
                Ok(()) => superseded.push(rep.original.id),
                Err(e) => error!(
                    track = %rep.original.id,
                    error = %e,
                    "could not remove superseded track"
                ),
            }
        }
        superseded
    }

    fn report(
        &self,
        rewritten: bool,
        staged: ReferenceMap,
        superseded: Vec<TrackId>,
    ) -> ReconcileReport {
        ReconcileReport {
            state: self.state,
            mode: self.mode,
            rewritten,
            anchor: self.reps[self.anchor].id(),
            master: self.reps[self.root].id(),
            master_is_provisional: self.set.master_is_provisional,
            staged,
            tracks: self.reps.iter().map(|rep| rep.track.clone()).collect(),
            rewritten_tracks: self.rewritten.clone(),
            superseded,
            unresolved: self.unresolved.clone(),
            orphans: self
                .set
                .orphans
                .iter()
                .map(|&i| self.reps[i].id())
                .collect(),
        }
    }
}
