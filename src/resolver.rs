//! Dependency resolution over a flat set of tracks.
//!
//! Builds the master → variant → segment graph of one package from the references
//! found inside its playlists. Tracks live in an arena ([`ResolvedSet::tracks`]) and
//! relationships are arena indices; the persisted back-references are the
//! [`Track::refers_to`] ids.
//!
//! A reference written inside a playlist is matched, in order, against:
//!
//! 1. the package URI it names relative to the playlist's directory,
//! 2. the logical names of the tracks, by full reference and then by file name,
//! 3. the file names of the tracks.
//!
//! The first step that matches exactly one track wins. A name step matching several
//! tracks makes the reference ambiguous, which fails resolution.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::package::{StorageResolver, Track, TrackId, set_logical_name, sorted_tracks};
use crate::paths;
use crate::playlist::classifier::read_lossy;
use crate::playlist::{
    Classifier, PlaylistRole, is_master_content, references_in, tag_uri_references,
};

/// A classified, linked adaptive set.
#[derive(Debug, Clone)]
pub struct ResolvedSet {
    /// All tracks, ordered by file base name, with role and logical name set
    pub tracks: Vec<Track>,
    /// Resolved storage location per track
    pub locations: Vec<PathBuf>,
    /// Root playlist
    pub master: Option<usize>,
    /// True if no playlist carried master tags and a variant stands in as the root
    pub master_is_provisional: bool,
    /// Variant playlists other than the root
    pub variants: Vec<usize>,
    pub segments: Vec<usize>,
    /// Owning playlist per track (segments only)
    pub owners: Vec<Option<usize>>,
    /// Direct references (bare lines and tag URIs) per track, empty for segments
    pub references: Vec<BTreeSet<String>>,
    /// Segments no playlist references
    pub orphans: Vec<usize>,
    by_uri: HashMap<String, usize>,
    /// Logical name and its file-name part
    by_logical: HashMap<String, Vec<usize>>,
    by_file: HashMap<String, Vec<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    Found(usize),
    Ambiguous,
    Missing,
}

impl ResolvedSet {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn master_track(&self) -> Option<&Track> {
        self.master.map(|i| &self.tracks[i])
    }

    pub fn index_of(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    pub fn role(&self, index: usize) -> PlaylistRole {
        self.tracks[index].role.unwrap_or(PlaylistRole::Segment)
    }

    pub fn owner_of(&self, segment: usize) -> Option<usize> {
        self.owners[segment]
    }

    /// Playlists in dependency order: variants referenced by other variants first, the
    /// root last.
    pub fn playlists_in_rewrite_order(&self) -> Vec<usize> {
        let mut ordered = Vec::with_capacity(self.variants.len() + 1);
        let mut state = vec![Visit::New; self.tracks.len()];
        for &variant in &self.variants {
            self.visit_variant(variant, &mut state, &mut ordered);
        }
        ordered.extend(self.master);
        ordered
    }

    fn visit_variant(&self, index: usize, state: &mut [Visit], ordered: &mut Vec<usize>) {
        if state[index] != Visit::New {
            return;
        }
        state[index] = Visit::InProgress;
        for reference in &self.references[index] {
            if let Some(target) = self.target_of(index, reference)
                && self.variants.contains(&target)
            {
                self.visit_variant(target, state, ordered);
            }
        }
        state[index] = Visit::Done;
        ordered.push(index);
    }

    /// Track a reference written inside `playlist` points at. Absolute URLs and
    /// ambiguous names never match.
    pub fn target_of(&self, playlist: usize, reference: &str) -> Option<usize> {
        match self.lookup(Some(playlist), reference) {
            Match::Found(target) => Some(target),
            Match::Ambiguous | Match::Missing => None,
        }
    }

    fn lookup(&self, playlist: Option<usize>, reference: &str) -> Match {
        if paths::is_absolute_url(reference) {
            return Match::Missing;
        }
        if let Some(playlist) = playlist {
            let joined = paths::join(paths::directory_of(&self.tracks[playlist].uri), reference);
            if let Some(&target) = self.by_uri.get(&joined)
                && target != playlist
            {
                return Match::Found(target);
            }
        }

        let name = paths::file_name(reference);
        let steps = [
            self.by_logical.get(reference),
            self.by_logical.get(name),
            self.by_file.get(name),
        ];
        for candidates in steps.into_iter().flatten() {
            let mut others = candidates
                .iter()
                .copied()
                .filter(|&candidate| Some(candidate) != playlist);
            match (others.next(), others.next()) {
                (Some(only), None) => return Match::Found(only),
                (Some(_), Some(_)) => return Match::Ambiguous,
                _ => {}
            }
        }
        Match::Missing
    }
}

fn push_unique(indexes: &mut Vec<usize>, index: usize) {
    if !indexes.contains(&index) {
        indexes.push(index);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    InProgress,
    Done,
}

/// Classifies and links the tracks of one package.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    classifier: Classifier,
    reject_duplicate_names: bool,
}

impl DependencyResolver {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            classifier: Classifier::new(config),
            reject_duplicate_names: config.reject_duplicate_names,
        }
    }

    pub fn resolve<R: StorageResolver + ?Sized>(
        &self,
        tracks: Vec<Track>,
        storage: &R,
    ) -> EngineResult<ResolvedSet> {
        if tracks.len() < 2 {
            return Err(EngineError::malformed("not enough files for an adaptive set"));
        }

        let mut tracks = sorted_tracks(&tracks, false);
        let mut locations = Vec::with_capacity(tracks.len());
        for track in &mut tracks {
            let location = storage.resolve(&track.uri)?;
            if track.role.is_none() {
                track.role = Some(self.classifier.classify_file(&location)?);
            }
            if track.logical_name.is_none() {
                set_logical_name(track);
            }
            locations.push(location);
        }

        let mut by_uri = HashMap::new();
        let mut by_logical: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_file: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, track) in tracks.iter().enumerate() {
            by_uri.insert(paths::normalize(&track.uri), index);
            let name = track.name();
            push_unique(by_logical.entry(name.to_string()).or_default(), index);
            push_unique(
                by_logical
                    .entry(paths::file_name(name).to_string())
                    .or_default(),
                index,
            );
            by_file
                .entry(track.file_name().to_string())
                .or_default()
                .push(index);
        }
        if self.reject_duplicate_names
            && let Some(track) = tracks.iter().find(|t| by_file[t.file_name()].len() > 1)
        {
            return Err(EngineError::malformed(format!(
                "duplicate file name {} in adaptive set",
                track.file_name()
            )));
        }

        let mut masters = Vec::new();
        let mut variants = Vec::new();
        let mut segments = Vec::new();
        for (index, track) in tracks.iter().enumerate() {
            match track.role {
                Some(PlaylistRole::Master) => masters.push(index),
                Some(PlaylistRole::Variant) => variants.push(index),
                _ => segments.push(index),
            }
        }

        if segments.is_empty() {
            return Err(EngineError::malformed("no playable media segment"));
        }
        if masters.is_empty() && variants.is_empty() {
            return Err(EngineError::malformed("no playlist found"));
        }
        if masters.len() > 1 {
            return Err(EngineError::malformed(format!(
                "more than one master playlist: {}",
                masters
                    .iter()
                    .map(|&i| tracks[i].uri.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        let mut references = vec![BTreeSet::new(); tracks.len()];
        for &index in masters.iter().chain(&variants) {
            let content = read_lossy(&locations[index])?;
            let mut found = references_in(&content);
            found.extend(tag_uri_references(&content));
            references[index] = found;
        }

        let mut master_is_provisional = false;
        let master = match masters.first() {
            Some(&index) => index,
            None => {
                let mut promoted = None;
                for (pos, &index) in variants.iter().enumerate() {
                    if is_master_content(&read_lossy(&locations[index])?) {
                        promoted = Some(pos);
                        break;
                    }
                }
                match promoted {
                    Some(pos) => {
                        let index = variants.remove(pos);
                        tracks[index].role = Some(PlaylistRole::Master);
                        debug!(uri = %tracks[index].uri, "variant promoted to master");
                        index
                    }
                    None => {
                        master_is_provisional = true;
                        let index = variants.remove(0);
                        debug!(uri = %tracks[index].uri, "no master playlist, using variant as root");
                        index
                    }
                }
            }
        };

        let mut set = ResolvedSet {
            tracks,
            locations,
            master: Some(master),
            master_is_provisional,
            variants,
            segments,
            owners: Vec::new(),
            references,
            orphans: Vec::new(),
            by_uri,
            by_logical,
            by_file,
        };
        set.owners = vec![None; set.tracks.len()];

        for &playlist in set.variants.iter().chain(&set.master) {
            for reference in &set.references[playlist] {
                if set.lookup(Some(playlist), reference) == Match::Ambiguous {
                    return Err(EngineError::malformed(format!(
                        "reference {reference} in {} matches more than one track",
                        set.tracks[playlist].uri
                    )));
                }
            }
        }

        // direct references first, so nested playlists keep their own segments
        for &variant in &set.variants {
            for reference in &set.references[variant] {
                if let Some(target) = set.target_of(variant, reference)
                    && set.role(target) == PlaylistRole::Segment
                    && set.owners[target].is_none()
                {
                    set.owners[target] = Some(variant);
                }
            }
        }
        for &variant in &set.variants {
            let nested = self
                .classifier
                .extract_referenced_files_recursive(&set.locations[variant], true)?;
            for reference in nested {
                if let Match::Found(target) = set.lookup(None, &reference)
                    && set.role(target) == PlaylistRole::Segment
                    && set.owners[target].is_none()
                {
                    set.owners[target] = Some(variant);
                }
            }
        }
        for reference in &set.references[master] {
            if let Some(target) = set.target_of(master, reference)
                && set.role(target) == PlaylistRole::Segment
                && set.owners[target].is_none()
            {
                set.owners[target] = Some(master);
            }
        }

        let master_id = set.tracks[master].id;
        set.tracks[master].refers_to = None;
        for &variant in &set.variants {
            set.tracks[variant].refers_to = Some(master_id);
        }
        for &segment in &set.segments {
            match set.owners[segment] {
                Some(owner) => set.tracks[segment].refers_to = Some(set.tracks[owner].id),
                None => set.orphans.push(segment),
            }
        }
        for &orphan in &set.orphans {
            warn!(uri = %set.tracks[orphan].uri, "segment is not referenced by any playlist");
        }

        info!(
            tracks = set.tracks.len(),
            master = %set.tracks[master].uri,
            provisional = set.master_is_provisional,
            variants = set.variants.len(),
            segments = set.segments.len(),
            orphans = set.orphans.len(),
            "adaptive set resolved"
        );
        Ok(set)
    }
}
