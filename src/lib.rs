//! HLS manifest reference-graph engine.
//!
//! Parses master and variant playlists, discovers the files they reference, classifies
//! playlist roles and rewrites cross-references when referenced files move, without ever
//! losing the original manifest content on failure.

pub mod config;
pub mod errors;
pub mod package;
pub mod paths;
pub mod playlist;
pub mod reconcile;
pub mod resolver;

pub use config::{AmbiguousPlaylistPolicy, Config, EngineConfig};
pub use errors::{EngineError, EngineResult, ErrorKind, ReconcileError, RewriteError};
pub use package::{FsPackage, PackageContainer, StorageResolver, Track, TrackCopier, TrackId};
pub use playlist::{Classifier, PlaylistRole, ReferenceMap, RewriteOutcome};
pub use reconcile::{PassState, ReconcileReport, Reconciler, RewriteMode};
pub use resolver::{DependencyResolver, ResolvedSet};
