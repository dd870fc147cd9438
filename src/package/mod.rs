//! Package model: tracks, the collaborator traits the engine is driven through, and a
//! directory-backed package implementing them.

pub mod collaborators;
pub mod fs_package;
pub mod sandbox;
pub mod track;

pub use collaborators::{PackageContainer, StorageResolver, TrackCopier};
pub use fs_package::{FsPackage, FsPackageBuilder};
pub use track::{
    Track, TrackId, has_playlist, logical_name_location_map, logical_name_uri_map,
    set_logical_name, sorted_tracks, uri_relative_to_master_map,
};
