//! Playlist text handling: role classification, reference extraction and rewriting.
//!
//! Only the subset of HLS tags needed to tell master from variant playlists and to
//! find referenced files is understood; every other line is carried through untouched.

pub mod classifier;
pub mod reference_map;
pub mod references;
pub mod rewrite;
pub mod swap;

pub use classifier::{
    Classifier, PlaylistRole, check_for_master, check_for_variant, is_master_content,
    is_playlist, is_variant_content,
};
pub use reference_map::ReferenceMap;
pub use references::{
    extract_referenced_files_recursive, extract_references, references_in, tag_uri_references,
    uri_attribute,
};
pub use rewrite::{RewriteOutcome, relink_files, rewrite, rewrite_in_place, rewrite_str};
pub use swap::TempSwap;
