//! Centralized error handling for the HLS relink engine
//!
//! The engine distinguishes two failure families that an operator must be able to
//! tell apart:
//!
//! - **Malformed**: the package content is not a usable adaptive set (no segments,
//!   no playlist, cyclic playlist references, duplicate names).
//! - **Io**: reading or writing the storage layer failed.
//!
//! References that cannot be mapped while rewriting are *not* errors; they are
//! reported in [`crate::playlist::RewriteOutcome::unresolved`] and logged.
//!
//! # Usage
//!
//! ```rust
//! use hls_relink::errors::{EngineError, EngineResult};
//!
//! fn require_segments(count: usize) -> EngineResult<()> {
//!     if count == 0 {
//!         return Err(EngineError::malformed("no playable media segment"));
//!     }
//!     Ok(())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for engine results
pub type EngineResult<T> = Result<T, EngineError>;

/// Convenience type alias for rewrite results
pub type RewriteResult<T> = Result<T, RewriteError>;
