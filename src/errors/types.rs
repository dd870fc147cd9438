//! Error type definitions for the HLS relink engine.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::reconcile::PassState;

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The input claims to be an adaptive set but cannot be treated as one
    #[error("Malformed adaptive playlist: {message}")]
    Malformed { message: String },

    /// Filesystem read/write failure
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A storage collaborator (resolver, container, copier) refused an operation
    #[error("Storage error for {uri}: {reason}")]
    Storage { uri: String, reason: String },
}

/// Errors raised by the rewrite engine. Always leaves the source file intact.
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("Cannot rewrite {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification surfaced to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Content problem
    Malformed,
    /// Storage problem
    Io,
}

/// A failed reconciliation pass, with the state it failed in.
#[derive(Error, Debug)]
#[error("could not process adaptive playlist ({kind:?} during {state:?}): {source}")]
pub struct ReconcileError {
    pub state: PassState,
    pub kind: ErrorKind,
    #[source]
    pub source: EngineError,
}

impl EngineError {
    /// Create a malformed-input error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Wrap an I/O error with the path it happened on
    pub fn io<P: AsRef<Path>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a storage collaborator error
    pub fn storage<U: Into<String>, R: Into<String>>(uri: U, reason: R) -> Self {
        Self::Storage {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed { .. } => ErrorKind::Malformed,
            Self::Io { .. } | Self::Storage { .. } => ErrorKind::Io,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

impl RewriteError {
    pub fn io<P: AsRef<Path>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<RewriteError> for EngineError {
    fn from(err: RewriteError) -> Self {
        match err {
            RewriteError::Io { path, source } => EngineError::Io { path, source },
        }
    }
}

impl ReconcileError {
    pub fn new(state: PassState, source: EngineError) -> Self {
        Self {
            state,
            kind: source.kind(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_separates_content_from_storage() {
        assert_eq!(EngineError::malformed("x").kind(), ErrorKind::Malformed);
        let io = EngineError::io("a.m3u8", std::io::Error::other("boom"));
        assert_eq!(io.kind(), ErrorKind::Io);
        assert_eq!(EngineError::storage("a", "b").kind(), ErrorKind::Io);
    }

    #[test]
    fn test_reconcile_error_message() {
        let err = ReconcileError::new(
            PassState::Classified,
            EngineError::malformed("no playable media segment"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("could not process adaptive playlist"));
        assert!(msg.contains("Malformed"));
        assert!(msg.contains("no playable media segment"));
    }

    #[test]
    fn test_rewrite_error_converts_to_io() {
        let err: EngineError =
            RewriteError::io("v.m3u8", std::io::Error::other("disk full")).into();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
