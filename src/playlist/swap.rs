//! Temp-file swap guard for in-place playlist rewrites.
//!
//! The original file is moved aside to a uniquely named sibling before anything is
//! written to its path. The guard then either commits (backup deleted) or restores
//! (backup renamed back over whatever was written). Dropping an unsettled guard
//! restores.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::errors::{RewriteError, RewriteResult};

/// Unique sibling path for `path`: `<name><uuid><suffix>` in the same directory.
pub fn temp_path_for(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}{}{suffix}", Uuid::new_v4().simple()))
}

#[derive(Debug)]
pub struct TempSwap {
    original: PathBuf,
    backup: PathBuf,
    settled: bool,
}

impl TempSwap {
    /// Move `original` aside. Fails without side effects if the move fails.
    pub fn acquire(original: &Path, suffix: &str) -> RewriteResult<Self> {
        let backup = temp_path_for(original, suffix);
        fs::rename(original, &backup).map_err(|e| RewriteError::io(original, e))?;
        debug!(
            original = %original.display(),
            backup = %backup.display(),
            "moved playlist aside for rewrite"
        );
        Ok(Self {
            original: original.to_path_buf(),
            backup,
            settled: false,
        })
    }

    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Where the pre-rewrite content now lives.
    pub fn backup(&self) -> &Path {
        &self.backup
    }

    /// Keep the new content and delete the backup.
    pub fn commit(mut self) {
        self.settled = true;
        if let Err(e) = fs::remove_file(&self.backup) {
            warn!(
                backup = %self.backup.display(),
                error = %e,
                "could not delete rewrite backup"
            );
        }
    }

    /// Put the original content back.
    pub fn restore(mut self) -> RewriteResult<()> {
        self.settled = true;
        self.put_back()
    }

    fn put_back(&self) -> RewriteResult<()> {
        fs::rename(&self.backup, &self.original).map_err(|e| RewriteError::io(&self.original, e))
    }
}

impl Drop for TempSwap {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        match self.put_back() {
            Ok(()) => warn!(
                original = %self.original.display(),
                "restored playlist from backup"
            ),
            Err(e) => error!(
                original = %self.original.display(),
                backup = %self.backup.display(),
                error = %e,
                "failed to restore playlist from backup"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_commit_removes_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.m3u8");
        fs::write(&path, "old").unwrap();

        let swap = TempSwap::acquire(&path, ".tmp").unwrap();
        assert!(!path.exists());
        assert!(swap.backup().exists());
        fs::write(&path, "new").unwrap();
        swap.commit();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(files_in(dir.path()), vec!["v.m3u8"]);
    }

    #[test]
    fn test_drop_restores_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.m3u8");
        fs::write(&path, "old").unwrap();
        {
            let _swap = TempSwap::acquire(&path, ".tmp").unwrap();
            fs::write(&path, "half-writ").unwrap();
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
        assert_eq!(files_in(dir.path()), vec!["v.m3u8"]);
    }

    #[test]
    fn test_acquire_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TempSwap::acquire(&dir.path().join("none.m3u8"), ".tmp").is_err());
    }

    #[test]
    fn test_temp_path_is_sibling_with_suffix() {
        let p = temp_path_for(Path::new("/a/b/v.m3u8"), ".tmp");
        assert_eq!(p.parent(), Some(Path::new("/a/b")));
        let name = p.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("v.m3u8"));
        assert!(name.ends_with(".tmp"));
    }
}
