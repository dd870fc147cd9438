//! Path validation keeping package URIs inside the package directory.

use std::path::Path;

use crate::errors::{EngineError, EngineResult};

/// Rejects URIs that can never name a file inside a package: empty, null bytes,
/// absolute paths.
pub fn validate_uri(uri: &str) -> EngineResult<()> {
    if uri.is_empty() {
        return Err(EngineError::storage(uri, "URI cannot be empty"));
    }
    if uri.contains('\0') {
        return Err(EngineError::storage(uri, "URI contains null bytes"));
    }
    if uri.starts_with('/') || Path::new(uri).is_absolute() {
        return Err(EngineError::storage(
            uri,
            "absolute paths not allowed, use package-relative URIs",
        ));
    }
    Ok(())
}

/// Validates that `resolved` stays within `base` once symlinks and `..` are resolved.
/// The target itself may not exist yet; its parent must.
pub fn validate_path_within_sandbox(resolved: &Path, base: &Path) -> EngineResult<()> {
    let storage_err = |reason: String| EngineError::storage(resolved.display().to_string(), reason);

    let canonical_base = base
        .canonicalize()
        .map_err(|e| storage_err(format!("failed to resolve package directory: {e}")))?;

    let canonical = if resolved.exists() {
        resolved
            .canonicalize()
            .map_err(|e| storage_err(format!("failed to resolve path: {e}")))?
    } else {
        let parent = resolved
            .parent()
            .ok_or_else(|| storage_err("path has no parent directory".to_string()))?;
        let file_name = resolved
            .file_name()
            .ok_or_else(|| storage_err("invalid file name".to_string()))?;
        match parent.canonicalize() {
            Ok(p) => p.join(file_name),
            // parent not created yet: fall back to a lexical check
            Err(_) if !resolved.components().any(|c| c.as_os_str() == "..") => {
                resolved.to_path_buf()
            }
            Err(e) => return Err(storage_err(format!("failed to resolve parent: {e}"))),
        }
    };

    let within = canonical.starts_with(&canonical_base) || canonical.starts_with(base);
    if !within {
        return Err(storage_err(format!(
            "path escapes package directory: resolves to '{}' (outside '{}')",
            canonical.display(),
            canonical_base.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a.mp4", true)]
    #[case("dir/a.mp4", true)]
    #[case("", false)]
    #[case("a\0.mp4", false)]
    #[case("/etc/passwd", false)]
    fn test_validate_uri(#[case] uri: &str, #[case] ok: bool) {
        assert_eq!(validate_uri(uri).is_ok(), ok);
    }

    #[test]
    fn test_validate_path_within_sandbox() {
        let base = tempfile::tempdir().unwrap();
        let inside = base.path().join("v.m3u8");
        std::fs::write(&inside, "x").unwrap();
        assert!(validate_path_within_sandbox(&inside, base.path()).is_ok());
        assert!(validate_path_within_sandbox(&base.path().join("new.m3u8"), base.path()).is_ok());

        let outside = tempfile::tempdir().unwrap();
        let escaped = outside.path().join("o.m3u8");
        std::fs::write(&escaped, "x").unwrap();
        assert!(validate_path_within_sandbox(&escaped, base.path()).is_err());

        let traversal = base.path().join("../escape.m3u8");
        assert!(validate_path_within_sandbox(&traversal, base.path()).is_err());
    }
}
