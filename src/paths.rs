//! Path algebra for manifest references.
//!
//! References inside manifests are `/`-separated strings, independent of the host
//! platform, so everything here works on strings lexically and never touches the
//! filesystem.

use url::Url;

/// File-name portion of a reference (text after the last `/`).
pub fn file_name(reference: &str) -> &str {
    match reference.rfind('/') {
        Some(pos) => &reference[pos + 1..],
        None => reference,
    }
}

/// Directory portion of a reference including the trailing `/`, or `""`.
pub fn directory_of(reference: &str) -> &str {
    match reference.rfind('/') {
        Some(pos) => &reference[..=pos],
        None => "",
    }
}

/// Lexically normalize a `/`-separated path: drop `.` segments and empty segments,
/// fold `name/..` pairs. Leading `..` of a relative path are kept; `..` above the
/// root of an absolute path are dropped.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Join a reference directory (as returned by [`directory_of`]) with a relative
/// reference and normalize the result.
pub fn join(directory: &str, reference: &str) -> String {
    if directory.is_empty() || reference.starts_with('/') {
        return normalize(reference);
    }
    normalize(&format!("{directory}{reference}"))
}

/// True if the reference is an absolute URL (`http://…`, `file:///…`), i.e. something
/// that must never be resolved against a local directory.
pub fn is_absolute_url(reference: &str) -> bool {
    match Url::parse(reference) {
        // single-letter schemes are drive letters, not URLs
        Ok(url) => url.scheme().len() > 1,
        Err(_) => false,
    }
}

enum Located<'a> {
    Url(Url),
    Path(&'a str),
}

fn locate(reference: &str) -> Located<'_> {
    if is_absolute_url(reference) {
        if let Ok(url) = Url::parse(reference) {
            return Located::Url(url);
        }
    }
    Located::Path(reference)
}

/// Relative path from the directory containing `from` to `to`.
///
/// Both sides are normalized first. When no relative path exists (different URL
/// schemes or hosts, one side absolute and the other relative) the normalized path of
/// `to` is returned unchanged and the caller decides whether that is acceptable.
pub fn relativize(from: &str, to: &str) -> String {
    let (from_path, to_path) = match (locate(from), locate(to)) {
        (Located::Url(a), Located::Url(b)) => {
            if a.scheme() != b.scheme() || a.host_str() != b.host_str() || a.port() != b.port()
            {
                return b.path().to_string();
            }
            (normalize(a.path()), normalize(b.path()))
        }
        (Located::Path(_), Located::Url(b)) => return b.to_string(),
        (Located::Url(_), Located::Path(b)) => return normalize(b),
        (Located::Path(a), Located::Path(b)) => (normalize(a), normalize(b)),
    };

    if from_path.starts_with('/') != to_path.starts_with('/') {
        return to_path;
    }

    let base: Vec<&str> = from_path.split('/').filter(|s| !s.is_empty()).collect();
    // directory of `from`
    let base = &base[..base.len().saturating_sub(1)];
    let target: Vec<&str> = to_path.split('/').filter(|s| !s.is_empty()).collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    // a `..` left in the base names a directory we cannot climb back out of
    if base[common..].contains(&"..") {
        return to_path;
    }

    let mut parts: Vec<&str> = vec![".."; base.len() - common];
    parts.extend_from_slice(&target[common..]);
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
