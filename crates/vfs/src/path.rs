//! Virtual path handling.
//!
//! Virtual paths are `/`-separated and absolute; `/` is the filesystem
//! root. Normalization never lets a path climb above the root.

use crate::error::FsError;

/// Normalizes an absolute virtual path, resolving `.` and `..`.
pub fn normalize(path: &str) -> Result<String, FsError> {
    if path.contains('\0') {
        return Err(FsError::Encoding(format!("NUL byte in path: {path:?}")));
    }

    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(FsError::Security(format!(
                        "path escapes the filesystem root: {path}"
                    )));
                }
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return Ok("/".to_string());
    }
    Ok(format!("/{}", parts.join("/")))
}

/// Resolves `rel` against the directory `base`. An absolute `rel` is
/// resolved against the root instead.
pub fn join(base: &str, rel: &str) -> Result<String, FsError> {
    if rel.starts_with('/') {
        normalize(rel)
    } else {
        normalize(&format!("{base}/{rel}"))
    }
}

/// Parent directory of a normalized path. The root is its own parent.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Whether `path` lies strictly below `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return path != "/";
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Validates a single entry name used for `newName` or download targets.
pub fn validate_name(name: &str) -> Result<(), FsError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(FsError::Encoding(format!("invalid entry name: {name:?}")));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(FsError::Encoding(format!("invalid entry name: {name:?}")));
    }
    Ok(())
}
