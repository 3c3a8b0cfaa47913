//! Local-to-remote path mapping.

use crate::error::{Result, SyncError};
use std::path::{Component, Path, PathBuf};

/// Renders a path with forward slashes regardless of the host separator.
pub fn as_posix_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Lexically resolves `.` and `..` without touching the filesystem.
pub fn normalize_local(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Joins a relative `path` onto the current directory, then normalizes it.
pub fn absolute_local(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(normalize_local(&absolute))
}

/// Normalizes a forward-slash remote path. `..` never climbs above `/`.
pub fn normalize_remote(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Parent of a normalized remote path, `None` for `/` or a bare name.
pub fn remote_parent(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) if trimmed.len() > 1 => Some("/".to_string()),
        Some(0) | None => None,
        Some(idx) => Some(trimmed[..idx].to_string()),
    }
}

/// Maps `local_path` under `local_root` onto `remote_root`.
///
/// Both local paths are normalized first; the result is a normalized remote
/// path using `/` separators.
pub fn translate(local_root: &Path, remote_root: &str, local_path: &Path) -> Result<String> {
    let root = normalize_local(local_root);
    let path = normalize_local(local_path);
    let rel = path
        .strip_prefix(&root)
        .map_err(|_| SyncError::PathOutsideRoot {
            path: path.clone(),
            root: root.clone(),
        })?;
    let mut remote = remote_root.replace('\\', "/");
    for component in rel.components() {
        if let Component::Normal(name) = component {
            if !remote.ends_with('/') {
                remote.push('/');
            }
            remote.push_str(&name.to_string_lossy());
        }
    }
    Ok(normalize_remote(&remote))
}
