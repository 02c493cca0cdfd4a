// src/watch/path_utils.rs

//! Path helpers shared by the watcher and the project's watch filter.

use std::path::Path;

/// Slash-normalised form of a relative path.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Convert `path` into a string relative to `root`, with forward slashes.
///
/// Tries a direct `strip_prefix` first; if that fails (symlinks, `/private`
/// prefixes on macOS) both sides are canonicalized and tried again. A path
/// that no longer exists cannot be canonicalized, so its parent is used.
///
/// Returns `None` if the path is not under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slash(rel));
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => {
            let parent = path.parent()?.canonicalize().ok()?;
            parent.join(path.file_name()?)
        }
    };

    path_canon.strip_prefix(&root_canon).ok().map(to_slash)
}
