// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawTaskfile, Taskfile};
use crate::errors::Result;

/// Read and deserialize a Taskfile without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawTaskfile> {
    let contents = fs::read_to_string(path.as_ref())?;
    load_from_str(&contents)
}

pub fn load_from_str(contents: &str) -> Result<RawTaskfile> {
    let raw: RawTaskfile = toml::from_str(contents)?;
    Ok(raw)
}

/// Read, deserialize and validate a Taskfile.
///
/// Checks, beyond TOML syntax:
/// - at least one task is declared
/// - every task declares at most one of `run`, `bash`, `start`
/// - names are usable as task references
/// - dependencies resolve and form no cycle
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Taskfile> {
    let raw = load_from_path(&path)?;
    Taskfile::try_from(raw)
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("Taskfile.toml")
}

/// Directory relative task paths resolve against: the Taskfile's parent, or
/// the current directory for a bare file name.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    let dir = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    dir.canonicalize().unwrap_or(dir)
}
