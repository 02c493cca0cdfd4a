// src/exec/inside.rs

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, error};

/// Restores the previous working directory when dropped.
struct CwdGuard {
    previous: PathBuf,
}

impl CwdGuard {
    fn enter(dir: &Path) -> Result<Self> {
        let previous = std::env::current_dir().context("reading current directory")?;
        std::env::set_current_dir(dir).with_context(|| format!("changing directory to {dir:?}"))?;
        debug!(?dir, "entered directory");
        Ok(Self { previous })
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        if let Err(err) = std::env::set_current_dir(&self.previous) {
            error!(dir = ?self.previous, error = %err, "failed to restore working directory");
        }
    }
}

/// Run `f` with `dir` as the process working directory.
///
/// The previous directory is restored on every exit path, including errors
/// and panics. The working directory is process-wide state.
pub fn inside<T>(dir: impl AsRef<Path>, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let _guard = CwdGuard::enter(dir.as_ref())?;
    f()
}

/// Async variant of [`inside`]. The directory stays changed across every
/// await point of `fut`.
pub async fn inside_async<T, F>(dir: impl AsRef<Path>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let _guard = CwdGuard::enter(dir.as_ref())?;
    fut.await
}
