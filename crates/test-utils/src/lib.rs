//! Shared helpers for `watchtask` tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};
use std::time::SystemTime;

use tempfile::TempDir;
use tracing_subscriber::{fmt, EnvFilter};
use watchtask::watch::{FileEvent, FileEventKind};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 10-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}

/// Shared, ordered record of what handlers did.
#[derive(Debug, Clone, Default)]
pub struct Trace(Arc<Mutex<String>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, s: &str) {
        self.0.lock().unwrap().push_str(s);
    }

    pub fn get(&self) -> String {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    /// A closure appending `s`, for `handler::func`.
    pub fn appender(&self, s: &'static str) -> impl Fn() + Send + Sync + 'static {
        let trace = self.clone();
        move || trace.push(s)
    }
}

/// Temporary directory populated with files.
pub struct TreeBuilder {
    dir: TempDir,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn file(self, rel: &str, contents: &str) -> Self {
        write_file(self.dir.path(), rel, contents);
        self
    }

    pub fn dir(self, rel: &str) -> Self {
        fs::create_dir_all(self.dir.path().join(rel)).expect("create dir");
        self
    }

    pub fn build(self) -> TempDir {
        self.dir
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a file below `root`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(&path, contents).expect("write file");
    path
}

/// A modification event for `path`, stamped now.
pub fn modified(path: impl Into<PathBuf>) -> FileEvent {
    FileEvent::new(path, FileEventKind::Modified, SystemTime::now())
}

/// A deletion event for `path`, stamped now.
pub fn deleted(path: impl Into<PathBuf>) -> FileEvent {
    FileEvent::new(path, FileEventKind::Deleted, SystemTime::now())
}

