// src/watch/watcher.rs

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use anyhow::{anyhow, Context, Result};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::watch::dedup::DedupCache;
use crate::watch::event::{FileEvent, FileEventKind};
use crate::watch::ignore::IgnoreRules;
use crate::watch::path_utils::relative_str;

/// Default capacity of the event queue.
pub const DEFAULT_BUFFER: usize = 2048;

/// Deletions cannot be stat'ed; they are stamped this far before "now" so a
/// later event for the same path always compares newer.
const DELETED_EVENT_SKEW: Duration = Duration::from_nanos(10);

/// State shared between the handle and the event pump.
struct Shared {
    watcher: Mutex<Option<RecommendedWatcher>>,
    roots: Mutex<Vec<PathBuf>>,
    ignore: IgnoreRules,
}

impl Shared {
    /// Path relative to the closest watched root, used for ignore checks.
    fn relative(&self, path: &Path) -> Option<String> {
        let roots = self.roots.lock().unwrap_or_else(PoisonError::into_inner);
        roots
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.as_os_str().len())
            .and_then(|root| relative_str(root, path))
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.relative(path)
            .is_some_and(|rel| self.ignore.is_ignored(&rel))
    }

    fn is_ignored_dir(&self, path: &Path) -> bool {
        self.relative(path)
            .is_some_and(|rel| self.ignore.is_ignored_dir(&rel))
    }

    /// Subscribe `dir` and every non-ignored directory below it.
    fn subscribe_tree(&self, dir: &Path) -> Result<()> {
        let mut stack = vec![dir.to_path_buf()];
        let mut first = true;

        while let Some(current) = stack.pop() {
            self.subscribe(&current)?;

            let entries = match fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(err) if first => {
                    return Err(err).with_context(|| format!("reading dir {current:?}"));
                }
                Err(err) => {
                    warn!(dir = ?current, error = %err, "skipping unreadable directory");
                    continue;
                }
            };
            first = false;

            for entry in entries.flatten() {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if is_dir && !self.is_ignored_dir(&entry.path()) {
                    stack.push(entry.path());
                }
            }
        }

        Ok(())
    }

    fn subscribe(&self, dir: &Path) -> Result<()> {
        let mut guard = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        let watcher = guard.as_mut().ok_or_else(|| anyhow!("file watcher is closed"))?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("watching {dir:?}"))?;
        debug!(?dir, "subscribed directory");
        Ok(())
    }
}

/// Item delivered by [`FileWatcher::next`].
#[derive(Debug)]
pub enum Notification {
    Event(FileEvent),
    Error(anyhow::Error),
}

/// Recursive file watcher built on `notify`.
///
/// Must be created inside a tokio runtime: raw notifications are forwarded
/// from notify's callback thread to a background task that filters,
/// de-duplicates and timestamps them before they reach [`next_event`].
///
/// [`next_event`]: FileWatcher::next_event
pub struct FileWatcher {
    shared: Arc<Shared>,
    events: mpsc::Receiver<FileEvent>,
    errors: mpsc::UnboundedReceiver<anyhow::Error>,
    pump: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_ignore(capacity, IgnoreRules::default())
    }

    pub fn with_ignore(capacity: usize, ignore: IgnoreRules) -> Result<Self> {
        // Channel from the blocking notify callback into the async world.
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The pump is gone once the watcher is closed.
                let _ = raw_tx.send(res);
            },
            Config::default(),
        )?;

        let (event_tx, event_rx) = mpsc::channel(capacity.max(1));
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            watcher: Mutex::new(Some(watcher)),
            roots: Mutex::new(Vec::new()),
            ignore,
        });

        let pump = tokio::spawn(pump_events(Arc::clone(&shared), raw_rx, event_tx, error_tx));

        Ok(Self {
            shared,
            events: event_rx,
            errors: error_rx,
            pump: Some(pump),
        })
    }

    /// Watch `path` and every directory below it.
    pub fn watch_recursive(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let root = path
            .canonicalize()
            .with_context(|| format!("resolving watch root {path:?}"))?;

        self.shared
            .roots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(root.clone());

        self.shared.subscribe_tree(&root)?;
        info!(root = ?root, "watching");
        Ok(())
    }

    /// Next change event; `None` once the watcher is closed.
    pub async fn next_event(&mut self) -> Option<FileEvent> {
        self.events.recv().await
    }

    /// Next watcher error; `None` once the watcher is closed.
    pub async fn next_error(&mut self) -> Option<anyhow::Error> {
        self.errors.recv().await
    }

    /// Next event or error, whichever arrives first; `None` once closed.
    pub async fn next(&mut self) -> Option<Notification> {
        tokio::select! {
            Some(event) = self.events.recv() => Some(Notification::Event(event)),
            Some(err) = self.errors.recv() => Some(Notification::Error(err)),
            else => None,
        }
    }

    /// Stop all OS subscriptions. Safe to call more than once.
    pub fn close(&mut self) {
        let watcher = self
            .shared
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if watcher.is_some() {
            drop(watcher);
            debug!("file watcher closed");
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

async fn pump_events(
    shared: Arc<Shared>,
    mut raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    event_tx: mpsc::Sender<FileEvent>,
    error_tx: mpsc::UnboundedSender<anyhow::Error>,
) {
    let mut cache = DedupCache::default();

    while let Some(res) = raw_rx.recv().await {
        let event = match res {
            Ok(event) => event,
            Err(err) => {
                let _ = error_tx.send(anyhow::Error::from(err));
                continue;
            }
        };

        let renamed = matches!(event.kind, EventKind::Modify(ModifyKind::Name(_)));

        for (path, kind) in FileEventKind::changes(&event) {
            match classify(&shared, &mut cache, kind, path, renamed) {
                Ok(Some(file_event)) => {
                    debug!(event = %file_event, "file event");
                    if event_tx.send(file_event).await.is_err() {
                        debug!("event receiver dropped; stopping watcher pump");
                        return;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    let _ = error_tx.send(err);
                }
            }
        }
    }

    debug!("watcher event pump finished");
}

/// Turn one raw notification for `path` into a deliverable event, if any.
///
/// `renamed` marks rename notifications: when their path is already gone it
/// left the tree, which is reported as a deletion.
fn classify(
    shared: &Shared,
    cache: &mut DedupCache,
    kind: FileEventKind,
    path: PathBuf,
    renamed: bool,
) -> Result<Option<FileEvent>> {
    if kind == FileEventKind::Deleted {
        if shared.is_ignored(&path) {
            return Ok(None);
        }
        return Ok(Some(deleted(cache, path)));
    }

    if shared.is_ignored_dir(&path) {
        return Ok(None);
    }

    let meta = match fs::metadata(&path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            if renamed && !shared.is_ignored(&path) {
                return Ok(Some(deleted(cache, path)));
            }
            return Ok(None);
        }
        Err(err) => return Err(err).with_context(|| format!("stat {path:?}")),
    };

    if meta.is_dir() {
        if kind == FileEventKind::Created {
            shared.subscribe_tree(&path)?;
        }
    } else if shared.is_ignored(&path) {
        return Ok(None);
    }

    let mtime = meta.modified().unwrap_or_else(|_| SystemTime::now());
    if !cache.should_emit(&path, mtime) {
        return Ok(None);
    }

    Ok(Some(FileEvent::new(path, kind, mtime)))
}

fn deleted(cache: &mut DedupCache, path: PathBuf) -> FileEvent {
    cache.forget(&path);
    let time = SystemTime::now() - DELETED_EVENT_SKEW;
    FileEvent::new(path, FileEventKind::Deleted, time)
}
