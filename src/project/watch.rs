// src/project/watch.rs

//! Watch mode: one watcher per distinct root directory of a task's effective
//! watch patterns, re-running the task on matching changes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::SystemTime;

use anyhow::{Context as _, Result as AnyResult};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::glob::watch_roots;
use crate::project::{graph, Project};
use crate::watch::{FileEvent, FileWatcher, IgnoreRules, Notification};

impl Project {
    /// Directories that watching `name` subscribes to, relative to the work
    /// directory.
    pub fn watched_roots(&self, name: &str) -> Result<Vec<String>> {
        let resolved = self.resolve(name)?;
        Ok(watch_roots(&self.effective_globs(&resolved)?))
    }

    /// Start watching the named tasks.
    ///
    /// Returns once every watch loop has been launched; the loops keep
    /// running in the background until [`stop_watching`] is called. Returns
    /// `false` if none of the tasks (or their dependencies) watch anything.
    ///
    /// [`stop_watching`]: Project::stop_watching
    pub async fn watch(self: &Arc<Self>, names: &[String]) -> Result<bool> {
        let work_dir = self.work_dir();
        let mut plans: Vec<(String, Vec<String>)> = Vec::new();

        for name in names {
            graph::check_dependencies(self.root(), vec![(Vec::new(), name.clone())])?;
            let resolved = self.resolve(name)?;
            let globs = self.effective_globs(&resolved)?;
            if globs.is_empty() {
                debug!(task = %name, "no watch patterns");
                continue;
            }
            self.expand_watch(resolved.task).await?;
            plans.push((name.clone(), watch_roots(&globs)));
        }

        if plans.is_empty() {
            return Ok(false);
        }

        let ignore = IgnoreRules::new(&self.options().ignore)?;
        let mut launched = Vec::new();
        let mut handles = Vec::new();

        for (name, roots) in plans {
            for root in roots {
                let dir = if root == "." {
                    work_dir.clone()
                } else {
                    work_dir.join(&root)
                };
                let (ready_tx, ready_rx) = oneshot::channel();
                handles.push(tokio::spawn(watch_loop(
                    Arc::clone(self),
                    name.clone(),
                    dir.clone(),
                    ignore.clone(),
                    ready_tx,
                )));
                launched.push((name.clone(), dir, ready_rx));
            }
        }

        // Barrier: every loop has subscribed (or failed) before returning.
        for (name, dir, ready) in launched {
            match ready.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(task = %name, root = ?dir, error = %err, "could not watch"),
                Err(_) => warn!(task = %name, root = ?dir, "watch loop exited before starting"),
            }
        }

        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(handles);
        Ok(true)
    }

    /// Abort every watch loop.
    pub fn stop_watching(&self) {
        let handles: Vec<_> = self
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            handle.abort();
        }
    }

    /// Wait for every watch loop to finish.
    pub async fn wait_watchers(&self) {
        let handles: Vec<_> = self
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    error!(error = %err, "watch loop panicked");
                }
            }
        }
    }
}

async fn watch_loop(
    project: Arc<Project>,
    name: String,
    dir: PathBuf,
    ignore: IgnoreRules,
    ready: oneshot::Sender<AnyResult<()>>,
) {
    let mut watcher = match subscribe(&project, &dir, ignore).await {
        Ok(watcher) => watcher,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    info!(task = %name, root = ?dir, "watching");
    let _ = ready.send(Ok(()));

    let mut last_event: Option<SystemTime> = None;
    while let Some(notification) = watcher.next().await {
        match notification {
            Notification::Event(event) => {
                if !accept_in_order(&mut last_event, &event) {
                    debug!(task = %name, event = %event, "discarding out-of-order event");
                    continue;
                }

                if let Err(err) = project.run_with_event(&name, &event).await {
                    error!(task = %name, error = %err, "task failed");
                }
            }
            Notification::Error(err) => warn!(task = %name, error = %err, "watcher error"),
        }
    }

    debug!(task = %name, root = ?dir, "watch loop finished");
}

/// Record `event` as the latest seen unless it is older than the last one.
fn accept_in_order(last: &mut Option<SystemTime>, event: &FileEvent) -> bool {
    if last.is_some_and(|last| event.time < last) {
        return false;
    }
    *last = Some(event.time);
    true
}

async fn subscribe(project: &Project, dir: &Path, ignore: IgnoreRules) -> AnyResult<FileWatcher> {
    // The pump task needs the runtime; the directory walk does not.
    let watcher = FileWatcher::with_ignore(project.options().watch_buffer, ignore)?;
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        watcher.watch_recursive(&dir)?;
        Ok::<_, anyhow::Error>(watcher)
    })
    .await
    .context("subscribing watch root panicked")?
}
