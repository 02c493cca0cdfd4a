// src/project/mod.rs

//! Task graph: namespaces of tasks, dependency-ordered execution, debounce,
//! run-once tasks and watch-triggered re-runs.
//!
//! ```no_run
//! use watchtask::project::{handler, Project, TaskOption};
//!
//! # async fn demo() -> watchtask::errors::Result<()> {
//! let project = Project::new(|p| {
//!     p.task("clean", [TaskOption::handler(handler::func(|| println!("clean")))]);
//!     p.task("build", [TaskOption::deps(["clean"]), TaskOption::watch(["src/**/*.rs"])])
//!         .handler(handler::try_with_context(|ctx| async move { ctx.run("cargo build").await }));
//! });
//! project.run("build").await?;
//! # Ok(())
//! # }
//! ```

pub mod debounce;
pub mod graph;
pub mod handler;
pub mod name;
pub mod task;
pub mod watch;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{Result, WatchtaskError};
use crate::exec::Supervisor;
use crate::glob::{effective_match, glob_in, CompiledGlob};
use crate::watch::{relative_str, FileEvent, DEFAULT_BUFFER, DEFAULT_EXCLUSIONS};

pub use debounce::DEFAULT_DEBOUNCE;
pub use graph::{Namespace, Resolved};
pub use handler::{Context, Handler, HandlerFuture};
pub use name::{TaskRef, NAMESPACE_SEPARATOR, ROOT_MARKER, RUN_ONCE_MARKER};
pub use task::{Task, TaskOption};

type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Project-wide settings.
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    /// Base for glob expansion and event paths; the current directory when
    /// unset.
    pub work_dir: Option<PathBuf>,
    /// Debounce for tasks that don't set their own.
    pub default_debounce: Duration,
    /// Event queue capacity per watched root.
    pub watch_buffer: usize,
    /// Directory names or globs the watcher skips.
    pub ignore: Vec<String>,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            work_dir: None,
            default_debounce: DEFAULT_DEBOUNCE,
            watch_buffer: DEFAULT_BUFFER,
            ignore: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A tree of namespaced tasks plus the runtime state needed to run them.
pub struct Project {
    root: Namespace,
    options: ProjectOptions,
    supervisor: Arc<Supervisor>,
    args: RwLock<Vec<String>>,
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("root", &self.root)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Project {
    pub fn new(register: impl FnOnce(&mut Namespace)) -> Self {
        Self::with_options(
            ProjectOptions::default(),
            Arc::new(Supervisor::default()),
            register,
        )
    }

    pub fn with_options(
        options: ProjectOptions,
        supervisor: Arc<Supervisor>,
        register: impl FnOnce(&mut Namespace),
    ) -> Self {
        let mut project = Self {
            root: Namespace::default(),
            options,
            supervisor,
            args: RwLock::new(Vec::new()),
            watchers: Mutex::new(Vec::new()),
        };
        project.register(register);
        project
    }

    /// Add tasks to the root namespace.
    pub fn register(&mut self, register: impl FnOnce(&mut Namespace)) {
        register(&mut self.root);
    }

    pub fn root(&self) -> &Namespace {
        &self.root
    }

    pub fn options(&self) -> &ProjectOptions {
        &self.options
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    pub fn work_dir(&self) -> PathBuf {
        match &self.options.work_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Arguments handed to every handler through [`Context::args`].
    pub fn set_args(&self, args: Vec<String>) {
        *self.args.write().unwrap_or_else(PoisonError::into_inner) = args;
    }

    fn args(&self) -> Vec<String> {
        self.args
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Look up a task by reference from the root namespace.
    pub fn resolve(&self, reference: &str) -> Result<Resolved<'_>> {
        graph::resolve(&self.root, &[], reference)
    }

    /// Check every task name, dependency reference and the absence of cycles.
    pub fn validate(&self) -> Result<()> {
        graph::validate_tree(&self.root)
    }

    /// Forget debounce history and completion flags.
    pub fn reset(&self) {
        self.root.walk(&mut Vec::new(), &mut |_, node| {
            node.last_runs.clear();
            for task in node.tasks() {
                task.reset();
            }
        });
    }

    /// Task listing: one line per task, sorted by qualified name.
    pub fn usage(&self) -> String {
        let mut rows: Vec<(String, String)> = Vec::new();
        self.root.walk(&mut Vec::new(), &mut |path, node| {
            for task in node.tasks() {
                let qualified = name::qualify(path, task.name());
                let description = task.describe(&qualified);
                rows.push((qualified, description));
            }
        });
        rows.sort();

        let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        let mut out = String::from("Tasks:\n");
        for (name, description) in rows {
            out.push_str(&format!("  {name:<width$}  {description}\n"));
        }
        out
    }

    /// Run a task and its dependencies.
    ///
    /// Every reference reachable from `name` is resolved before anything
    /// runs, so a definition error never leaves work half done.
    pub async fn run(&self, name: &str) -> Result<()> {
        graph::check_dependencies(&self.root, vec![(Vec::new(), name.to_string())])?;
        self.run_task(Vec::new(), name.to_string(), name.to_string(), None)
            .await
    }

    /// Run a task because `event` happened. Nothing runs unless the event's
    /// path matches the task's effective watch patterns.
    pub async fn run_with_event(&self, name: &str, event: &FileEvent) -> Result<()> {
        graph::check_dependencies(&self.root, vec![(Vec::new(), name.to_string())])?;
        self.run_task(Vec::new(), name.to_string(), name.to_string(), Some(event))
            .await
    }

    fn run_task<'a>(
        &'a self,
        scope: Vec<String>,
        reference: String,
        log_name: String,
        event: Option<&'a FileEvent>,
    ) -> RunFuture<'a> {
        Box::pin(async move {
            let resolved = graph::resolve(&self.root, &scope, &reference)?;
            let task = resolved.task;

            if task.is_run_once() && task.is_completed() {
                debug!(task = %log_name, "already ran");
                return Ok(());
            }

            if let Some(event) = event {
                if !self.is_watched(&resolved, event)? {
                    debug!(task = %log_name, path = ?event.path, "change does not match watch patterns");
                    return Ok(());
                }
            }

            let window = task
                .debounce_interval()
                .unwrap_or(self.options.default_debounce);
            if !resolved.node.last_runs.try_begin(task.name(), window) {
                debug!(task = %log_name, "debounced");
                return Ok(());
            }

            for dep in task.dependencies() {
                self.run_task(
                    resolved.scope.clone(),
                    dep.clone(),
                    format!("{log_name}>{dep}"),
                    None,
                )
                .await?;
            }

            self.invoke(task, &log_name, event).await
        })
    }

    /// Expand `task`'s watch patterns once, walking the file system on the
    /// blocking pool.
    pub(crate) async fn expand_watch(&self, task: &Task) -> anyhow::Result<()> {
        if task.watch_globs().is_empty() || task.expansion().is_some() {
            return Ok(());
        }

        let base = self.work_dir();
        let patterns = task.watch_globs().to_vec();
        let matches = tokio::task::spawn_blocking(move || glob_in(&base, &patterns))
            .await
            .context("glob expansion task panicked")??;
        task.record_expansion(matches);
        Ok(())
    }

    async fn invoke(&self, task: &Task, log_name: &str, event: Option<&FileEvent>) -> Result<()> {
        let started = Instant::now();

        if let Err(err) = self.expand_watch(task).await {
            warn!(task = %log_name, error = %err, "expanding watch patterns");
        }

        let Some(handler) = task.get_handler() else {
            if task.dependencies().is_empty() {
                info!(task = %log_name, "ignored; task has no handler or dependencies");
            } else {
                task.mark_completed();
            }
            return Ok(());
        };

        if let Some(event) = event {
            debug!(task = %log_name, "{event}");
        }

        let mut ctx = Context::new(log_name, Arc::clone(&self.supervisor));
        ctx.event = event.cloned();
        ctx.watch_globs = task.watch_globs().to_vec();
        ctx.args = self.args();

        handler
            .handle(ctx)
            .await
            .map_err(|source| WatchtaskError::Task {
                task: log_name.to_string(),
                source,
            })?;

        info!(
            task = %log_name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            rebuilt = event.is_some(),
            "finished"
        );
        task.mark_completed();
        Ok(())
    }

    fn is_watched(&self, resolved: &Resolved<'_>, event: &FileEvent) -> Result<bool> {
        let Some(rel) = relative_str(&self.work_dir(), &event.path) else {
            return Ok(false);
        };
        let matchers = self.effective_matchers(resolved)?;
        Ok(effective_match(matchers, &rel))
    }

    /// A task's own matchers followed by those of its dependencies,
    /// gathered recursively in declaration order.
    pub(crate) fn effective_matchers<'a>(&self, resolved: &Resolved<'a>) -> Result<&'a [CompiledGlob]> {
        resolved.task.effective_matchers(|| {
            let mut matchers = resolved.task.matchers()?.to_vec();
            for dep in resolved.task.dependencies() {
                let dep_resolved = graph::resolve(&self.root, &resolved.scope, dep)?;
                matchers.extend_from_slice(self.effective_matchers(&dep_resolved)?);
            }
            Ok(matchers)
        })
    }

    /// A task's watch patterns plus those of its dependencies.
    pub(crate) fn effective_globs(&self, resolved: &Resolved<'_>) -> Result<Vec<String>> {
        let mut globs = resolved.task.watch_globs().to_vec();
        for dep in resolved.task.dependencies() {
            let dep_resolved = graph::resolve(&self.root, &resolved.scope, dep)?;
            globs.extend(self.effective_globs(&dep_resolved)?);
        }
        Ok(globs)
    }
}
