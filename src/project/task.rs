// src/project/task.rs

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::warn;

use crate::glob::{compile, glob_in, CompiledGlob, GlobMatches};
use crate::project::handler::Handler;

/// Typed options accepted by [`Namespace::task`].
///
/// [`Namespace::task`]: crate::project::Namespace::task
#[derive(Clone)]
pub enum TaskOption {
    Deps(Vec<String>),
    Watch(Vec<String>),
    Debounce(Duration),
    Description(String),
    Handler(Arc<dyn Handler>),
}

impl TaskOption {
    pub fn deps<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TaskOption::Deps(names.into_iter().map(Into::into).collect())
    }

    pub fn watch<I, S>(globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TaskOption::Watch(globs.into_iter().map(Into::into).collect())
    }

    pub fn debounce_ms(ms: u64) -> Self {
        TaskOption::Debounce(Duration::from_millis(ms))
    }

    pub fn description(text: impl Into<String>) -> Self {
        TaskOption::Description(text.into())
    }

    pub fn handler(handler: Arc<dyn Handler>) -> Self {
        TaskOption::Handler(handler)
    }
}

impl fmt::Debug for TaskOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOption::Deps(d) => f.debug_tuple("Deps").field(d).finish(),
            TaskOption::Watch(w) => f.debug_tuple("Watch").field(w).finish(),
            TaskOption::Debounce(d) => f.debug_tuple("Debounce").field(d).finish(),
            TaskOption::Description(d) => f.debug_tuple("Description").field(d).finish(),
            TaskOption::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// A named unit of work.
///
/// Watch patterns are compiled and expanded lazily, on first use.
pub struct Task {
    name: String,
    description: String,
    deps: Vec<String>,
    handler: Option<Arc<dyn Handler>>,
    watch: Vec<String>,
    debounce: Option<Duration>,
    run_once: bool,
    completed: AtomicBool,
    matchers: OnceLock<Vec<CompiledGlob>>,
    effective: OnceLock<Vec<CompiledGlob>>,
    files: OnceLock<GlobMatches>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("watch", &self.watch)
            .field("debounce", &self.debounce)
            .field("run_once", &self.run_once)
            .field("has_handler", &self.handler.is_some())
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            deps: Vec::new(),
            handler: None,
            watch: Vec::new(),
            debounce: None,
            run_once: false,
            completed: AtomicBool::new(false),
            matchers: OnceLock::new(),
            effective: OnceLock::new(),
            files: OnceLock::new(),
        }
    }

    pub fn apply(&mut self, option: TaskOption) -> &mut Self {
        match option {
            TaskOption::Deps(deps) => self.deps(deps),
            TaskOption::Watch(globs) => self.watch(globs),
            TaskOption::Debounce(d) => self.debounce(d),
            TaskOption::Description(text) => self.description(text),
            TaskOption::Handler(h) => self.handler(h),
        }
    }

    pub fn deps<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = names.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the watch patterns. An empty list keeps the current ones.
    pub fn watch<I, S>(&mut self, globs: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let globs: Vec<String> = globs.into_iter().map(Into::into).collect();
        if !globs.is_empty() {
            self.watch = globs;
            self.matchers = OnceLock::new();
            self.effective = OnceLock::new();
            self.files = OnceLock::new();
        }
        self
    }

    /// Minimum time between two runs. `Duration::ZERO` disables debouncing
    /// for this task.
    pub fn debounce(&mut self, interval: Duration) -> &mut Self {
        self.debounce = Some(interval);
        self
    }

    pub fn description(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        if !text.is_empty() {
            self.description = text;
        }
        self
    }

    pub fn handler(&mut self, handler: Arc<dyn Handler>) -> &mut Self {
        self.handler = Some(handler);
        self
    }

    pub fn run_once(&mut self, run_once: bool) -> &mut Self {
        self.run_once = run_once;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.deps
    }

    pub fn watch_globs(&self) -> &[String] {
        &self.watch
    }

    pub fn debounce_interval(&self) -> Option<Duration> {
        self.debounce
    }

    pub fn get_handler(&self) -> Option<&Arc<dyn Handler>> {
        self.handler.as_ref()
    }

    pub fn is_run_once(&self) -> bool {
        self.run_once
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_completed(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reset(&self) {
        self.completed.store(false, Ordering::SeqCst);
    }

    /// Description for listings; synthesised from the dependencies when unset.
    pub fn describe(&self, qualified: &str) -> String {
        if !self.description.is_empty() {
            return self.description.clone();
        }
        if self.deps.is_empty() {
            format!("Runs {qualified} task")
        } else {
            format!("Runs {{{}, {qualified}}} tasks", self.deps.join(", "))
        }
    }

    /// Compiled watch patterns, in declaration order.
    pub fn matchers(&self) -> anyhow::Result<&[CompiledGlob]> {
        if let Some(matchers) = self.matchers.get() {
            return Ok(matchers);
        }
        let compiled = self
            .watch
            .iter()
            .map(|g| compile(g))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(self.matchers.get_or_init(|| compiled))
    }

    pub(crate) fn effective_matchers(
        &self,
        gather: impl FnOnce() -> crate::errors::Result<Vec<CompiledGlob>>,
    ) -> crate::errors::Result<&[CompiledGlob]> {
        if let Some(matchers) = self.effective.get() {
            return Ok(matchers);
        }
        let gathered = gather()?;
        Ok(self.effective.get_or_init(|| gathered))
    }

    /// Expand the watch patterns against `base` once; later calls return
    /// the cached result. Patterns matching nothing are reported, not fatal.
    pub fn expand(&self, base: &Path) -> anyhow::Result<&GlobMatches> {
        if let Some(files) = self.files.get() {
            return Ok(files);
        }
        Ok(self.record_expansion(glob_in(base, &self.watch)?))
    }

    /// The cached expansion, if the patterns have been expanded.
    pub fn expansion(&self) -> Option<&GlobMatches> {
        self.files.get()
    }

    pub(crate) fn record_expansion(&self, matches: GlobMatches) -> &GlobMatches {
        for matcher in matches.matchers.iter().filter(|m| !m.is_negated()) {
            if !matches.files.iter().any(|f| matcher.is_match(&f.path)) {
                warn!(
                    task = %self.name,
                    pattern = %matcher.pattern(),
                    "watch pattern did not match any files"
                );
            }
        }
        self.files.get_or_init(|| matches)
    }
}
