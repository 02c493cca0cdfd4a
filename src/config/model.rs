// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::env::Environment;
use crate::project::DEFAULT_DEBOUNCE;
use crate::watch::{DEFAULT_BUFFER, DEFAULT_EXCLUSIONS};

/// Taskfile exactly as deserialized, before validation.
///
/// ```toml
/// [config]
/// debounce_ms = 2000
/// ignore = ["node_modules", "target"]
///
/// [env]
/// vars = "PATH=./bin::$PATH"
///
/// [task.build]
/// deps = ["clean"]
/// watch = ["src/**/*.rs"]
/// run = "cargo build"
///
/// [namespace.docs.task.html]
/// bash = "make html"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTaskfile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub env: Environment,

    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    #[serde(default)]
    pub namespace: BTreeMap<String, NamespaceConfig>,
}

/// A validated Taskfile.
///
/// Only constructed through `TryFrom<RawTaskfile>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct Taskfile {
    pub config: ConfigSection,
    pub env: Environment,
    pub task: BTreeMap<String, TaskConfig>,
    pub namespace: BTreeMap<String, NamespaceConfig>,
}

impl Taskfile {
    pub(crate) fn new_unchecked(raw: RawTaskfile) -> Self {
        Self {
            config: raw.config,
            env: raw.env,
            task: raw.task,
            namespace: raw.namespace,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Debounce for tasks without their own `debounce_ms`.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Directory names or globs the watcher skips.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Event queue capacity per watched root.
    #[serde(default = "default_watch_buffer")]
    pub watch_buffer: usize,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

fn default_ignore() -> Vec<String> {
    DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect()
}

fn default_watch_buffer() -> usize {
    DEFAULT_BUFFER
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            ignore: default_ignore(),
            watch_buffer: default_watch_buffer(),
        }
    }
}

/// `[task.<name>]` section. At most one of `run`, `bash` and `start` may be
/// set; a task with none only runs its dependencies.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    #[serde(default)]
    pub deps: Vec<String>,

    #[serde(default)]
    pub watch: Vec<String>,

    #[serde(default)]
    pub debounce_ms: Option<u64>,

    #[serde(default)]
    pub description: Option<String>,

    /// Command run to completion.
    #[serde(default)]
    pub run: Option<String>,

    /// Script run to completion with bash.
    #[serde(default)]
    pub bash: Option<String>,

    /// Long-running command, killed and restarted on every run.
    #[serde(default)]
    pub start: Option<String>,

    /// Working directory, relative to the Taskfile.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Extra `KEY=VALUE` pairs for this task's command.
    #[serde(default)]
    pub env: Vec<String>,

    /// Run at most once per process, like a `?` suffix on the name.
    #[serde(default)]
    pub once: bool,
}

/// Kind of command a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Run,
    Bash,
    Start,
}

impl TaskConfig {
    /// Every command the task declares, with its kind.
    pub fn commands(&self) -> Vec<(CommandKind, &str)> {
        [
            (CommandKind::Run, &self.run),
            (CommandKind::Bash, &self.bash),
            (CommandKind::Start, &self.start),
        ]
        .into_iter()
        .filter_map(|(kind, cmd)| cmd.as_deref().map(|c| (kind, c)))
        .collect()
    }

    /// The task's command, if it declares exactly one.
    pub fn command(&self) -> Option<(CommandKind, &str)> {
        match self.commands().as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }
}

/// `[namespace.<prefix>]` section; nests like the top level.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NamespaceConfig {
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    #[serde(default)]
    pub namespace: BTreeMap<String, NamespaceConfig>,
}
