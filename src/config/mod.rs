// src/config/mod.rs

//! Taskfile configuration for the `watchtask` binary.
//!
//! - [`model`]: the TOML-backed data model.
//! - [`loader`]: reading a Taskfile from disk.
//! - [`validate`]: names, commands, dependency references and cycles.
//! - [`register`]: turning declarations into project tasks.

pub mod loader;
pub mod model;
pub mod register;
pub mod validate;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::exec::{Supervisor, SupervisorConfig};
use crate::project::{Project, ProjectOptions};

pub use loader::{config_root_dir, default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{CommandKind, ConfigSection, NamespaceConfig, RawTaskfile, TaskConfig, Taskfile};
pub use register::{register_tasks, CommandHandler};

/// Build a project from a validated Taskfile rooted at `work_dir`.
pub fn build_project(cfg: &Taskfile, work_dir: PathBuf) -> Project {
    let options = ProjectOptions {
        work_dir: Some(work_dir.clone()),
        default_debounce: Duration::from_millis(cfg.config.debounce_ms),
        watch_buffer: cfg.config.watch_buffer,
        ignore: cfg.config.ignore.clone(),
    };
    let supervisor = Arc::new(Supervisor::new(SupervisorConfig {
        env: cfg.env.clone(),
        ..SupervisorConfig::default()
    }));

    Project::with_options(options, supervisor, |root| {
        register_tasks(root, &cfg.task, &cfg.namespace, &work_dir);
    })
}
