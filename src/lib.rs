// src/lib.rs

pub mod cli;
pub mod config;
pub mod env;
pub mod errors;
pub mod exec;
pub mod glob;
pub mod logging;
pub mod project;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::{build_project, config_root_dir, load_and_validate};
use crate::project::Project;

/// Task run when none is named on the command line.
pub const DEFAULT_TASK: &str = "default";

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - Taskfile loading
/// - project construction
/// - running the requested tasks
/// - (optional) watching
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let project = Arc::new(build_project(&cfg, config_root_dir(&config_path)));

    if args.list {
        print!("{}", project.usage());
        return Ok(());
    }

    project.set_args(args.args.clone());
    let tasks = if args.tasks.is_empty() {
        vec![DEFAULT_TASK.to_string()]
    } else {
        args.tasks.clone()
    };

    tokio::select! {
        res = drive(&project, &tasks, args.watch) => res,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("interrupted; stopping started processes");
            project.stop_watching();
            project.supervisor().kill_all().await;
            Ok(())
        }
    }
}

async fn drive(project: &Arc<Project>, tasks: &[String], watch: bool) -> Result<()> {
    // Unknown names fail before anything runs.
    for name in tasks {
        project.resolve(name)?;
    }

    for name in tasks {
        match project.run(name).await {
            Ok(()) => {}
            Err(err) if err.is_definition_error() => return Err(err.into()),
            // A failed build shouldn't stop the watcher from retrying.
            Err(err) if watch => error!("{err}"),
            Err(err) => return Err(err.into()),
        }
    }

    if watch {
        let targets = watch_targets(project, tasks)?;
        if project.watch(&targets).await? {
            project.wait_watchers().await;
            return Ok(());
        }
        warn!(tasks = ?targets, "nothing to watch; no task declares watch patterns");
    }

    if project.supervisor().running() > 0 {
        debug!("waiting for started processes to exit");
        project.supervisor().wait().await;
    }
    Ok(())
}

/// Tasks to watch. A lone `default` task without patterns of its own stands
/// for its dependencies, each watched individually.
fn watch_targets(project: &Project, tasks: &[String]) -> Result<Vec<String>> {
    if let [only] = tasks {
        if only == DEFAULT_TASK {
            let resolved = project.resolve(only)?;
            let deps = resolved.task.dependencies();
            if resolved.task.watch_globs().is_empty() && !deps.is_empty() {
                return Ok(deps.to_vec());
            }
        }
    }
    Ok(tasks.to_vec())
}
