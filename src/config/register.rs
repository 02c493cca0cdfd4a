// src/config/register.rs

//! Turns Taskfile declarations into registered tasks.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::model::{CommandKind, NamespaceConfig, TaskConfig};
use crate::exec::RunOptions;
use crate::project::handler::{Context, Handler, HandlerFuture};
use crate::project::Namespace;

/// Runs a Taskfile command through the context's supervisor.
///
/// The command text may use `{{.task}}`, `{{.file}}` (the changed file, or
/// the task's watch patterns) and `{{.args}}` (arguments after `--`).
#[derive(Debug, Clone)]
pub struct CommandHandler {
    kind: CommandKind,
    command: String,
    options: RunOptions,
}

impl CommandHandler {
    pub fn new(kind: CommandKind, command: impl Into<String>, options: RunOptions) -> Self {
        Self {
            kind,
            command: command.into(),
            options,
        }
    }
}

impl Handler for CommandHandler {
    fn handle(&self, ctx: Context) -> HandlerFuture<'_> {
        Box::pin(async move {
            let opts = self
                .options
                .clone()
                .var("task", ctx.task.as_str())
                .var("file", ctx.any_file().join(" "))
                .var("args", ctx.args.join(" "));

            let supervisor = ctx.supervisor();
            match self.kind {
                CommandKind::Run => supervisor.run(&self.command, &opts).await,
                CommandKind::Bash => supervisor.bash(&self.command, &opts).await,
                CommandKind::Start => supervisor.start(&self.command, &opts).await,
            }
        })
    }
}

/// Register `tasks` and nested `namespaces` into `ns`. Commands run in
/// `base_dir`, or in their `dir` setting resolved against it.
pub fn register_tasks(
    ns: &mut Namespace,
    tasks: &BTreeMap<String, TaskConfig>,
    namespaces: &BTreeMap<String, NamespaceConfig>,
    base_dir: &Path,
) {
    for (name, cfg) in tasks {
        let task = ns.task(name, []);
        task.deps(cfg.deps.iter().cloned()).watch(cfg.watch.iter().cloned());
        if cfg.once {
            task.run_once(true);
        }
        if let Some(ms) = cfg.debounce_ms {
            task.debounce(Duration::from_millis(ms));
        }
        if let Some(description) = &cfg.description {
            task.description(description.as_str());
        }
        if let Some((kind, command)) = cfg.command() {
            let options = RunOptions {
                dir: Some(match &cfg.dir {
                    Some(dir) => base_dir.join(dir),
                    None => base_dir.to_path_buf(),
                }),
                env: cfg.env.clone(),
                ..RunOptions::default()
            };
            task.handler(Arc::new(CommandHandler::new(kind, command, options)));
        }
    }

    for (prefix, child) in namespaces {
        ns.use_namespace(prefix, |child_ns| {
            register_tasks(child_ns, &child.task, &child.namespace, base_dir);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::load_from_str;

    #[test]
    fn declarations_become_tasks() {
        let raw = load_from_str(
            r#"
            [task."setup?"]
            run = "echo setup"

            [task.build]
            deps = ["setup"]
            watch = ["src/**/*.rs"]
            debounce_ms = 100
            description = "Compile"
            run = "cargo build"

            [namespace.docs.task.html]
            bash = "make html"
            once = true
            "#,
        )
        .unwrap();

        let mut root = Namespace::default();
        register_tasks(&mut root, &raw.task, &raw.namespace, Path::new("/work"));

        let setup = root.get_task("setup").unwrap();
        assert!(setup.is_run_once());
        assert!(setup.get_handler().is_some());

        let build = root.get_task("build").unwrap();
        assert_eq!(build.dependencies(), ["setup"]);
        assert_eq!(build.watch_globs(), ["src/**/*.rs"]);
        assert_eq!(build.debounce_interval(), Some(Duration::from_millis(100)));
        assert_eq!(build.describe("build"), "Compile");

        let html = root.child("docs").and_then(|d| d.get_task("html")).unwrap();
        assert!(html.is_run_once());
    }
}
