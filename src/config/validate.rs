// src/config/validate.rs

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::model::{NamespaceConfig, RawTaskfile, TaskConfig, Taskfile};
use crate::config::register::register_tasks;
use crate::errors::{Result, WatchtaskError};
use crate::project::graph::{validate_tree, Namespace};
use crate::project::name::{is_valid_name, strip_run_once};

impl TryFrom<RawTaskfile> for Taskfile {
    type Error = WatchtaskError;

    fn try_from(raw: RawTaskfile) -> std::result::Result<Self, Self::Error> {
        validate_raw_taskfile(&raw)?;
        Ok(Taskfile::new_unchecked(raw))
    }
}

fn validate_raw_taskfile(cfg: &RawTaskfile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_tasks(&cfg.task, &cfg.namespace, "")?;
    validate_dependencies(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawTaskfile) -> Result<()> {
    fn count(tasks: &BTreeMap<String, TaskConfig>, namespaces: &BTreeMap<String, NamespaceConfig>) -> usize {
        tasks.len()
            + namespaces
                .values()
                .map(|ns| count(&ns.task, &ns.namespace))
                .sum::<usize>()
    }

    if count(&cfg.task, &cfg.namespace) == 0 {
        return Err(WatchtaskError::Config(
            "Taskfile must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawTaskfile) -> Result<()> {
    if cfg.config.watch_buffer == 0 {
        return Err(WatchtaskError::Config(
            "[config].watch_buffer must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_tasks(
    tasks: &BTreeMap<String, TaskConfig>,
    namespaces: &BTreeMap<String, NamespaceConfig>,
    prefix: &str,
) -> Result<()> {
    for (name, task) in tasks {
        let (bare, _) = strip_run_once(name);
        if !is_valid_name(bare) {
            return Err(WatchtaskError::InvalidTaskName(format!("{prefix}{name}")));
        }
        if task.commands().len() > 1 {
            return Err(WatchtaskError::Config(format!(
                "task '{prefix}{name}' declares more than one of `run`, `bash`, `start`"
            )));
        }
        if task.commands().iter().any(|(_, cmd)| cmd.trim().is_empty()) {
            return Err(WatchtaskError::Config(format!(
                "task '{prefix}{name}' has an empty command"
            )));
        }
    }

    for (ns, child) in namespaces {
        if !is_valid_name(ns) {
            return Err(WatchtaskError::InvalidTaskName(format!("{prefix}{ns}")));
        }
        validate_tasks(&child.task, &child.namespace, &format!("{prefix}{ns}:"))?;
    }
    Ok(())
}

fn validate_dependencies(cfg: &RawTaskfile) -> Result<()> {
    let mut root = Namespace::default();
    register_tasks(&mut root, &cfg.task, &cfg.namespace, Path::new("."));
    validate_tree(&root)
}

#[cfg(test)]
mod tests {
    use crate::config::loader::load_from_str;

    use super::*;

    fn check(toml: &str) -> Result<Taskfile> {
        Taskfile::try_from(load_from_str(toml)?)
    }

    #[test]
    fn minimal_taskfile_is_valid() {
        let cfg = check("[task.hello]\nrun = \"echo hello\"\n").unwrap();
        assert_eq!(cfg.config.debounce_ms, 2000);
        assert_eq!(cfg.config.ignore, vec!["node_modules"]);
        assert!(cfg.env.inherit);
    }

    #[test]
    fn empty_taskfile_is_rejected() {
        assert!(matches!(check(""), Err(WatchtaskError::Config(_))));
    }

    #[test]
    fn tasks_may_declare_only_one_command() {
        let err = check("[task.a]\nrun = \"x\"\nbash = \"y\"\n").unwrap_err();
        assert!(err.to_string().contains("more than one"));
    }

    #[test]
    fn unknown_dependencies_are_rejected() {
        let err = check("[task.a]\ndeps = [\"b\"]\n").unwrap_err();
        assert!(matches!(err, WatchtaskError::TaskNotFound(ref n) if n == "b"));
    }

    #[test]
    fn cycles_are_rejected() {
        let err = check("[task.a]\ndeps = [\"b\"]\n[task.b]\ndeps = [\"a\"]\n").unwrap_err();
        assert!(matches!(err, WatchtaskError::DependencyCycle(_)));
    }

    #[test]
    fn namespaced_dependencies_resolve() {
        let cfg = check(
            r#"
            [task.all]
            deps = ["docs:html"]

            [namespace.docs.task.html]
            deps = ["/clean"]
            bash = "echo html"

            [task.clean]
            run = "echo clean"
            "#,
        );
        assert!(cfg.is_ok(), "{cfg:?}");
    }

    #[test]
    fn invalid_names_are_rejected() {
        let err = check("[task.\"a:b\"]\nrun = \"x\"\n").unwrap_err();
        assert!(matches!(err, WatchtaskError::InvalidTaskName(_)));
    }
}
