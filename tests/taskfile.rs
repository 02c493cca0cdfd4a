#![cfg(unix)]

mod common;

use std::fs;

use watchtask::cli::CliArgs;
use watchtask::config::{build_project, config_root_dir, load_and_validate};
use watchtask::errors::WatchtaskError;

use crate::common::{init_tracing, TestResult, TreeBuilder};

const TASKFILE: &str = r#"
[config]
debounce_ms = 0

[env]
vars = "GREETING=hello"

[task.setup]
bash = "echo setup >> log.txt"

[task.greet]
deps = ["setup"]
description = "Say hello"
bash = "echo $GREETING {{.args}} >> log.txt"

[task.default]
deps = ["greet"]

[namespace.docs.task.html]
deps = ["/setup"]
run = "touch html.out"
dir = "docs"
"#;

fn args(config: &str, tasks: &[&str]) -> CliArgs {
    CliArgs {
        tasks: tasks.iter().map(|t| t.to_string()).collect(),
        config: config.to_string(),
        watch: false,
        list: false,
        log_level: None,
        verbose: false,
        args: Vec::new(),
    }
}

#[tokio::test]
async fn taskfile_commands_run_in_its_directory() -> TestResult {
    crate::common::with_timeout(async {
        init_tracing();
        let dir = TreeBuilder::new()
            .file("Taskfile.toml", TASKFILE)
            .dir("docs")
            .build();
        let config = dir.path().join("Taskfile.toml");

        let cfg = load_and_validate(&config)?;
        let project = build_project(&cfg, config_root_dir(&config));
        project.set_args(vec!["world".to_string()]);

        project.run("greet").await?;
        let log = fs::read_to_string(dir.path().join("log.txt"))?;
        assert_eq!(log, "setup\nhello world\n");

        project.run("docs:html").await?;
        assert!(dir.path().join("docs/html.out").exists());
        let log = fs::read_to_string(dir.path().join("log.txt"))?;
        assert_eq!(log, "setup\nhello world\nsetup\n");

        let usage = project.usage();
        assert!(usage.contains("greet      Say hello\n"), "{usage}");
        assert!(usage.contains("docs:html  Runs {/setup, docs:html} tasks\n"), "{usage}");
        Ok(())
    })
    .await
}

#[tokio::test]
async fn running_without_task_names_runs_default() -> TestResult {
    crate::common::with_timeout(async {
        let dir = TreeBuilder::new().file("Taskfile.toml", TASKFILE).build();
        let config = dir.path().join("Taskfile.toml");

        watchtask::run(args(&config.to_string_lossy(), &[])).await?;
        let log = fs::read_to_string(dir.path().join("log.txt"))?;
        assert_eq!(log, "setup\nhello\n");
        Ok(())
    })
    .await
}

#[tokio::test]
async fn undefined_tasks_stop_the_run() -> TestResult {
    crate::common::with_timeout(async {
        let dir = TreeBuilder::new().file("Taskfile.toml", TASKFILE).build();
        let config = dir.path().join("Taskfile.toml");

        let err = watchtask::run(args(&config.to_string_lossy(), &["setup", "ghost"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WatchtaskError>(),
            Some(WatchtaskError::TaskNotFound(name)) if name == "ghost"
        ));
        assert!(!dir.path().join("log.txt").exists());
        Ok(())
    })
    .await
}

#[test]
fn invalid_taskfiles_are_rejected_on_load() -> TestResult {
    let dir = TreeBuilder::new()
        .file("cycle.toml", "[task.a]\ndeps = [\"b\"]\n[task.b]\ndeps = [\"a\"]\n")
        .file("two.toml", "[task.a]\nrun = \"true\"\nbash = \"true\"\n")
        .file("ghost.toml", "[task.a]\ndeps = [\"ghost\"]\n")
        .file("empty.toml", "")
        .build();

    assert!(matches!(
        load_and_validate(dir.path().join("cycle.toml")),
        Err(WatchtaskError::DependencyCycle(_))
    ));
    assert!(matches!(
        load_and_validate(dir.path().join("two.toml")),
        Err(WatchtaskError::Config(_))
    ));
    assert!(matches!(
        load_and_validate(dir.path().join("ghost.toml")),
        Err(WatchtaskError::TaskNotFound(_))
    ));
    assert!(load_and_validate(dir.path().join("empty.toml")).is_err());
    assert!(matches!(
        load_and_validate(dir.path().join("missing.toml")),
        Err(WatchtaskError::Io(_))
    ));
    Ok(())
}
