// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `watchtask`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "watchtask",
    version,
    about = "Run dependent tasks, and re-run them when watched files change.",
    long_about = None
)]
pub struct CliArgs {
    /// Tasks to run. Runs `default` when omitted.
    #[arg(value_name = "TASK")]
    pub tasks: Vec<String>,

    /// Path to the Taskfile (TOML).
    #[arg(long, short = 'c', value_name = "PATH", default_value = "Taskfile.toml")]
    pub config: String,

    /// Keep running and re-run tasks when their watched files change.
    #[arg(long, short = 'w')]
    pub watch: bool,

    /// List tasks and exit.
    #[arg(long, short = 'l')]
    pub list: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WATCHTASK_LOG` is used, then `--verbose`.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Shorthand for `--log-level debug`.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Arguments passed to task handlers.
    #[arg(last = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_flags_and_trailing_args() {
        let args =
            CliArgs::try_parse_from(["watchtask", "-w", "build", "test", "--", "--release"]).unwrap();
        assert!(args.watch);
        assert_eq!(args.tasks, vec!["build", "test"]);
        assert_eq!(args.args, vec!["--release"]);
        assert_eq!(args.config, "Taskfile.toml");
    }

    #[test]
    fn log_level_is_parsed() {
        let args = CliArgs::try_parse_from(["watchtask", "--log-level", "debug"]).unwrap();
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert!(args.tasks.is_empty());
    }
}
