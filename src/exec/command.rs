// src/exec/command.rs

//! Command-string parsing and per-call run options.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use regex::{Captures, Regex};

use crate::errors::WatchtaskError;

static TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\.?(\w+)\s*\}\}").expect("static template regex is valid")
});

/// A command string split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParts {
    pub executable: String,
    pub argv: Vec<String>,
    /// Leading `KEY=VALUE` tokens, applied as per-call environment.
    pub env: Vec<String>,
}

/// Split a command line using shell quoting rules.
///
/// `GOOS=linux go build -o "my app"` yields env `["GOOS=linux"]`, executable
/// `go` and argv `["build", "-o", "my app"]`.
pub fn split_command(command: &str) -> Result<CommandParts> {
    let tokens =
        shlex::split(command).ok_or_else(|| anyhow!("unbalanced quotes in command: {command}"))?;

    let mut tokens = tokens.into_iter().peekable();
    let mut env = Vec::new();
    while let Some(token) = tokens.next_if(|t| is_env_assignment(t)) {
        env.push(token);
    }

    let executable = tokens.next().ok_or(WatchtaskError::EmptyCommand)?;
    Ok(CommandParts {
        executable,
        argv: tokens.collect(),
        env,
    })
}

fn is_env_assignment(token: &str) -> bool {
    match token.split_once('=') {
        Some((key, _)) => {
            !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

/// Options for a single `run`/`bash`/`start` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Working directory; relative paths resolve against the current directory.
    pub dir: Option<PathBuf>,
    /// Extra `KEY=VALUE` pairs for this call only.
    pub env: Vec<String>,
    /// Values for `{{.name}}` placeholders in the command text.
    pub vars: BTreeMap<String, String>,
}

impl RunOptions {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn env(mut self, kv: impl Into<String>) -> Self {
        self.env.push(kv.into());
        self
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Fill placeholders in `command`. Unknown names are left as written.
    pub fn render(&self, command: &str) -> String {
        if self.vars.is_empty() {
            return command.to_string();
        }
        TEMPLATE_RE
            .replace_all(command, |caps: &Captures| match self.vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

/// Resolve the working directory for a call, failing before any process is
/// spawned if it does not exist.
pub fn resolve_working_dir(dir: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let Some(dir) = dir else {
        return Ok(cwd);
    };

    let resolved = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        cwd.join(dir)
    };
    if !resolved.is_dir() {
        return Err(WatchtaskError::WorkingDir(resolved).into());
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_assignments_become_env() {
        let parts = split_command(r#"GOOS=linux CGO_ENABLED=0 go build -o "my app""#).unwrap();
        assert_eq!(parts.env, vec!["GOOS=linux", "CGO_ENABLED=0"]);
        assert_eq!(parts.executable, "go");
        assert_eq!(parts.argv, vec!["build", "-o", "my app"]);
    }

    #[test]
    fn assignments_after_the_executable_are_arguments() {
        let parts = split_command("env FOO=bar").unwrap();
        assert!(parts.env.is_empty());
        assert_eq!(parts.executable, "env");
        assert_eq!(parts.argv, vec!["FOO=bar"]);
    }

    #[test]
    fn empty_commands_are_rejected() {
        let err = split_command("  FOO=bar ").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WatchtaskError>(),
            Some(WatchtaskError::EmptyCommand)
        ));
        assert!(split_command("echo 'oops").is_err());
    }

    #[test]
    fn templates_are_filled_from_vars() {
        let opts = RunOptions::default().var("name", "world").var("n", "3");
        assert_eq!(opts.render("echo {{.name}} {{ n }}"), "echo world 3");
        assert_eq!(opts.render("echo {{.missing}}"), "echo {{.missing}}");
    }

    #[test]
    fn missing_working_dir_is_a_descriptive_error() {
        let err = resolve_working_dir(Some(Path::new("definitely/not/a/dir"))).unwrap_err();
        assert!(err.to_string().starts_with("working dir does not exist"));
        assert!(resolve_working_dir(None).is_ok());
    }
}
