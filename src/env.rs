// src/env.rs

//! Environment composition for spawned processes.
//!
//! The effective environment of a command is built in three layers:
//! 1. the parent process environment (or nothing, if `inherit = false`)
//! 2. the global `vars` string
//! 3. per-call `KEY=VALUE` pairs
//!
//! Later layers upsert into earlier ones. Values may reference `$VAR` or
//! `${VAR}`; references resolve against the environment built so far, then
//! the parent process, and finally to the empty string.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Deserialize;

/// Placeholder rewritten to the OS path-list separator.
pub const DEFAULT_PATH_LIST_SEPARATOR: &str = "::";

#[cfg(windows)]
const OS_PATH_LIST_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const OS_PATH_LIST_SEPARATOR: &str = ":";

static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(\w+)\}|\$(\w+)").expect("static env var regex is valid")
});

/// Global environment settings, from `[env]` in the Taskfile.
///
/// ```toml
/// [env]
/// inherit = true
/// vars = """
/// GOOS=linux
/// GOPATH=./vendor::$GOPATH
/// """
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Environment {
    /// Whether to start from the parent process environment.
    #[serde(default = "default_inherit")]
    pub inherit: bool,

    /// Whitespace/newline separated `KEY=VALUE` pairs.
    #[serde(default)]
    pub vars: String,

    /// Token rewritten to the OS path-list separator.
    #[serde(default = "default_path_list_separator")]
    pub path_list_separator: String,
}

fn default_inherit() -> bool {
    true
}

fn default_path_list_separator() -> String {
    DEFAULT_PATH_LIST_SEPARATOR.to_string()
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            inherit: default_inherit(),
            vars: String::new(),
            path_list_separator: default_path_list_separator(),
        }
    }
}

impl Environment {
    pub fn new(vars: impl Into<String>, inherit: bool) -> Self {
        Self {
            inherit,
            vars: vars.into(),
            ..Self::default()
        }
    }

    /// Compose the environment for one command.
    pub fn effective(&self, call_env: &[String]) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = if self.inherit {
            std::env::vars_os()
                .map(|(k, v)| {
                    (
                        k.to_string_lossy().into_owned(),
                        v.to_string_lossy().into_owned(),
                    )
                })
                .collect()
        } else {
            Vec::new()
        };

        for kv in parse_env_string(&self.vars) {
            upsert(&mut env, &kv, &self.path_list_separator);
        }
        for kv in call_env {
            upsert(&mut env, kv, &self.path_list_separator);
        }
        env
    }
}

/// Split an environment string into `KEY=VALUE` tokens.
///
/// Tokens follow shell quoting rules; tokens without `=` are dropped.
pub fn parse_env_string(s: &str) -> Vec<String> {
    if s.trim().is_empty() {
        return Vec::new();
    }
    let tokens = shlex::split(s)
        .unwrap_or_else(|| s.split_whitespace().map(str::to_string).collect());
    tokens.into_iter().filter(|kv| kv.contains('=')).collect()
}

/// Update `key` in place if present, else append. Malformed pairs are ignored.
pub fn upsert(env: &mut Vec<(String, String)>, kv: &str, path_list_separator: &str) {
    let Some((key, value)) = kv.split_once('=') else {
        return;
    };
    if key.is_empty() {
        return;
    }

    let value = interpolate(env, value, path_list_separator);
    match env.iter_mut().find(|(k, _)| k == key) {
        Some(entry) => entry.1 = value,
        None => env.push((key.to_string(), value)),
    }
}

/// Expand the path-list placeholder and `$VAR` / `${VAR}` references.
pub fn interpolate(env: &[(String, String)], value: &str, path_list_separator: &str) -> String {
    let value = if !path_list_separator.is_empty() && value.contains(path_list_separator) {
        value.replace(path_list_separator, OS_PATH_LIST_SEPARATOR)
    } else {
        value.to_string()
    };

    ENV_VAR_RE
        .replace_all(&value, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(env, name)
                .map(str::to_string)
                .or_else(|| std::env::var(name).ok())
                .unwrap_or_default()
        })
        .into_owned()
}

/// Value of `key` in a composed environment.
pub fn lookup<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
    env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}
