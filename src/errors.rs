// src/errors.rs

//! Crate-wide error type and aliases.
//!
//! The process, glob and watcher layers use `anyhow` internally for
//! context-rich errors; the project API surfaces [`WatchtaskError`] so callers
//! can tell definition errors (fatal) from handler failures.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchtaskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not find project having namespace \"{0}\"")]
    NamespaceNotFound(String),

    #[error("\"{0}\" task is not defined")]
    TaskNotFound(String),

    #[error("invalid task name \"{0}\"")]
    InvalidTaskName(String),

    #[error("Cycle detected in task graph involving \"{0}\"")]
    DependencyCycle(String),

    /// A task handler failed. `task` is the qualified log name, e.g.
    /// `build>clean` when `clean` failed as a dependency of `build`.
    #[error("\"{task}\": {source}")]
    Task {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("working dir does not exist: {}", .0.display())]
    WorkingDir(PathBuf),

    #[error("empty command")]
    EmptyCommand,

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WatchtaskError {
    /// Definition errors have no valid continuation; the binary exits on them.
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            WatchtaskError::NamespaceNotFound(_)
                | WatchtaskError::TaskNotFound(_)
                | WatchtaskError::InvalidTaskName(_)
                | WatchtaskError::DependencyCycle(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WatchtaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_error_is_prefixed_with_quoted_name() {
        let err = WatchtaskError::Task {
            task: "foo>err".into(),
            source: anyhow::anyhow!("error caught"),
        };
        assert_eq!(err.to_string(), "\"foo>err\": error caught");
        assert!(!err.is_definition_error());
    }

    #[test]
    fn undefined_names_are_definition_errors() {
        assert!(WatchtaskError::TaskNotFound("x".into()).is_definition_error());
        assert!(WatchtaskError::NamespaceNotFound("ns".into()).is_definition_error());
        assert!(WatchtaskError::DependencyCycle("a".into()).is_definition_error());
    }
}
