// src/project/name.rs

//! Task reference parsing.
//!
//! - `build` names a task in the current namespace
//! - `docs:html` descends into the child namespace `docs`; each further `:`
//!   descends one more level (`a:b:task`)
//! - a leading `/` starts from the root namespace (`/clean`, `/docs:html`)
//! - a trailing `?` marks a run-once task and is not part of the name

use std::fmt;

use crate::errors::{Result, WatchtaskError};

pub const NAMESPACE_SEPARATOR: char = ':';
pub const ROOT_MARKER: char = '/';
pub const RUN_ONCE_MARKER: char = '?';

/// A parsed task reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef {
    pub absolute: bool,
    pub namespaces: Vec<String>,
    pub name: String,
}

impl TaskRef {
    pub fn parse(reference: &str) -> Result<Self> {
        let trimmed = reference.trim();
        let (absolute, rest) = match trimmed.strip_prefix(ROOT_MARKER) {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (rest, _) = strip_run_once(rest);

        let mut segments: Vec<String> = rest.split(NAMESPACE_SEPARATOR).map(str::to_string).collect();
        let name = segments.pop().unwrap_or_default();

        if name.is_empty() || segments.iter().any(|s| s.is_empty()) || name.contains(ROOT_MARKER) {
            return Err(WatchtaskError::InvalidTaskName(reference.to_string()));
        }

        Ok(Self {
            absolute,
            namespaces: segments,
            name,
        })
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "{ROOT_MARKER}")?;
        }
        for ns in &self.namespaces {
            write!(f, "{ns}{NAMESPACE_SEPARATOR}")?;
        }
        write!(f, "{}", self.name)
    }
}

/// Split off the run-once marker.
pub fn strip_run_once(name: &str) -> (&str, bool) {
    match name.strip_suffix(RUN_ONCE_MARKER) {
        Some(bare) => (bare, true),
        None => (name, false),
    }
}

/// `a:b:name` for a task in namespace path `[a, b]`.
pub fn qualify(scope: &[String], name: &str) -> String {
    let mut qualified = String::new();
    for ns in scope {
        qualified.push_str(ns);
        qualified.push(NAMESPACE_SEPARATOR);
    }
    qualified.push_str(name);
    qualified
}

/// Whether `name` may be registered as a task or namespace name.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(NAMESPACE_SEPARATOR)
        && !name.contains(ROOT_MARKER)
        && !name.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_names_are_relative() {
        let r = TaskRef::parse("build").unwrap();
        assert!(!r.absolute);
        assert!(r.namespaces.is_empty());
        assert_eq!(r.name, "build");
    }

    #[test]
    fn each_separator_descends_one_level() {
        let r = TaskRef::parse("sub:sub:A").unwrap();
        assert_eq!(r.namespaces, vec!["sub", "sub"]);
        assert_eq!(r.name, "A");
        assert_eq!(r.to_string(), "sub:sub:A");
    }

    #[test]
    fn leading_slash_anchors_at_root() {
        let r = TaskRef::parse("/docs:html").unwrap();
        assert!(r.absolute);
        assert_eq!(r.namespaces, vec!["docs"]);
        assert_eq!(r.to_string(), "/docs:html");
    }

    #[test]
    fn run_once_marker_is_not_part_of_the_name() {
        assert_eq!(TaskRef::parse("once?").unwrap().name, "once");
        assert_eq!(strip_run_once("once?"), ("once", true));
        assert_eq!(strip_run_once("once"), ("once", false));
    }

    #[test]
    fn malformed_references_are_rejected() {
        for bad in ["", ":x", "a::b", "ns:", "/", "a:/b"] {
            assert!(
                matches!(TaskRef::parse(bad), Err(WatchtaskError::InvalidTaskName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn qualified_names_join_scope() {
        assert_eq!(qualify(&[], "a"), "a");
        assert_eq!(qualify(&["x".into(), "y".into()], "a"), "x:y:a");
    }
}
