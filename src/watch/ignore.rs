// src/watch/ignore.rs

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::glob::has_meta;

/// Directories excluded from watching unless configured otherwise.
pub const DEFAULT_EXCLUSIONS: &[&str] = &["node_modules"];

/// Decides which paths the watcher drops.
///
/// Paths are checked relative to the watched root, slash-normalised:
/// - any dot-prefixed segment (`.git`, `.cache/x`)
/// - numeric-only file names (editor swap checks such as vim's `4913`)
/// - configured exclusions; a bare name like `target` excludes that
///   directory at any depth, anything else is used as a glob
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    exclusions: Vec<String>,
    set: GlobSet,
}

impl IgnoreRules {
    pub fn new<S: AsRef<str>>(exclusions: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut names = Vec::with_capacity(exclusions.len());

        for exclusion in exclusions {
            let exclusion = exclusion.as_ref().trim().trim_end_matches('/');
            if exclusion.is_empty() {
                continue;
            }
            for pat in expand_exclusion(exclusion) {
                let glob = Glob::new(&pat)
                    .with_context(|| format!("invalid watch exclusion: {exclusion}"))?;
                builder.add(glob);
            }
            names.push(exclusion.to_string());
        }

        Ok(Self {
            exclusions: names,
            set: builder.build()?,
        })
    }

    pub fn exclusions(&self) -> &[String] {
        &self.exclusions
    }

    /// Whether a file at `rel_path` is dropped.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        if self.is_ignored_dir(rel_path) {
            return true;
        }
        rel_path
            .rsplit('/')
            .find(|s| !s.is_empty())
            .is_some_and(is_swap_file)
    }

    /// Whether a directory at `rel_path` is skipped. Numeric names are
    /// legitimate directories (`posts/2024`) and only count for files.
    pub fn is_ignored_dir(&self, rel_path: &str) -> bool {
        if rel_path.is_empty() || rel_path == "." {
            return false;
        }

        let hidden = rel_path
            .split('/')
            .any(|segment| segment.starts_with('.') && segment != "." && segment != "..");

        hidden || self.set.is_match(rel_path)
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        let mut builder = GlobSetBuilder::new();
        for exclusion in DEFAULT_EXCLUSIONS {
            for pat in expand_exclusion(exclusion) {
                if let Ok(glob) = Glob::new(&pat) {
                    builder.add(glob);
                }
            }
        }
        Self {
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            set: builder.build().unwrap_or_else(|_| GlobSet::empty()),
        }
    }
}

fn expand_exclusion(exclusion: &str) -> Vec<String> {
    if exclusion.contains('/') || has_meta(exclusion) {
        vec![exclusion.to_string(), format!("{exclusion}/**")]
    } else {
        vec![format!("**/{exclusion}"), format!("**/{exclusion}/**")]
    }
}

fn is_swap_file(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_segments_are_ignored() {
        let rules = IgnoreRules::default();
        assert!(rules.is_ignored(".git"));
        assert!(rules.is_ignored(".git/HEAD"));
        assert!(rules.is_ignored("src/.cache/x.rs"));
        assert!(!rules.is_ignored("src/main.rs"));
        assert!(!rules.is_ignored(""));
    }

    #[test]
    fn default_exclusions_match_at_any_depth() {
        let rules = IgnoreRules::default();
        assert!(rules.is_ignored("node_modules"));
        assert!(rules.is_ignored("web/node_modules/react/index.js"));
        assert!(!rules.is_ignored("web/src/index.js"));
    }

    #[test]
    fn numeric_file_names_are_ignored() {
        let rules = IgnoreRules::default();
        assert!(rules.is_ignored("src/4913"));
        assert!(!rules.is_ignored("2024/notes.md"));
    }

    #[test]
    fn numeric_directories_are_kept() {
        let rules = IgnoreRules::default();
        assert!(!rules.is_ignored_dir("posts/2024"));
        assert!(!rules.is_ignored_dir("2024"));
        assert!(!rules.is_ignored("posts/2024/hello.md"));
        assert!(rules.is_ignored_dir(".git/objects"));
        assert!(rules.is_ignored_dir("web/node_modules"));
    }

    #[test]
    fn configured_globs_are_honoured() {
        let rules = IgnoreRules::new(&["target", "build/*.o"]).unwrap();
        assert!(rules.is_ignored("target/debug/app"));
        assert!(rules.is_ignored("build/main.o"));
        assert!(!rules.is_ignored("build/main.c"));
        assert!(!rules.is_ignored("node_modules/x.js"));
        assert_eq!(rules.exclusions(), ["target", "build/*.o"]);
    }
}
