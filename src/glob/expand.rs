// src/glob/expand.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::glob::pattern::{clean_pattern, compile, has_meta, pattern_root, CompiledGlob};

/// A file or directory matched by a glob.
///
/// `path` is slash-normalised and relative to the base directory the glob
/// was evaluated in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAsset {
    pub path: String,
    pub is_dir: bool,
}

/// Result of expanding a pattern list.
#[derive(Debug, Clone, Default)]
pub struct GlobMatches {
    /// Matched paths, each at most once, sorted.
    pub files: Vec<FileAsset>,
    /// One compiled matcher per pattern, in declaration order.
    pub matchers: Vec<CompiledGlob>,
}

/// Expand `patterns` relative to the current working directory.
pub fn glob<S: AsRef<str>>(patterns: &[S]) -> Result<GlobMatches> {
    let cwd = std::env::current_dir().context("reading current directory")?;
    glob_in(&cwd, patterns)
}

/// Expand `patterns` relative to `base`.
///
/// Wildcard patterns walk the file system from their root; literal patterns
/// reference a single path and never walk. Negated patterns are applied after
/// every positive pattern, so no path matched by a negation survives.
pub fn glob_in<S: AsRef<str>>(base: &Path, patterns: &[S]) -> Result<GlobMatches> {
    let mut found: BTreeMap<String, FileAsset> = BTreeMap::new();
    let mut matchers = Vec::with_capacity(patterns.len());
    let mut walked: HashMap<String, Vec<FileAsset>> = HashMap::new();

    for raw in patterns {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            continue;
        }

        let compiled = compile(raw)?;

        if !compiled.is_negated() {
            if has_meta(compiled.pattern()) {
                let root = compiled.root().to_string();
                if !walked.contains_key(&root) {
                    let assets = walk(base, &root)
                        .with_context(|| format!("walking {root:?} for pattern {raw}"))?;
                    walked.insert(root.clone(), assets);
                }
                for asset in walked.get(&root).into_iter().flatten() {
                    if compiled.is_match(&asset.path) {
                        found.insert(asset.path.clone(), asset.clone());
                    }
                }
            } else {
                let path = clean_pattern(compiled.pattern());
                match fs::metadata(base.join(&path)) {
                    Ok(meta) => {
                        found.insert(
                            path.clone(),
                            FileAsset {
                                path,
                                is_dir: meta.is_dir(),
                            },
                        );
                    }
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {
                        warn!(pattern = %raw, "literal pattern does not exist; skipping");
                    }
                    Err(err) => {
                        return Err(err).with_context(|| format!("stat {path:?}"));
                    }
                }
            }
        }

        matchers.push(compiled);
    }

    for negation in matchers.iter().filter(|m| m.is_negated()) {
        found.retain(|path, _| !negation.is_match(path));
    }

    debug!(count = found.len(), "glob expansion complete");

    Ok(GlobMatches {
        files: found.into_values().collect(),
        matchers,
    })
}

/// Walk everything below `root` (relative to `base`), returning files and
/// directories with paths prefixed by `root`.
fn walk(base: &Path, root: &str) -> Result<Vec<FileAsset>> {
    let (start, prefix) = if root == "." {
        (base.to_path_buf(), String::new())
    } else {
        (base.join(root), root.to_string())
    };

    let mut assets = Vec::new();
    if !start.is_dir() {
        debug!(?start, "glob root is not a directory");
        return Ok(assets);
    }

    let mut stack: Vec<(PathBuf, String)> = vec![(start, prefix)];
    while let Some((dir, rel)) = stack.pop() {
        let entries = fs::read_dir(&dir).with_context(|| format!("reading dir {dir:?}"))?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let rel_path = if rel.is_empty() {
                name
            } else if rel.ends_with('/') {
                format!("{rel}{name}")
            } else {
                format!("{rel}/{name}")
            };

            // Symlinks are not followed.
            let is_dir = entry.file_type()?.is_dir();
            if is_dir {
                stack.push((entry.path(), rel_path.clone()));
            }
            assets.push(FileAsset {
                path: rel_path,
                is_dir,
            });
        }
    }

    Ok(assets)
}

/// Directories to watch for a pattern list.
///
/// Negated and empty patterns are ignored. A root of `"."` means the whole
/// working directory is watched and nothing else is needed; roots nested in
/// another root are dropped.
pub fn watch_roots<S: AsRef<str>>(patterns: &[S]) -> Vec<String> {
    let mut roots: BTreeSet<String> = BTreeSet::new();
    for pattern in patterns {
        let pattern = pattern.as_ref().trim();
        if pattern.is_empty() || pattern.starts_with('!') {
            continue;
        }
        let root = pattern_root(pattern);
        if root == "." {
            return vec![".".to_string()];
        }
        roots.insert(root);
    }

    let all: Vec<String> = roots.iter().cloned().collect();
    roots
        .into_iter()
        .filter(|root| !all.iter().any(|other| other != root && is_within(root, other)))
        .collect()
}

fn is_within(path: &str, root: &str) -> bool {
    match path.strip_prefix(root) {
        Some(rest) => rest.starts_with('/') || root.ends_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(base: &Path, rel: &str) {
        let path = base.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    fn paths(m: &GlobMatches) -> Vec<&str> {
        m.files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn expands_nested_patterns_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "test/foo.txt");
        touch(dir.path(), "test/sub/bar.txt");
        touch(dir.path(), "test/sub/sub1.txt");
        touch(dir.path(), "test/index.html");

        let m = glob_in(dir.path(), &["test/**/*.txt", "!**/*sub1.txt"]).unwrap();
        assert_eq!(paths(&m), vec!["test/foo.txt", "test/sub/bar.txt"]);
        assert_eq!(m.matchers.len(), 2);
        assert!(m.matchers[1].is_negated());
    }

    #[test]
    fn negation_removes_paths_regardless_of_position() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a/x.txt");
        touch(dir.path(), "a/y.txt");

        let m = glob_in(dir.path(), &["!a/x.txt", "a/*.txt"]).unwrap();
        assert_eq!(paths(&m), vec!["a/y.txt"]);
    }

    #[test]
    fn literal_patterns_do_not_walk() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "README.md");
        touch(dir.path(), "docs/README.md");

        let m = glob_in(dir.path(), &["README.md", "missing.txt"]).unwrap();
        assert_eq!(paths(&m), vec!["README.md"]);
    }

    #[test]
    fn directories_are_included() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/a/b.rs");

        let m = glob_in(dir.path(), &["src/**"]).unwrap();
        assert_eq!(paths(&m), vec!["src/a", "src/a/b.rs"]);
        assert!(m.files[0].is_dir);
    }

    #[test]
    fn watch_roots_are_distinct_and_collapsed() {
        let roots = watch_roots(&["example/views/**/*.go.html", "example/views/admin/*.css", "lib/*.js"]);
        assert_eq!(roots, vec!["example/views", "lib"]);

        let roots = watch_roots(&["src/**/*.rs", "**/*.toml"]);
        assert_eq!(roots, vec!["."]);

        let roots = watch_roots(&["!src/*.rs", ""]);
        assert!(roots.is_empty());
    }
}
