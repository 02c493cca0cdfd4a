// src/glob/pattern.rs

use std::fmt;

use anyhow::{Context, Result};
use regex::Regex;

/// Any character but the path separator.
const NOT_SLASH: &str = "[^/]";
/// Zero or more non-separator characters.
const ANY_RUNE: &str = "[^/]*";
/// Used by `**/` and `/**/`.
const ZERO_OR_MORE_DIRECTORIES: &str = r"(?:[^/]+/)*";

/// A glob pattern compiled into an anchored regular expression.
///
/// `root` is the literal directory prefix of the pattern and bounds the
/// file-system walk when the pattern is expanded.
#[derive(Clone)]
pub struct CompiledGlob {
    pattern: String,
    regex: Regex,
    root: String,
    negate: bool,
}

impl fmt::Debug for CompiledGlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGlob")
            .field("pattern", &self.pattern)
            .field("regex", &self.regex.as_str())
            .field("negate", &self.negate)
            .finish_non_exhaustive()
    }
}

impl CompiledGlob {
    /// The source pattern, without the leading `!`.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Match a slash-normalised path.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Compile `pattern` into a [`CompiledGlob`].
///
/// A leading `!` marks the pattern as a negation and is stripped before
/// compiling. A leading `./` is dropped since matched paths never carry it.
pub fn compile(pattern: &str) -> Result<CompiledGlob> {
    let (negate, body) = match pattern.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };
    let body = clean_pattern(body);

    let source = globexp(&body);
    let regex = Regex::new(&source)
        .with_context(|| format!("invalid glob pattern: {pattern} (regex {source})"))?;

    Ok(CompiledGlob {
        root: pattern_root(&body),
        pattern: body,
        regex,
        negate,
    })
}

/// Build the anchored regular expression source for an extended glob.
pub fn globexp(glob: &str) -> String {
    let mut re = String::with_capacity(glob.len() * 2 + 2);
    re.push('^');

    let mut in_group = false;
    let mut in_class = false;
    let mut i = 0;

    while let Some(c) = glob[i..].chars().next() {
        let rest = &glob[i..];
        let mut width = c.len_utf8();

        if in_class {
            match c {
                ']' => {
                    in_class = false;
                    re.push(']');
                }
                '\\' => re.push_str(r"\\"),
                '[' => re.push_str(r"\["),
                _ => re.push(c),
            }
            i += width;
            continue;
        }

        match c {
            '/' => {
                re.push('/');
                if rest.starts_with("/**/") {
                    re.push_str(ZERO_OR_MORE_DIRECTORIES);
                    width = 4;
                } else if rest == "/**" {
                    re.push_str(".*");
                    width = 3;
                }
            }
            '*' => {
                if i == 0 && rest.starts_with("**/") {
                    re.push_str(ZERO_OR_MORE_DIRECTORIES);
                    width = 3;
                } else {
                    re.push_str(ANY_RUNE);
                }
            }
            '?' => re.push_str(NOT_SLASH),
            '[' => {
                in_class = true;
                re.push('[');
            }
            '{' => {
                if rest.starts_with("{{") {
                    re.push_str(r"\{");
                    width = 2;
                } else {
                    in_group = true;
                    re.push_str("(?:");
                }
            }
            '}' => {
                if in_group {
                    in_group = false;
                    re.push(')');
                } else {
                    re.push_str(r"\}");
                }
            }
            ',' => {
                if in_group {
                    re.push('|');
                } else {
                    re.push(',');
                }
            }
            _ => {
                let mut buf = [0u8; 4];
                re.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }

        i += width;
    }

    re.push('$');
    re
}

/// Whether a pattern (or a single path segment) contains wildcard characters.
pub fn has_meta(path: &str) -> bool {
    path.contains(['*', '?', '[', '{'])
}

/// The literal directory a pattern is rooted in.
///
/// Segments are collected up to the first one containing a wildcard. The
/// last segment is never part of the root, so a pattern without wildcards
/// yields its parent directory. Returns `"."` when there is no literal prefix.
pub fn pattern_root(pattern: &str) -> String {
    let pattern = pattern.strip_prefix('!').unwrap_or(pattern);
    let pattern = clean_pattern(pattern);

    let parts: Vec<&str> = pattern.split('/').collect();
    let mut root: Vec<&str> = Vec::new();
    for part in &parts[..parts.len().saturating_sub(1)] {
        if has_meta(part) {
            break;
        }
        root.push(part);
    }

    let joined = root.join("/");
    if joined.is_empty() {
        if pattern.starts_with('/') && root.len() == 1 {
            "/".to_string()
        } else {
            ".".to_string()
        }
    } else {
        joined
    }
}

/// Evaluate an ordered matcher list against a path.
///
/// Positive matchers add the path; a negated matcher can only remove a path
/// that an earlier matcher accepted.
pub fn effective_match(matchers: &[CompiledGlob], path: &str) -> bool {
    let mut matched = false;
    for m in matchers {
        if m.is_negated() {
            if matched {
                matched = !m.is_match(path);
            }
        } else if m.is_match(path) {
            matched = true;
        }
    }
    matched
}

/// Drop `./` prefixes and trailing slashes.
pub(crate) fn clean_pattern(pattern: &str) -> String {
    let mut p = pattern.trim();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    if p.len() > 1 {
        p = p.trim_end_matches('/');
    }
    p.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        compile(pattern).unwrap().is_match(path)
    }

    #[test]
    fn literal_matches_exactly() {
        assert!(matches("a", "a"));
        assert!(!matches("a", "ab"));
    }

    #[test]
    fn slash_star_star_slash_matches_zero_or_more_directories() {
        assert!(matches("src/**/*.html", "src/test.html"));
        assert!(matches("src/**/*.html", "src/foo/bar/test.html"));
        assert!(matches("src/**/test.html", "src/foo/bar/test.html"));
    }

    #[test]
    fn leading_star_star_matches_zero_or_more_directories() {
        assert!(matches("**/*.html", "test.html"));
        assert!(matches("**/*.html", "src/foo/bar/test.html"));
        assert!(matches("**/*.js", ".config.js"));
    }

    #[test]
    fn star_matches_dot_but_not_separator() {
        assert!(matches("*.js", ".config.js"));
        assert!(!matches("*.js", "foo/.config.js"));
    }

    #[test]
    fn question_mark_is_a_single_non_separator() {
        assert!(matches("a?c", "abc"));
        assert!(!matches("a?c", "a/c"));
        assert!(!matches("a?c", "abbc"));
    }

    #[test]
    fn braces_are_alternation() {
        assert!(matches("**/test.{html,js}", "src/test.html"));
        assert!(matches("**/test.{html,js}", "src/test.js"));
        assert!(!matches("**/test.{html,js}", "src/test.css"));
    }

    #[test]
    fn double_braces_are_literal() {
        assert!(matches("**/{{{{VERSION}}/*.foo", "src/{{VERSION}}/1.foo"));
    }

    #[test]
    fn special_characters_in_directories() {
        assert!(matches(
            "public/**/*.uml",
            "public/{{VERSION}}/123/.4-5/a b/main-diagram.uml"
        ));
        assert!(matches("example/views/**/*.go.html", "example/views/admin/layout.go.html"));
        assert!(matches("example/views/**/*.go.html", "example/views/front/indexl.go.html"));
        assert!(matches("src/**/*.ts", "src/@types/index.ts"));
        assert!(matches("**/*.cpp", "c++/main.cpp"));
        assert!(matches("**/*.md", "notes/(draft)/a+b.md"));
        assert!(!matches("src/**/*.ts", "lib/@types/index.ts"));
    }

    #[test]
    fn trailing_star_star_matches_everything_below() {
        assert!(matches("dist/**", "dist/a/b/c.txt"));
        assert!(!matches("dist/**", "other/a.txt"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        assert!(matches("a+b(1).$x", "a+b(1).$x"));
        assert!(!matches("a.b", "axb"));
        assert!(matches("x=y|z!", "x=y|z!"));
    }

    #[test]
    fn negation_flag_is_stripped() {
        let g = compile("!**/*sub1.txt").unwrap();
        assert!(g.is_negated());
        assert_eq!(g.pattern(), "**/*sub1.txt");
        assert!(g.is_match("test/sub/sub1.txt"));
    }

    #[test]
    fn roots_stop_at_first_wildcard_segment() {
        assert_eq!(pattern_root("src/**/*.html"), "src");
        assert_eq!(pattern_root("example/views/**/*.go.html"), "example/views");
        assert_eq!(pattern_root("*.js"), ".");
        assert_eq!(pattern_root("**/*.js"), ".");
        assert_eq!(pattern_root("src/lib/main.rs"), "src/lib");
        assert_eq!(pattern_root("./src/*.rs"), "src");
        assert_eq!(pattern_root("!test/**/*.txt"), "test");
    }

    #[test]
    fn effective_match_applies_negations_in_order() {
        let matchers = vec![
            compile("test/**/*.txt").unwrap(),
            compile("!**/*sub1.txt").unwrap(),
        ];
        assert!(effective_match(&matchers, "test/foo.txt"));
        assert!(!effective_match(&matchers, "test/sub/sub1.txt"));
        assert!(!effective_match(&matchers, "src/foo.txt"));
    }
}
