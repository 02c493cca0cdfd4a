// src/glob/mod.rs

//! Extended glob matching.
//!
//! Patterns always use forward slashes, regardless of the host platform:
//!
//! ```text
//! /**/   - zero or more directories
//! {a,b}  - a or b, no spaces
//! *      - any run of non-separator characters
//! ?      - a single non-separator character
//! **/    - any leading directories, start of pattern only
//! /**    - everything below this directory, end of pattern only
//! !      - removes paths from the result set, start of pattern only
//! ```
//!
//! - [`pattern`] compiles a single pattern into an anchored regex plus the
//!   directory the pattern is rooted in.
//! - [`expand`] walks the file system for a list of patterns and computes the
//!   directories that need watching.

pub mod expand;
pub mod pattern;

pub use expand::{glob, glob_in, watch_roots, FileAsset, GlobMatches};
pub use pattern::{compile, effective_match, globexp, has_meta, pattern_root, CompiledGlob};
