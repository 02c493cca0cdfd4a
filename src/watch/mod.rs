// src/watch/mod.rs

//! File watching: OS notifications turned into filtered, de-duplicated,
//! time-stamped [`FileEvent`]s.

pub mod dedup;
pub mod event;
pub mod ignore;
pub mod path_utils;
pub mod watcher;

pub use dedup::{DedupCache, IGNORE_THRESHOLD};
pub use event::{FileEvent, FileEventKind};
pub use ignore::{IgnoreRules, DEFAULT_EXCLUSIONS};
pub use path_utils::relative_str;
pub use watcher::{FileWatcher, Notification, DEFAULT_BUFFER};
