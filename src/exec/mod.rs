// src/exec/mod.rs

//! Process execution for task handlers.
//!
//! - [`command`] parses command strings and holds per-call [`RunOptions`].
//! - [`supervisor`] runs commands synchronously (`run`, `bash`) or starts
//!   long-running ones (`start`) with kill-and-replace semantics.
//! - [`registry`] owns the started processes, one per command identity.
//! - [`inside`] scopes a working-directory change.

pub mod command;
pub mod inside;
pub mod registry;
pub mod supervisor;

pub use command::{resolve_working_dir, split_command, CommandParts, RunOptions};
pub use inside::{inside, inside_async};
pub use registry::ProcessRegistry;
pub use supervisor::{BuildRule, Supervisor, SupervisorConfig};
