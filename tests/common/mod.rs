#![allow(dead_code)]

use std::error::Error;

pub use watchtask_test_utils::{
    deleted, init_tracing, modified, with_timeout, write_file, Trace, TreeBuilder,
};

pub type TestResult = Result<(), Box<dyn Error>>;
