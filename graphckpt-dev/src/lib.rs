//! # graphckpt-dev
//!
//! Development task runner for the graphckpt workspace. Provides the test
//! lifecycle (start the MySQL container, run tests, tear down, keep the test
//! exit code) and lint/format tasks over a configurable set of source files.

pub mod cli;
pub mod config;
pub mod files;
pub mod runner;
pub mod tasks;

pub use config::{Commands, TomlConfig};
pub use runner::{CommandRunner, SystemRunner};
pub use tasks::{Target, Tasks};
