//! Command-line interface
//!
//! Flags fall back to environment variables, so `SOURCE_FILES=src graphckpt-dev lint`
//! works like the old make variables did. `lint-diff`, `lint-package`,
//! `lint-tests` and `format-diff` pick their own target sets and ignore
//! `SOURCE_FILES`.

use crate::config::{TomlConfig, DEFAULT_CONFIG_FILE};
use crate::files::{split_entries, DEFAULT_SOURCE_FILES};
use crate::runner::CommandRunner;
use crate::tasks::{Target, Tasks};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "graphckpt-dev")]
#[command(about = "Test, lint and format tasks for the graphckpt workspace")]
#[command(version)]
pub struct Args {
    /// Task configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, env = "GRAPHCKPT_DEV_CONFIG", global = true)]
    pub config: PathBuf,

    /// Files or directories for `lint` and `format`
    #[arg(long, default_value = DEFAULT_SOURCE_FILES, env = "SOURCE_FILES", global = true)]
    pub source_files: String,

    /// Type checker target directory (`lint-tests` uses the test cache from the config)
    #[arg(long, env = "CHECK_CACHE", global = true)]
    pub check_cache: Option<String>,

    /// Base branch for `lint-diff` and `format-diff`
    #[arg(long, env = "BASE_BRANCH", global = true)]
    pub base_branch: Option<String>,

    #[command(subcommand)]
    pub task: Task,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Start the test database, run the tests, tear the database down
    Test {
        /// Extra arguments for the test command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Same as `test` with the test watcher
    TestWatch,
    /// Lint and check `SOURCE_FILES`
    Lint,
    /// Lint and check Rust files changed relative to the base branch
    LintDiff,
    /// Lint and check the package sources
    LintPackage,
    /// Lint and check the test sources
    LintTests,
    /// Format `SOURCE_FILES`
    Format,
    /// Format Rust files changed relative to the base branch
    FormatDiff,
}

impl Args {
    /// Config file contents with flag and environment overrides applied
    pub fn load_config(&self) -> Result<TomlConfig> {
        let mut config = TomlConfig::load(&self.config)
            .with_context(|| format!("Failed to load {}", self.config.display()))?;
        if let Some(base) = &self.base_branch {
            config.base_branch = base.clone();
        }
        if let Some(cache) = &self.check_cache {
            config.check_cache = cache.clone();
        }
        Ok(config)
    }
}

/// Run the selected task and return the process exit code
pub fn run<R: CommandRunner>(args: Args, config: TomlConfig, runner: R) -> Result<i32> {
    let diff = Target::Diff {
        base: config.base_branch.clone(),
    };
    let entries = Target::Entries(split_entries(&args.source_files));
    let mut tasks = Tasks::new(config, runner);

    let lint_target = match args.task {
        Task::Test { args } => return tasks.test(&args),
        Task::TestWatch => return tasks.test_watch(),
        Task::Format => {
            let files = tasks.resolve(&entries)?;
            return tasks.format(&files);
        }
        Task::FormatDiff => {
            let files = tasks.resolve(&diff)?;
            return tasks.format(&files);
        }
        Task::Lint => entries,
        Task::LintDiff => diff,
        Task::LintPackage => Target::Package,
        Task::LintTests => Target::Tests,
    };

    let files = tasks.resolve(&lint_target)?;
    info!("{} file(s) selected", files.len());
    let check_cache = tasks.check_cache_for(&lint_target);
    tasks.lint(&files, &check_cache)
}
