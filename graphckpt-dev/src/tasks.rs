//! Task sequencing
//!
//! Test tasks wrap the test command in the database container lifecycle and
//! return the test command's exit code whatever teardown does. Lint and format
//! tasks stop at the first failing step and return its exit code.

use crate::config::{TomlConfig, Vars};
use crate::files::{expand, parse_diff};
use crate::runner::CommandRunner;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Where a lint or format task takes its files from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Explicit entries (`SOURCE_FILES`)
    Entries(Vec<String>),
    /// Rust files changed relative to a base branch
    Diff { base: String },
    /// The configured package source directories
    Package,
    /// The configured test directories
    Tests,
}

pub struct Tasks<R> {
    config: TomlConfig,
    runner: R,
}

impl<R: CommandRunner> Tasks<R> {
    pub fn new(config: TomlConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &TomlConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn vars(&self, check_cache: &str, base: &str) -> Vars {
        Vars {
            compose_file: self.config.compose_file.clone(),
            check_cache: check_cache.to_string(),
            base: base.to_string(),
        }
    }

    fn default_vars(&self) -> Vars {
        self.vars(&self.config.check_cache, &self.config.base_branch)
    }

    /// Run the test suite once against a fresh database
    pub fn test(&mut self, extra_args: &[String]) -> Result<i32> {
        let mut command = self.config.commands.test.clone();
        command.extend(extra_args.iter().cloned());
        self.with_database(command)
    }

    /// Run the test watcher against a fresh database
    pub fn test_watch(&mut self) -> Result<i32> {
        let command = self.config.commands.test_watch.clone();
        self.with_database(command)
    }

    fn with_database(&mut self, test_command: Vec<String>) -> Result<i32> {
        let vars = self.default_vars();

        let started = self.runner.run(&vars.expand(&self.config.commands.start))?;
        if started != 0 {
            error!("Test database failed to start (exit code {})", started);
            if let Err(e) = self.runner.run(&vars.expand(&self.config.commands.logs)) {
                warn!("Could not fetch container logs: {:#}", e);
            }
            // A failed `up --wait` can leave the container and its volume behind
            self.teardown(&vars);
            return Ok(1);
        }
        info!("Test database is up");

        // Teardown runs even when the test command could not be started
        let result = self.runner.run(&vars.expand(&test_command));
        self.teardown(&vars);
        result
    }

    /// Remove the test database; its exit code never replaces the task's
    fn teardown(&mut self, vars: &Vars) {
        match self.runner.run(&vars.expand(&self.config.commands.stop)) {
            Ok(0) => info!("Test database removed"),
            Ok(code) => warn!("Test database teardown exited with {}", code),
            Err(e) => warn!("Test database teardown failed: {:#}", e),
        }
    }

    /// Type checker target directory for a lint target
    pub fn check_cache_for(&self, target: &Target) -> String {
        match target {
            Target::Tests => self.config.test_check_cache.clone(),
            _ => self.config.check_cache.clone(),
        }
    }

    /// Rust files a target refers to
    ///
    /// A failing `git diff` is reported and yields an empty set.
    pub fn resolve(&mut self, target: &Target) -> Result<Vec<PathBuf>> {
        let entries = match target {
            Target::Entries(entries) => entries.clone(),
            Target::Package => self.config.package_dirs.clone(),
            Target::Tests => self.config.test_dirs.clone(),
            Target::Diff { base } => {
                let vars = self.vars(&self.config.check_cache, base);
                let (code, stdout) = self.runner.output(&vars.expand(&self.config.commands.diff))?;
                if code != 0 {
                    warn!("git diff against {} exited with {}; no files selected", base, code);
                    Vec::new()
                } else {
                    parse_diff(&stdout)
                }
            }
        };
        Ok(expand(&entries))
    }

    fn run_on_files(&mut self, command: &[String], vars: &Vars, files: &[PathBuf]) -> Result<i32> {
        let mut argv = vars.expand(command);
        argv.extend(files.iter().map(|f| f.display().to_string()));
        self.runner.run(&argv)
    }

    /// Whole-repository lint, then format, import and type checks on `files`
    ///
    /// The three file-based checks are skipped for an empty set.
    pub fn lint(&mut self, files: &[PathBuf], check_cache: &str) -> Result<i32> {
        let vars = self.vars(check_cache, &self.config.base_branch);
        let commands = self.config.commands.clone();

        let code = self.runner.run(&vars.expand(&commands.lint))?;
        if code != 0 {
            return Ok(code);
        }

        if files.is_empty() {
            info!("No files selected; skipping format, import and type checks");
            return Ok(0);
        }

        for check in [&commands.format_check, &commands.import_check] {
            let code = self.run_on_files(check, &vars, files)?;
            if code != 0 {
                return Ok(code);
            }
        }

        self.runner.create_dir(Path::new(check_cache))?;
        self.runner.run(&vars.expand(&commands.type_check))
    }

    /// Apply formatting and import ordering to `files`
    pub fn format(&mut self, files: &[PathBuf]) -> Result<i32> {
        if files.is_empty() {
            info!("No files selected; nothing to format");
            return Ok(0);
        }

        let vars = self.default_vars();
        let commands = self.config.commands.clone();
        for command in [&commands.format, &commands.import_fix] {
            let code = self.run_on_files(command, &vars, files)?;
            if code != 0 {
                return Ok(code);
            }
        }
        Ok(0)
    }
}
