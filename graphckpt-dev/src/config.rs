//! Task configuration loaded from `dev-tasks.toml`
//!
//! Every tool invocation is an argument vector in the config so the task
//! sequencing does not depend on which concrete tools are installed. Argument
//! vectors may contain `{compose_file}`, `{check_cache}` and `{base}`
//! placeholders, substituted when the command runs.
//!
//! All fields are optional; a missing file means all defaults.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "dev-tasks.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Compose file describing the test database
    #[serde(default = "default_compose_file")]
    pub compose_file: String,

    /// Branch `lint-diff` and `format-diff` compare against
    #[serde(default = "default_base_branch")]
    pub base_branch: String,

    /// Type checker target directory for `lint`, `lint-diff`, `lint-package`
    #[serde(default = "default_check_cache")]
    pub check_cache: String,

    /// Type checker target directory for `lint-tests`
    #[serde(default = "default_test_check_cache")]
    pub test_check_cache: String,

    /// Target set of `lint-package`
    #[serde(default = "default_package_dirs")]
    pub package_dirs: Vec<String>,

    /// Target set of `lint-tests`
    #[serde(default = "default_test_dirs")]
    pub test_dirs: Vec<String>,

    #[serde(default)]
    pub commands: Commands,
}

/// Argument vectors for every external tool
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Commands {
    pub start: Vec<String>,
    pub logs: Vec<String>,
    pub stop: Vec<String>,
    pub test: Vec<String>,
    pub test_watch: Vec<String>,
    /// Whole-repository lint, never given the target set
    pub lint: Vec<String>,
    pub format_check: Vec<String>,
    pub import_check: Vec<String>,
    pub type_check: Vec<String>,
    pub format: Vec<String>,
    pub import_fix: Vec<String>,
    /// Lists changed files, one per line
    pub diff: Vec<String>,
}

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

fn compose(args: &[&str]) -> Vec<String> {
    let mut full = argv(&["docker", "compose", "-f", "{compose_file}"]);
    full.extend(argv(args));
    full
}

impl Default for Commands {
    fn default() -> Self {
        Self {
            start: compose(&["up", "-V", "--force-recreate", "--wait"]),
            logs: compose(&["logs"]),
            stop: compose(&["down", "-v"]),
            test: argv(&["cargo", "test"]),
            test_watch: argv(&["cargo", "watch", "-x", "test"]),
            lint: argv(&["cargo", "clippy", "--workspace", "--all-targets"]),
            format_check: argv(&["rustfmt", "--edition", "2021", "--check"]),
            import_check: argv(&[
                "rustfmt",
                "--edition",
                "2021",
                "--check",
                "--config",
                "reorder_imports=true",
            ]),
            type_check: argv(&["cargo", "check", "--all-targets", "--target-dir", "{check_cache}"]),
            format: argv(&["rustfmt", "--edition", "2021"]),
            import_fix: argv(&["rustfmt", "--edition", "2021", "--config", "reorder_imports=true"]),
            diff: argv(&["git", "diff", "--name-only", "--relative", "--diff-filter=d", "{base}", "."]),
        }
    }
}

fn default_compose_file() -> String {
    "tests/compose-mysql.yml".to_string()
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_check_cache() -> String {
    "target/check".to_string()
}

fn default_test_check_cache() -> String {
    "target/check-tests".to_string()
}

fn default_package_dirs() -> Vec<String> {
    argv(&["graphckpt-common/src", "graphckpt-mysql/src", "graphckpt-dev/src"])
}

fn default_test_dirs() -> Vec<String> {
    argv(&["graphckpt-common/tests", "graphckpt-mysql/tests", "graphckpt-dev/tests"])
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            compose_file: default_compose_file(),
            base_branch: default_base_branch(),
            check_cache: default_check_cache(),
            test_check_cache: default_test_check_cache(),
            package_dirs: default_package_dirs(),
            test_dirs: default_test_dirs(),
            commands: Commands::default(),
        }
    }
}

impl TomlConfig {
    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        info!("Loaded task config from {}", path.display());
        Ok(config)
    }
}

/// Placeholder values substituted into argument vectors
#[derive(Debug, Clone, Default)]
pub struct Vars {
    pub compose_file: String,
    pub check_cache: String,
    pub base: String,
}

impl Vars {
    pub fn expand(&self, args: &[String]) -> Vec<String> {
        args.iter()
            .map(|arg| {
                arg.replace("{compose_file}", &self.compose_file)
                    .replace("{check_cache}", &self.check_cache)
                    .replace("{base}", &self.base)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TomlConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.base_branch, "main");
        assert_eq!(config.check_cache, "target/check");
        assert_eq!(config.test_check_cache, "target/check-tests");
        assert_eq!(config.commands.test, vec!["cargo", "test"]);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
base_branch = "develop"

[commands]
test = ["cargo", "nextest", "run"]
"#
        )
        .unwrap();

        let config = TomlConfig::load(file.path()).unwrap();
        assert_eq!(config.base_branch, "develop");
        assert_eq!(config.compose_file, "tests/compose-mysql.yml");
        assert_eq!(config.commands.test, vec!["cargo", "nextest", "run"]);
        assert_eq!(config.commands.test_watch, vec!["cargo", "watch", "-x", "test"]);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "package_dirs = 5").unwrap();
        assert!(matches!(
            TomlConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_expand_placeholders() {
        let vars = Vars {
            compose_file: "c.yml".to_string(),
            check_cache: "target/x".to_string(),
            base: "main".to_string(),
        };
        let config = TomlConfig::default();
        assert_eq!(
            vars.expand(&config.commands.type_check),
            vec!["cargo", "check", "--all-targets", "--target-dir", "target/x"]
        );
        assert_eq!(vars.expand(&config.commands.stop)[3], "c.yml");
    }
}
