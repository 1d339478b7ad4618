//! Task sequencing against a scripted runner
//!
//! The runner records every command line and answers with exit codes chosen
//! per program, so no containers or toolchains are needed.

use anyhow::Result;
use graphckpt_dev::{CommandRunner, Target, Tasks, TomlConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Default)]
struct ScriptedRunner {
    /// Command lines in the order they ran
    calls: Vec<String>,
    /// Exit code by command-line prefix; unmatched commands exit 0
    codes: HashMap<String, i32>,
    /// Prefixes that fail to start at all
    unstartable: Vec<String>,
    diff_stdout: String,
}

impl ScriptedRunner {
    fn exits(mut self, prefix: &str, code: i32) -> Self {
        self.codes.insert(prefix.to_string(), code);
        self
    }

    fn answer(&self, line: &str) -> Result<i32> {
        if self.unstartable.iter().any(|p| line.starts_with(p.as_str())) {
            anyhow::bail!("cannot start {}", line);
        }
        Ok(self
            .codes
            .iter()
            .filter(|(prefix, _)| line.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, code)| *code)
            .unwrap_or(0))
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&mut self, argv: &[String]) -> Result<i32> {
        let line = argv.join(" ");
        self.calls.push(line.clone());
        self.answer(&line)
    }

    fn output(&mut self, argv: &[String]) -> Result<(i32, String)> {
        let line = argv.join(" ");
        self.calls.push(line.clone());
        Ok((self.answer(&line)?, self.diff_stdout.clone()))
    }

    fn create_dir(&mut self, path: &Path) -> Result<()> {
        self.calls.push(format!("mkdir {}", path.display()));
        Ok(())
    }
}

const UP: &str = "docker compose -f tests/compose-mysql.yml up -V --force-recreate --wait";
const LOGS: &str = "docker compose -f tests/compose-mysql.yml logs";
const DOWN: &str = "docker compose -f tests/compose-mysql.yml down -v";
const CLIPPY: &str = "cargo clippy --workspace --all-targets";

fn tasks(runner: ScriptedRunner) -> Tasks<ScriptedRunner> {
    Tasks::new(TomlConfig::default(), runner)
}

fn calls(tasks: &Tasks<ScriptedRunner>) -> Vec<&str> {
    tasks.runner().calls.iter().map(String::as_str).collect()
}

#[test]
fn test_dependency_is_up_before_tests_and_down_after() {
    let mut tasks = tasks(ScriptedRunner::default());
    let code = tasks.test(&["-p".to_string(), "graphckpt-mysql".to_string()]).unwrap();

    assert_eq!(code, 0);
    assert_eq!(
        calls(&tasks),
        vec![UP, "cargo test -p graphckpt-mysql", DOWN]
    );
}

#[test]
fn test_failing_tests_keep_their_exit_code() {
    let mut tasks = tasks(ScriptedRunner::default().exits("cargo test", 101));
    assert_eq!(tasks.test(&[]).unwrap(), 101);

    let downs = calls(&tasks).iter().filter(|c| **c == DOWN).count();
    assert_eq!(downs, 1);
}

#[test]
fn test_teardown_failure_does_not_replace_test_code() {
    let mut tasks = tasks(ScriptedRunner::default().exits(DOWN, 2));
    assert_eq!(tasks.test(&[]).unwrap(), 0);

    let mut tasks = self::tasks(
        ScriptedRunner::default()
            .exits("cargo test", 1)
            .exits(DOWN, 2),
    );
    assert_eq!(tasks.test(&[]).unwrap(), 1);
}

#[test]
fn test_start_failure_prints_logs_skips_tests_and_tears_down() {
    let mut tasks = tasks(ScriptedRunner::default().exits(UP, 17));
    assert_eq!(tasks.test(&[]).unwrap(), 1);
    assert_eq!(calls(&tasks), vec![UP, LOGS, DOWN]);

    // A failing teardown after a failed start still reports 1
    let mut tasks = self::tasks(ScriptedRunner::default().exits(UP, 1).exits(DOWN, 3));
    assert_eq!(tasks.test(&[]).unwrap(), 1);
    assert_eq!(calls(&tasks), vec![UP, LOGS, DOWN]);
}

#[test]
fn test_unstartable_test_command_still_tears_down() {
    let runner = ScriptedRunner {
        unstartable: vec!["cargo test".to_string()],
        ..Default::default()
    };
    let mut tasks = tasks(runner);
    assert!(tasks.test(&[]).is_err());
    assert_eq!(calls(&tasks), vec![UP, "cargo test", DOWN]);
}

#[test]
fn test_watch_uses_the_same_lifecycle() {
    let mut tasks = tasks(ScriptedRunner::default().exits("cargo watch", 130));
    assert_eq!(tasks.test_watch().unwrap(), 130);
    assert_eq!(calls(&tasks), vec![UP, "cargo watch -x test", DOWN]);
}

#[test]
fn test_lint_runs_every_step_in_order() {
    let mut tasks = tasks(ScriptedRunner::default());
    let files = vec![PathBuf::from("src/lib.rs"), PathBuf::from("src/a.rs")];
    assert_eq!(tasks.lint(&files, "target/check").unwrap(), 0);

    assert_eq!(
        calls(&tasks),
        vec![
            CLIPPY,
            "rustfmt --edition 2021 --check src/lib.rs src/a.rs",
            "rustfmt --edition 2021 --check --config reorder_imports=true src/lib.rs src/a.rs",
            "mkdir target/check",
            "cargo check --all-targets --target-dir target/check",
        ]
    );
}

#[test]
fn test_lint_with_empty_set_only_runs_repository_lint() {
    let mut tasks = tasks(ScriptedRunner::default());
    assert_eq!(tasks.lint(&[], "target/check").unwrap(), 0);
    assert_eq!(calls(&tasks), vec![CLIPPY]);
}

#[test]
fn test_lint_stops_at_first_failure() {
    let mut tasks = tasks(ScriptedRunner::default().exits("rustfmt --edition 2021 --check src", 1));
    let files = vec![PathBuf::from("src/lib.rs")];
    assert_eq!(tasks.lint(&files, "target/check").unwrap(), 1);
    assert_eq!(
        calls(&tasks),
        vec![CLIPPY, "rustfmt --edition 2021 --check src/lib.rs"]
    );

    let mut tasks = self::tasks(ScriptedRunner::default().exits(CLIPPY, 101));
    assert_eq!(tasks.lint(&files, "target/check").unwrap(), 101);
    assert_eq!(calls(&tasks), vec![CLIPPY]);
}

#[test]
fn test_format_applies_formatter_then_import_order() {
    let mut tasks = tasks(ScriptedRunner::default());
    assert_eq!(tasks.format(&[PathBuf::from("src/lib.rs")]).unwrap(), 0);
    assert_eq!(
        calls(&tasks),
        vec![
            "rustfmt --edition 2021 src/lib.rs",
            "rustfmt --edition 2021 --config reorder_imports=true src/lib.rs",
        ]
    );

    let mut tasks = self::tasks(ScriptedRunner::default());
    assert_eq!(tasks.format(&[]).unwrap(), 0);
    assert!(calls(&tasks).is_empty());
}

#[test]
fn test_diff_target_uses_base_branch() {
    let dir = tempfile::tempdir().unwrap();
    let changed = dir.path().join("changed.rs");
    std::fs::write(&changed, "").unwrap();

    let runner = ScriptedRunner {
        diff_stdout: format!("{}\nREADME.md\n", changed.display()),
        ..Default::default()
    };
    let mut tasks = tasks(runner);
    let files = tasks
        .resolve(&Target::Diff {
            base: "release".to_string(),
        })
        .unwrap();

    assert_eq!(files, vec![changed]);
    assert_eq!(
        calls(&tasks),
        vec!["git diff --name-only --relative --diff-filter=d release ."]
    );
}

#[test]
fn test_failed_diff_selects_nothing() {
    let mut tasks = tasks(ScriptedRunner::default().exits("git diff", 128));
    let files = tasks
        .resolve(&Target::Diff {
            base: "main".to_string(),
        })
        .unwrap();
    assert!(files.is_empty());
}

#[test]
fn test_tests_target_uses_test_cache() {
    let tasks = tasks(ScriptedRunner::default());
    assert_eq!(tasks.check_cache_for(&Target::Tests), "target/check-tests");
    assert_eq!(tasks.check_cache_for(&Target::Package), "target/check");
    assert_eq!(
        tasks.check_cache_for(&Target::Entries(vec![".".to_string()])),
        "target/check"
    );
}
