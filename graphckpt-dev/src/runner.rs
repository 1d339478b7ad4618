//! External command execution
//!
//! Tasks talk to the outside world only through [`CommandRunner`], so the
//! sequencing can be exercised with a scripted runner.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, info};

pub trait CommandRunner {
    /// Run `argv` with inherited stdio and return its exit code
    fn run(&mut self, argv: &[String]) -> Result<i32>;

    /// Run `argv` capturing stdout; stderr stays on the terminal
    fn output(&mut self, argv: &[String]) -> Result<(i32, String)>;

    fn create_dir(&mut self, path: &Path) -> Result<()>;
}

/// Runs commands as child processes of this one
#[derive(Debug, Default)]
pub struct SystemRunner;

fn command(argv: &[String]) -> Result<Command> {
    let Some((program, args)) = argv.split_first() else {
        bail!("Empty command line");
    };
    let mut command = Command::new(program);
    command.args(args);
    Ok(command)
}

/// Exit code as a shell reports it: 128 + signal for killed processes
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, argv: &[String]) -> Result<i32> {
        info!("$ {}", argv.join(" "));
        let status = command(argv)?
            .status()
            .with_context(|| format!("Failed to start {}", argv[0]))?;
        let code = exit_code(status);
        debug!(code, "{} exited", argv[0]);
        Ok(code)
    }

    fn output(&mut self, argv: &[String]) -> Result<(i32, String)> {
        debug!("$ {}", argv.join(" "));
        let output = command(argv)?
            .stderr(Stdio::inherit())
            .output()
            .with_context(|| format!("Failed to start {}", argv[0]))?;
        let stdout = String::from_utf8(output.stdout)
            .with_context(|| format!("{} wrote non-UTF-8 output", argv[0]))?;
        Ok((exit_code(output.status), stdout))
    }

    fn create_dir(&mut self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_empty_command_is_an_error() {
        assert!(SystemRunner.run(&[]).is_err());
    }

    #[test]
    fn test_missing_program_is_an_error() {
        assert!(SystemRunner
            .run(&argv(&["graphckpt-dev-no-such-program"]))
            .is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_codes_pass_through() {
        assert_eq!(SystemRunner.run(&argv(&["sh", "-c", "exit 0"])).unwrap(), 0);
        assert_eq!(SystemRunner.run(&argv(&["sh", "-c", "exit 3"])).unwrap(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_output_captures_stdout() {
        let (code, stdout) = SystemRunner
            .output(&argv(&["sh", "-c", "printf 'a.rs\\nb.rs\\n'"]))
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(stdout, "a.rs\nb.rs\n");
    }

    #[test]
    fn test_create_dir_is_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("target").join("check");
        SystemRunner.create_dir(&nested).unwrap();
        assert!(nested.is_dir());
        // Existing directories are fine
        SystemRunner.create_dir(&nested).unwrap();
    }
}
