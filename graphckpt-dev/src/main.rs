//! graphckpt-dev - development task runner
//!
//! Exits with the exit code of the task: for `test` and `test-watch` that is
//! the test command's code, for lint and format tasks the first failing step's.

use anyhow::Result;
use clap::Parser;
use graphckpt_dev::cli::{self, Args};
use graphckpt_dev::SystemRunner;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Logs go to stderr so tool output on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "graphckpt_dev=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = args.load_config()?;
    let code = cli::run(args, config, SystemRunner)?;
    std::process::exit(code);
}
