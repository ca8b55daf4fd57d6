//! droidrun - deploy and run Android apps from the command line
//!
//! Entry point that parses flags, initializes diagnostics and maps the
//! run outcome onto the process exit code.

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use droidrun::cli::Cli;
use droidrun::commands;
use droidrun::core::RunOutcome;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit code after an interrupt, per shell convention.
const EXIT_INTERRUPTED: u8 = 130;

/// Main entry point
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_diagnostics(cli.verbose);
    debug!("droidrun v{} starting", VERSION);

    match commands::execute(&cli).await {
        Ok(RunOutcome::Finished) => ExitCode::SUCCESS,
        Ok(RunOutcome::Interrupted) => {
            eprintln!("interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(err) => {
            eprintln!("error: {err} [{}]", err.kind());
            ExitCode::FAILURE
        }
    }
}

/// Diagnostics go to stderr; stdout carries only command output.
fn init_diagnostics(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
