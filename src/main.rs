//! `compass` binary entry point.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use compass::cli::{Cli, execute};
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so stdout stays clean for answers and MCP stdio.
fn init_tracing(verbose: bool) {
    let default = if verbose { "compass=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("COMPASS_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(output.as_bytes());
                let _ = stdout.flush();
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let _ = writeln!(std::io::stderr(), "Error: {e}");
            ExitCode::FAILURE
        }
    }
}
