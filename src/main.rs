//! xaa - Command-line tool for planning supersampling antialiasing pipelines

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use xaa::cli;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    cli::run()
}
