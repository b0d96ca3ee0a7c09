//! flowscribe: record-and-replay test authoring for web UIs.

use clap::Parser;

use flowscribe::cli::args::Cli;
use flowscribe::cli::commands;
use flowscribe::observability::logging::init_logging;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let verbosity = if cli.quiet { 0 } else { cli.verbose.max(1) };
    init_logging(cli.log_format, verbosity);

    let code = commands::execute(cli).await;
    u8::try_from(code).map_or(std::process::ExitCode::FAILURE, std::process::ExitCode::from)
}
