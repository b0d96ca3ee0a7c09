//! Command dispatch.

pub mod import;
pub mod init;
pub mod lint;
pub mod list_steps;
pub mod record;
pub mod report;
pub mod run;
pub mod validate;

use crate::cli::args::{Cli, Commands};

/// Executes the parsed CLI, returning the process exit code: 0 on
/// success, 1 on any scenario failure or validation error.
pub async fn execute(cli: Cli) -> i32 {
    let outcome = match &cli.command {
        Commands::Init(args) => init::execute(args),
        Commands::Record(args) => record::execute(args).await,
        Commands::Import(args) => import::execute(args),
        Commands::Run(args) => run::execute(args).await,
        Commands::Validate(args) => validate::execute(args),
        Commands::Lint(args) => lint::execute(args),
        Commands::Report(args) => report::execute(args),
        Commands::ListSteps(args) => list_steps::execute(args),
    };
    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}
