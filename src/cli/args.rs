//! CLI argument definitions.
//!
//! All Clap derive structs for `flowscribe` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::logging::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Record-and-replay test authoring tool for web UIs.
#[derive(Parser, Debug)]
#[command(name = "flowscribe", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "FLOWSCRIBE_LOG_FORMAT")]
    pub log_format: LogFormat,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Materialize the project folder layout and default configuration.
    Init(InitArgs),

    /// Invoke the external recorder, then import the recording.
    Record(RecordArgs),

    /// Convert a recorded script into a scenario.
    Import(ImportArgs),

    /// Replay one or more scenarios.
    Run(RunArgs),

    /// Validate scenario files without running them.
    Validate(ValidateArgs),

    /// Lint a scenario file.
    Lint(LintArgs),

    /// Re-render reports from an existing run directory.
    Report(ReportArgs),

    /// Enumerate registered step types.
    ListSteps(ListStepsArgs),
}

// ============================================================================
// Per-Command Arguments
// ============================================================================

/// Arguments for `init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Project directory (defaults to the current directory).
    #[arg(default_value = ".")]
    pub dir: PathBuf,
}

/// Arguments for `record`.
#[derive(Args, Debug)]
pub struct RecordArgs {
    /// URL the recorder opens.
    pub url: Option<String>,

    /// Skip the automatic import after recording.
    #[arg(long)]
    pub no_import: bool,

    /// Slug for the recording file name (derived from the URL by default).
    #[arg(long)]
    pub slug: Option<String>,
}

/// Arguments for `import`.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Recorded script to convert.
    pub source: PathBuf,

    /// Destination scenario file.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Insert expectVisible after deterministic-locator interactions.
    #[arg(long)]
    pub with_expects: bool,

    /// Scenario title (derived from the file name by default).
    #[arg(long)]
    pub title: Option<String>,
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario files to run.
    #[arg(required = true)]
    pub scenarios: Vec<PathBuf>,

    /// Run with a visible browser window.
    #[arg(long, conflicts_with = "headless")]
    pub headed: bool,

    /// Run without a browser window (default).
    #[arg(long)]
    pub headless: bool,

    /// Maximum scenarios running concurrently.
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    /// Root directory for run artifacts (defaults to the configured runsDir).
    #[arg(long)]
    pub artifacts_root: Option<PathBuf>,

    /// KEY=VALUE pairs shadowing the process environment for ${env.X}.
    #[arg(long, value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Bound on each scenario lifecycle, in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Browser driver implementation.
    #[arg(long, default_value = "mock", env = "FLOWSCRIBE_DRIVER")]
    pub driver: DriverChoice,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Scenario files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `lint`.
#[derive(Args, Debug)]
pub struct LintArgs {
    /// Scenario file to lint.
    pub file: PathBuf,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `report`.
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Run directory containing report.json.
    pub run_dir: PathBuf,
}

/// Arguments for `list-steps`.
#[derive(Args, Debug)]
pub struct ListStepsArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Value Enums
// ============================================================================

/// Output format for inspection commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Human,
    /// Machine-readable JSON.
    Json,
}

/// Browser driver selection.
///
/// The real browser is an external collaborator; `mock` is the in-memory
/// driver shipped with the crate. Integrations register additional drivers
/// through the `driver::Driver` trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DriverChoice {
    /// In-memory mock driver (tests and dry runs).
    Mock,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_parses_workers_and_env() {
        let cli = Cli::try_parse_from([
            "flowscribe", "run", "flows/login.yaml", "--workers", "3", "--env", "A=1", "--env",
            "B=2",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.workers, 3);
        assert_eq!(args.env, vec!["A=1", "B=2"]);
        assert_eq!(args.driver, DriverChoice::Mock);
    }

    #[test]
    fn headed_conflicts_with_headless() {
        let err = Cli::try_parse_from(["flowscribe", "run", "f.yaml", "--headed", "--headless"]);
        assert!(err.is_err());
    }
}
