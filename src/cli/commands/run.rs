//! `run` command: replay scenarios.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::args::{DriverChoice, RunArgs};
use crate::config::ProjectConfig;
use crate::driver::Driver;
use crate::driver::mock::MockDriver;
use crate::error::FlowscribeError;
use crate::runner::{RunOptions, Runner};
use crate::scenario::loader;
use crate::steps::StepRegistry;

/// Loads, validates and replays the given scenarios, at most `--workers`
/// concurrently. Exits 0 iff every scenario passed.
///
/// # Errors
///
/// Returns an error when a scenario fails to load or validate; run-time
/// step failures are reported per scenario and reflected in the exit code
/// instead.
pub async fn execute(args: &RunArgs) -> Result<i32, FlowscribeError> {
    let config = ProjectConfig::load(Path::new("."))?;
    let registry = Arc::new(StepRegistry::with_builtins());
    let driver: Arc<dyn Driver> = match args.driver {
        DriverChoice::Mock => Arc::new(MockDriver::default()),
    };
    let runner = Runner::new(driver, registry);

    let mut scenarios = Vec::with_capacity(args.scenarios.len());
    for path in &args.scenarios {
        let loaded = loader::load(path, runner.registry())?;
        for warning in &loaded.warnings {
            warn!(path = %path.display(), "{warning}");
        }
        scenarios.push(loaded.scenario);
    }

    let mut env_overlay = IndexMap::new();
    for pair in &args.env {
        match pair.split_once('=') {
            Some((key, value)) => {
                env_overlay.insert(key.to_string(), value.to_string());
            }
            None => {
                eprintln!("ignoring malformed --env '{pair}' (expected KEY=VALUE)");
            }
        }
    }

    let opts = RunOptions {
        artifacts_root: args
            .artifacts_root
            .clone()
            .unwrap_or(config.runs_dir),
        headless: !args.headed,
        workers: args.workers,
        env_overlay,
        scenario_timeout: args.timeout.map(Duration::from_secs),
        cancel: CancellationToken::new(),
    };

    // Ctrl-C cancels every in-flight scenario at its next suspension point.
    let cancel = opts.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let results = runner.run_all(&scenarios, &opts).await;
    let mut all_passed = true;
    for (path, outcome) in args.scenarios.iter().zip(results) {
        match outcome {
            Ok(result) => {
                let status = if result.passed() { "passed" } else { "FAILED" };
                println!(
                    "{}: {status} ({} steps, {} ms) -> {}",
                    path.display(),
                    result.steps.len(),
                    result.duration_ms,
                    result.artifacts_dir.display()
                );
                all_passed &= result.passed();
            }
            Err(e) => {
                eprintln!("{}: error: {e}", path.display());
                all_passed = false;
            }
        }
    }
    Ok(i32::from(!all_passed))
}
