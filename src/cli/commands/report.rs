//! `report` command: re-render reports from an existing run directory.

use crate::cli::args::ReportArgs;
use crate::error::FlowscribeError;
use crate::reporter;
use crate::runner::result::ScenarioResult;

/// Reads `report.json` from the run directory and re-renders the HTML and
/// JUnit forms next to it.
///
/// # Errors
///
/// Returns an error if `report.json` is missing or malformed, or the
/// reports cannot be written.
pub fn execute(args: &ReportArgs) -> Result<i32, FlowscribeError> {
    let json_path = args.run_dir.join("report.json");
    let raw = std::fs::read_to_string(&json_path)?;
    let result: ScenarioResult = serde_json::from_str(&raw)?;
    reporter::write_all(&result, &args.run_dir)?;
    println!(
        "rendered {} and {}",
        args.run_dir.join("report.html").display(),
        args.run_dir.join("junit.xml").display()
    );
    Ok(0)
}
