//! `validate` command: check scenario files without running them.

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::error::{FlowscribeError, SchemaError};
use crate::scenario::loader;
use crate::steps::StepRegistry;

#[derive(Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validates each file; exits 1 if any fails.
///
/// # Errors
///
/// Returns an error only on output serialization failure; per-file
/// problems are reported and reflected in the exit code.
pub fn execute(args: &ValidateArgs) -> Result<i32, FlowscribeError> {
    let registry = StepRegistry::with_builtins();
    let mut reports = Vec::new();
    let mut any_invalid = false;

    for path in &args.files {
        let report = match loader::load(path, &registry) {
            Ok(loaded) => FileReport {
                file: path.display().to_string(),
                valid: true,
                errors: Vec::new(),
                warnings: loaded.warnings.iter().map(ToString::to_string).collect(),
            },
            Err(SchemaError::ValidationFailed { errors, .. }) => FileReport {
                file: path.display().to_string(),
                valid: false,
                errors: errors.iter().map(ToString::to_string).collect(),
                warnings: Vec::new(),
            },
            Err(e) => FileReport {
                file: path.display().to_string(),
                valid: false,
                errors: vec![e.to_string()],
                warnings: Vec::new(),
            },
        };
        any_invalid |= !report.valid;
        reports.push(report);
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Human => {
            for report in &reports {
                let status = if report.valid { "ok" } else { "INVALID" };
                println!("{}: {status}", report.file);
                for error in &report.errors {
                    println!("  {error}");
                }
                for warning in &report.warnings {
                    println!("  {warning}");
                }
            }
        }
    }
    Ok(i32::from(any_invalid))
}
