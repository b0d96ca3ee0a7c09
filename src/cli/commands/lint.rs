//! `lint` command: static analysis over a scenario.

use serde::Serialize;

use crate::cli::args::{LintArgs, OutputFormat};
use crate::error::FlowscribeError;
use crate::scenario::lint::{LintSeverity, lint};
use crate::scenario::loader;
use crate::steps::StepRegistry;

#[derive(Serialize)]
struct JsonDiagnostic {
    rule: &'static str,
    severity: &'static str,
    step: String,
    index: usize,
    line: Option<usize>,
    message: String,
}

/// Lints one scenario file. Findings never affect the exit code; only a
/// parse failure does.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn execute(args: &LintArgs) -> Result<i32, FlowscribeError> {
    let source = std::fs::read_to_string(&args.file)?;
    let scenario = loader::parse(&source, &args.file)?;
    let registry = StepRegistry::with_builtins();
    let diagnostics = lint(&scenario, &registry, Some(&source));

    match args.format {
        OutputFormat::Json => {
            let out: Vec<JsonDiagnostic> = diagnostics
                .iter()
                .map(|d| JsonDiagnostic {
                    rule: d.rule,
                    severity: match d.severity {
                        LintSeverity::Warning => "warning",
                        LintSeverity::Info => "info",
                    },
                    step: d.step_name.clone(),
                    index: d.step_index,
                    line: d.line,
                    message: d.message.clone(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Human => {
            if diagnostics.is_empty() {
                println!("{}: clean", args.file.display());
            }
            for d in &diagnostics {
                let severity = match d.severity {
                    LintSeverity::Warning => "warning",
                    LintSeverity::Info => "info",
                };
                let line = d.line.map_or_else(String::new, |l| format!(":{l}"));
                println!(
                    "{}{line}: {severity}[{}] step '{}' (#{}): {}",
                    args.file.display(),
                    d.rule,
                    d.step_name,
                    d.step_index,
                    d.message
                );
            }
        }
    }
    Ok(0)
}
