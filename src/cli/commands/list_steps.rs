//! `list-steps` command: enumerate the step registry.

use serde::Serialize;

use crate::cli::args::{ListStepsArgs, OutputFormat};
use crate::error::FlowscribeError;
use crate::steps::StepRegistry;

#[derive(Serialize)]
struct StepInfo {
    name: &'static str,
    category: &'static str,
    schema: &'static str,
}

/// Prints every registered step type with its category and payload shape.
///
/// # Errors
///
/// Returns an error only on output serialization failure.
pub fn execute(args: &ListStepsArgs) -> Result<i32, FlowscribeError> {
    let registry = StepRegistry::with_builtins();
    let steps: Vec<StepInfo> = registry
        .list()
        .map(|h| StepInfo {
            name: h.name(),
            category: h.category().label(),
            schema: h.schema(),
        })
        .collect();

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&steps)?),
        OutputFormat::Human => {
            let width = steps.iter().map(|s| s.name.len()).max().unwrap_or(0);
            for step in &steps {
                println!(
                    "{name:<width$}  [{category}]  {schema}",
                    name = step.name,
                    category = step.category,
                    schema = step.schema,
                );
            }
        }
    }
    Ok(0)
}
