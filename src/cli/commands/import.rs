//! `import` command: convert a recorded script into a scenario.

use std::path::Path;

use crate::cli::args::ImportArgs;
use crate::config::ProjectConfig;
use crate::error::FlowscribeError;
use crate::importer::{self, ImportOptions, ImportSeverity};
use crate::scenario::loader;

/// Runs the importer and writes the scenario.
///
/// Import diagnostics are warnings; they do not fail the command.
///
/// # Errors
///
/// Returns an error if the source cannot be read or contains no
/// recognizable actions, or if the output cannot be written.
pub fn execute(args: &ImportArgs) -> Result<i32, FlowscribeError> {
    let config = ProjectConfig::load(Path::new("."))?;
    let options = ImportOptions {
        with_expects: args.with_expects,
        section_on_url_change: config.import.section_on_url_change,
        submit_words: config.import.submit_words,
        title: args.title.clone(),
    };

    let result = importer::import_file(&args.source, &options)?;
    for diagnostic in &result.diagnostics {
        let severity = match diagnostic.severity {
            ImportSeverity::Warning => "warning",
            ImportSeverity::Info => "info",
        };
        eprintln!(
            "{severity}: line {}: {}",
            diagnostic.line, diagnostic.message
        );
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&args.output, loader::dump(&result.scenario)?)?;
    println!(
        "imported {} -> {}",
        args.source.display(),
        args.output.display()
    );
    Ok(0)
}
