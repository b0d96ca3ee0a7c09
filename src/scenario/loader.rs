//! Scenario loading and dumping.
//!
//! Loading pipeline: read file → strip BOM → YAML parse (capturing the
//! failing line) → validate → freeze. Dumping is the inverse: a loaded
//! scenario writes back with fields in declaration order, and
//! `parse(dump(s))` is value-preserving.

use std::path::Path;
use std::sync::Arc;

use crate::error::{SchemaError, ValidationIssue};
use crate::scenario::schema::Scenario;
use crate::scenario::validation::Validator;
use crate::steps::StepRegistry;

/// Result of loading a scenario file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated scenario.
    pub scenario: Arc<Scenario>,

    /// Non-fatal issues encountered during validation.
    pub warnings: Vec<ValidationIssue>,
}

/// Loads and validates a scenario file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, YAML parsing fails (the
/// diagnostic cites the failing line), or validation finds any error-level
/// issue.
pub fn load(path: &Path, registry: &StepRegistry) -> Result<LoadResult, SchemaError> {
    let raw = std::fs::read_to_string(path).map_err(|_| SchemaError::MissingFile {
        path: path.to_path_buf(),
    })?;
    let scenario = parse(&raw, path)?;

    let result = Validator::new().validate(&scenario, registry);
    if result.has_errors() {
        return Err(SchemaError::ValidationFailed {
            path: path.display().to_string(),
            errors: result.errors,
        });
    }

    Ok(LoadResult {
        scenario: Arc::new(scenario),
        warnings: result.warnings,
    })
}

/// Parses scenario YAML text without validating.
///
/// # Errors
///
/// Returns a [`SchemaError::ParseError`] citing the failing line on
/// malformed input.
pub fn parse(text: &str, path: &Path) -> Result<Scenario, SchemaError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    serde_yaml::from_str(text).map_err(|e| SchemaError::ParseError {
        path: path.to_path_buf(),
        line: e.location().map(|l| l.line()),
        message: e.to_string(),
    })
}

/// Serializes a scenario back to YAML.
///
/// Fields are written in declaration order. Comments in the source file do
/// not survive a rewrite; values and ordering do.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn dump(scenario: &Scenario) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(scenario)
}
