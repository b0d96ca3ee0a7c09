//! Error types for `flowscribe`.
//!
//! One enum per failure domain: document shape ([`SchemaError`]), variable
//! substitution ([`VarError`]), selector resolution ([`ResolveError`]),
//! driver transport ([`DriverError`]), run execution ([`RunError`]) and
//! script import ([`ImportError`]), aggregated by [`FlowscribeError`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Schema Errors
// ============================================================================

/// Scenario document loading and validation errors.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// YAML parsing failed
    #[error("parse error in {path}{}: {message}", line.map_or_else(String::new, |l| format!(" (line {l})")))]
    ParseError {
        /// Path to the scenario file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Scenario validation failed
    #[error("validation failed for {path}: {} error(s)", errors.len())]
    ValidationFailed {
        /// Path to the scenario file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Field path within the document
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

/// A single validation issue found during scenario validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "steps[2].click.by")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the scenario from being run
    Error,
    /// Potential issue that does not prevent loading
    Warning,
}

// ============================================================================
// Variable Errors
// ============================================================================

/// Variable substitution errors.
#[derive(Debug, Error)]
pub enum VarError {
    /// Reference to a variable that is not defined
    #[error("undefined variable '{namespace}.{name}' referenced by step '{step}'")]
    Undefined {
        /// Namespace of the reference (`env` or `vars`)
        namespace: String,
        /// Name of the variable
        name: String,
        /// Name of the referring step
        step: String,
    },

    /// Reference using an unrecognized namespace
    #[error("malformed reference '${{{expr}}}' in step '{step}': only ${{env.X}} and ${{vars.X}} are recognized")]
    UnknownNamespace {
        /// The full expression inside `${...}`
        expr: String,
        /// Name of the referring step
        step: String,
    },
}

// ============================================================================
// Resolver Errors
// ============================================================================

/// Why a single fallback candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateFailure {
    /// No element matched the candidate
    NoMatch,
    /// More than one element matched
    MultipleMatches,
    /// A unique element matched but never became visible
    NotVisible,
    /// The per-candidate time budget ran out
    Timeout,
}

impl std::fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMatch => write!(f, "no match"),
            Self::MultipleMatches => write!(f, "multiple matches"),
            Self::NotVisible => write!(f, "not visible"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Selector resolution errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No element matched the selector within the timeout
    #[error("no element matched {selector}")]
    NoMatch {
        /// Pretty-printed selector
        selector: String,
    },

    /// Strictness violation: more than one element matched
    #[error("selector {selector} matched {count} elements (strict mode requires exactly one)")]
    Ambiguous {
        /// Pretty-printed selector
        selector: String,
        /// Number of matching elements
        count: usize,
    },

    /// A unique match was found but never satisfied visibility in time
    #[error("timed out after {timeout:?} waiting for {selector}")]
    Timeout {
        /// Pretty-printed selector
        selector: String,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// Every candidate of an `any` selector failed
    #[error("all {} candidates failed: {}", failures.len(), format_failures(failures))]
    AllCandidatesFailed {
        /// (candidate, reason) pairs in declaration order
        failures: Vec<(String, CandidateFailure)>,
    },
}

fn format_failures(failures: &[(String, CandidateFailure)]) -> String {
    failures
        .iter()
        .map(|(sel, reason)| format!("{sel}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Driver Errors
// ============================================================================

/// Errors surfaced by the browser driver capability.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Navigation failed (bad URL, network failure, page crash)
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The browser or page crashed
    #[error("browser crashed: {0}")]
    Crashed(String),

    /// Driver protocol or capability error
    #[error("driver error: {0}")]
    Protocol(String),

    /// Element handle is no longer attached to the DOM
    #[error("stale element handle {0}")]
    StaleHandle(u64),

    /// I/O error from the driver layer
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Run Errors
// ============================================================================

/// Errors raised during step execution.
#[derive(Debug, Error)]
pub enum RunError {
    /// Variable substitution failed
    #[error(transparent)]
    Var(#[from] VarError),

    /// Selector resolution failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Driver operation failed
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// An assertion step did not hold
    #[error("assertion failed: {message}")]
    Assertion {
        /// What was expected vs observed
        message: String,
    },

    /// No handler registered for the step type
    #[error("unknown step type '{kind}'")]
    UnknownStep {
        /// The unrecognized step type name
        kind: String,
    },

    /// Step payload did not match the handler schema
    #[error("invalid payload for step '{kind}': {message}")]
    InvalidPayload {
        /// Step type name
        kind: String,
        /// Parse error detail
        message: String,
    },

    /// The per-step timeout elapsed
    #[error("step timed out after {timeout:?}")]
    StepTimeout {
        /// The elapsed budget
        timeout: Duration,
    },

    /// The per-scenario timeout elapsed
    #[error("scenario timed out after {timeout:?}")]
    ScenarioTimeout {
        /// The elapsed budget
        timeout: Duration,
    },

    /// A `beforeEachStep`/`afterEachStep` hook failed
    #[error("hook '{hook}' failed: {message}")]
    HookFailed {
        /// Name of the failing hook step
        hook: String,
        /// Underlying error message
        message: String,
    },

    /// Execution was cancelled at a suspension point
    #[error("cancelled")]
    Cancelled,

    /// Artifact persistence failed
    #[error("artifact error: {0}")]
    Artifact(#[from] std::io::Error),
}

// ============================================================================
// Import Errors
// ============================================================================

/// Errors raised by the recorded-script importer.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The source script could not be read
    #[error("cannot read script {path}: {message}")]
    Unreadable {
        /// Path to the recorded script
        path: PathBuf,
        /// I/O error detail
        message: String,
    },

    /// The script contained no recognizable actions
    #[error("no recognizable actions in {path}")]
    Empty {
        /// Path to the recorded script
        path: PathBuf,
    },
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `flowscribe` operations.
#[derive(Debug, Error)]
pub enum FlowscribeError {
    /// Scenario document error
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Run execution error
    #[error(transparent)]
    Run(#[from] RunError),

    /// Script import error
    #[error(transparent)]
    Import(#[from] ImportError),

    /// Driver error outside step execution (launch, teardown)
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for `flowscribe` operations.
pub type Result<T> = std::result::Result<T, FlowscribeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_issue_display() {
        let issue = ValidationIssue {
            path: "steps[0].click.by".to_string(),
            message: "missing selector".to_string(),
            severity: Severity::Error,
        };
        assert_eq!(
            issue.to_string(),
            "error: missing selector at steps[0].click.by"
        );
    }

    #[test]
    fn all_candidates_failed_lists_reasons_in_order() {
        let err = ResolveError::AllCandidatesFailed {
            failures: vec![
                ("testId=save".to_string(), CandidateFailure::NoMatch),
                ("css=button.save".to_string(), CandidateFailure::NotVisible),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("all 2 candidates failed"));
        let first = text.find("testId=save").unwrap();
        let second = text.find("css=button.save").unwrap();
        assert!(first < second);
    }

    #[test]
    fn schema_parse_error_cites_line() {
        let err = SchemaError::ParseError {
            path: PathBuf::from("flow.yaml"),
            line: Some(7),
            message: "unexpected token".to_string(),
        };
        assert!(err.to_string().contains("flow.yaml"));
        assert!(err.to_string().contains("line 7"));
    }

    #[test]
    fn var_error_names_step() {
        let err = VarError::Undefined {
            namespace: "env".to_string(),
            name: "PASSWORD".to_string(),
            step: "fill-password".to_string(),
        };
        assert!(err.to_string().contains("env.PASSWORD"));
        assert!(err.to_string().contains("fill-password"));
    }
}
