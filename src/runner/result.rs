//! Run result types.
//!
//! Append-only during a run; serialized as `report.json` and re-read by
//! `report <run-dir>` to re-render the other report forms.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step body completed
    Passed,
    /// The step body raised
    Failed,
    /// The step never ran (an earlier step failed)
    Skipped,
}

/// Result of one executed (or skipped) step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    /// Effective step name
    pub name: String,

    /// Step type
    #[serde(rename = "type")]
    pub kind: String,

    /// Zero-based index in the flattened step list
    pub index: usize,

    /// Outcome
    pub status: StepStatus,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,

    /// Error message (masked) when failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Pretty-printed selector involved in a failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Screenshot paths relative to the run directory
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<String>,

    /// Title of the containing section, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// Resolver and healing notes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

/// Aggregate run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every step passed
    Passed,
    /// At least one step failed
    Failed,
}

/// Result of one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    /// Scenario title
    pub title: String,

    /// Aggregate status: passed iff all steps passed
    pub status: RunStatus,

    /// Ordered step results
    pub steps: Vec<StepResult>,

    /// Run start time
    pub started_at: DateTime<Utc>,

    /// Wall-clock span in milliseconds
    pub duration_ms: u64,

    /// Artifact root directory for this run
    pub artifacts_dir: PathBuf,

    /// Trace archive path relative to the run directory, if retained
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl ScenarioResult {
    /// Whether every step passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_result_roundtrips_through_json() {
        let step = StepResult {
            name: "click-sign-in".to_string(),
            kind: "click".to_string(),
            index: 3,
            status: StepStatus::Failed,
            duration_ms: 120,
            error: Some("selector matched 2 elements".to_string()),
            selector: Some("role=button[name=\"Save\"]".to_string()),
            screenshots: vec!["screenshots/0004_before-click-sign-in.jpeg".to_string()],
            section: Some("Login".to_string()),
            diagnostics: vec!["fell back to css=button.save".to_string()],
        };
        let json = serde_json::to_string(&step).unwrap();
        let back: StepResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, step.name);
        assert_eq!(back.status, step.status);
        assert_eq!(back.index, 3);
        assert!(json.contains("\"type\":\"click\""));
    }
}
