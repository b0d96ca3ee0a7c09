//! Report rendering.
//!
//! Consumes a [`ScenarioResult`] and emits three forms into the run
//! directory: `report.json` (faithful serialization), `report.html` (a
//! self-contained page) and `junit.xml` (one testcase per step).

use std::fmt::Write as _;
use std::path::Path;

use crate::error::FlowscribeError;
use crate::runner::result::{ScenarioResult, StepResult, StepStatus};

/// Renders and writes all three report forms into `run_dir`.
///
/// # Errors
///
/// Returns an error on serialization or I/O failure.
pub fn write_all(result: &ScenarioResult, run_dir: &Path) -> Result<(), FlowscribeError> {
    std::fs::write(run_dir.join("report.json"), render_json(result)?)?;
    std::fs::write(run_dir.join("report.html"), render_html(result))?;
    std::fs::write(run_dir.join("junit.xml"), render_junit(result))?;
    Ok(())
}

/// Faithful JSON serialization of the result.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_json(result: &ScenarioResult) -> Result<String, FlowscribeError> {
    Ok(serde_json::to_string_pretty(result)?)
}

// ============================================================================
// HTML
// ============================================================================

/// Self-contained HTML report: steps in order with durations, section
/// headings, linked screenshots, and an expanded failure panel showing the
/// failing selector and error message.
#[must_use]
pub fn render_html(result: &ScenarioResult) -> String {
    let mut out = String::new();
    let status_class = if result.passed() { "passed" } else { "failed" };
    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} — flowscribe report</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 2rem; color: #1a1a1a; }}
h1 span.passed {{ color: #1a7f37; }}
h1 span.failed {{ color: #cf222e; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ text-align: left; padding: 0.4rem 0.8rem; border-bottom: 1px solid #ddd; }}
tr.failed td {{ background: #ffebe9; }}
tr.skipped td {{ color: #888; }}
tr.section th {{ background: #f6f8fa; font-size: 0.9rem; }}
.failure-panel {{ background: #ffebe9; border: 1px solid #cf222e; border-radius: 6px;
  padding: 1rem; margin-top: 1rem; }}
.failure-panel code {{ display: block; margin: 0.3rem 0; }}
.diag {{ color: #57606a; font-size: 0.85rem; }}
</style>
</head>
<body>
<h1>{title} — <span class="{status_class}">{status}</span></h1>
<p>started {started}, took {duration} ms</p>
<table>
<tr><th>#</th><th>step</th><th>type</th><th>status</th><th>duration</th><th>screenshots</th></tr>
"#,
        title = escape_html(&result.title),
        status = status_class,
        started = result.started_at.to_rfc3339(),
        duration = result.duration_ms,
    );

    let mut current_section: Option<&str> = None;
    for step in &result.steps {
        if step.section.as_deref() != current_section {
            current_section = step.section.as_deref();
            if let Some(section) = current_section {
                let _ = write!(
                    out,
                    "<tr class=\"section\"><th colspan=\"6\">{}</th></tr>\n",
                    escape_html(section)
                );
            }
        }
        let class = match step.status {
            StepStatus::Passed => "passed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        let shots = step
            .screenshots
            .iter()
            .map(|s| format!("<a href=\"{0}\">{0}</a>", escape_html(s)))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = write!(
            out,
            "<tr class=\"{class}\"><td>{index}</td><td>{name}</td><td>{kind}</td><td>{class}</td><td>{duration} ms</td><td>{shots}</td></tr>\n",
            index = step.index,
            name = escape_html(&step.name),
            kind = escape_html(&step.kind),
            duration = step.duration_ms,
        );
        if !step.diagnostics.is_empty() {
            let _ = write!(
                out,
                "<tr><td></td><td colspan=\"5\" class=\"diag\">{}</td></tr>\n",
                escape_html(&step.diagnostics.join("; "))
            );
        }
    }
    out.push_str("</table>\n");

    for step in failed_steps(result) {
        let _ = write!(
            out,
            r#"<div class="failure-panel">
<h2>Failed: {name} (step {index})</h2>
{selector}
<code>{error}</code>
</div>
"#,
            name = escape_html(&step.name),
            index = step.index,
            selector = step.selector.as_ref().map_or_else(String::new, |s| {
                format!("<code>selector: {}</code>", escape_html(s))
            }),
            error = escape_html(step.error.as_deref().unwrap_or("unknown error")),
        );
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn failed_steps(result: &ScenarioResult) -> impl Iterator<Item = &StepResult> {
    result
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Failed)
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ============================================================================
// JUnit XML
// ============================================================================

/// JUnit XML: one `<testcase>` per step, failure text from the error.
#[must_use]
pub fn render_junit(result: &ScenarioResult) -> String {
    let failures = failed_steps(result).count();
    let skipped = result
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Skipped)
        .count();
    let total_seconds = millis_to_seconds(result.duration_ms);

    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = write!(
        out,
        "<testsuite name=\"{name}\" tests=\"{tests}\" failures=\"{failures}\" skipped=\"{skipped}\" time=\"{total_seconds}\">\n",
        name = escape_xml(&result.title),
        tests = result.steps.len(),
    );
    for step in &result.steps {
        let time = millis_to_seconds(step.duration_ms);
        let classname = step.section.as_deref().unwrap_or(&result.title);
        let _ = write!(
            out,
            "  <testcase classname=\"{classname}\" name=\"{name}\" time=\"{time}\"",
            classname = escape_xml(classname),
            name = escape_xml(&step.name),
        );
        match step.status {
            StepStatus::Passed => out.push_str("/>\n"),
            StepStatus::Skipped => out.push_str(">\n    <skipped/>\n  </testcase>\n"),
            StepStatus::Failed => {
                let message = step.error.as_deref().unwrap_or("step failed");
                let _ = write!(
                    out,
                    ">\n    <failure message=\"{}\">{}</failure>\n  </testcase>\n",
                    escape_xml(message),
                    escape_xml(message),
                );
            }
        }
    }
    out.push_str("</testsuite>\n");
    out
}

fn millis_to_seconds(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::result::RunStatus;
    use chrono::Utc;
    use std::path::PathBuf;

    fn sample() -> ScenarioResult {
        ScenarioResult {
            title: "Login <flow>".to_string(),
            status: RunStatus::Failed,
            steps: vec![
                StepResult {
                    name: "open-login".to_string(),
                    kind: "goto".to_string(),
                    index: 0,
                    status: StepStatus::Passed,
                    duration_ms: 310,
                    error: None,
                    selector: None,
                    screenshots: vec!["screenshots/0001_before-open-login.jpeg".to_string()],
                    section: None,
                    diagnostics: vec![],
                },
                StepResult {
                    name: "click-save".to_string(),
                    kind: "click".to_string(),
                    index: 1,
                    status: StepStatus::Failed,
                    duration_ms: 5000,
                    error: Some("selector matched 2 elements".to_string()),
                    selector: Some("role=button[name=\"Save\"]".to_string()),
                    screenshots: vec![],
                    section: Some("Checkout".to_string()),
                    diagnostics: vec!["fell back to css=button.save".to_string()],
                },
            ],
            started_at: Utc::now(),
            duration_ms: 5310,
            artifacts_dir: PathBuf::from("runs/run-20260801-101500"),
            trace: Some("trace/trace.zip".to_string()),
        }
    }

    #[test]
    fn json_roundtrips() {
        let result = sample();
        let json = render_json(&result).unwrap();
        let back: ScenarioResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.steps.len(), 2);
        assert_eq!(back.status, RunStatus::Failed);
    }

    #[test]
    fn html_contains_failure_panel_with_selector() {
        let html = render_html(&sample());
        assert!(html.contains("failure-panel"));
        assert!(html.contains("role=button[name=&quot;Save&quot;]"));
        assert!(html.contains("selector matched 2 elements"));
        assert!(html.contains("Checkout"));
        // Title is escaped
        assert!(html.contains("Login &lt;flow&gt;"));
        assert!(!html.contains("Login <flow>"));
    }

    #[test]
    fn html_links_screenshots() {
        let html = render_html(&sample());
        assert!(html.contains("screenshots/0001_before-open-login.jpeg"));
    }

    #[test]
    fn junit_counts_and_escapes() {
        let xml = render_junit(&sample());
        assert!(xml.contains("tests=\"2\""));
        assert!(xml.contains("failures=\"1\""));
        assert!(xml.contains("<failure message=\"selector matched 2 elements\""));
        assert!(xml.contains("name=\"click-save\""));
        assert!(xml.contains("time=\"5.310\""));
    }

    #[test]
    fn write_all_produces_three_files() {
        let tmp = tempfile::tempdir().unwrap();
        write_all(&sample(), tmp.path()).unwrap();
        assert!(tmp.path().join("report.json").exists());
        assert!(tmp.path().join("report.html").exists());
        assert!(tmp.path().join("junit.xml").exists());
    }
}
