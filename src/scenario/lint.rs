//! Scenario linter.
//!
//! Pure static analysis over a parsed scenario. The linter never raises;
//! it reports diagnostics with a rule id, severity, step identity and a
//! best-effort source line.

use crate::scenario::schema::{By, Scenario, Step};
use crate::steps::{StepCategory, StepRegistry};

/// Keywords marking a human-identifying selector string as secret-bearing.
///
/// Checked case-insensitively; includes a localized equivalent of
/// "password".
pub const SECRET_KEYWORDS: &[&str] = &[
    "password",
    "passwd",
    "passphrase",
    "secret",
    "token",
    "パスワード",
];

/// Returns `true` if a selector's human-identifying string suggests the
/// field carries a secret.
#[must_use]
pub fn is_secret_hint(text: &str) -> bool {
    let lower = text.to_lowercase();
    SECRET_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// One lint finding.
#[derive(Debug, Clone)]
pub struct LintDiagnostic {
    /// Stable rule identifier
    pub rule: &'static str,
    /// Finding severity (warnings and infos only; lint never errors)
    pub severity: LintSeverity,
    /// Effective name of the step
    pub step_name: String,
    /// Zero-based flattened step index
    pub step_index: usize,
    /// Best-effort source line of the step
    pub line: Option<usize>,
    /// Human-readable message
    pub message: String,
}

/// Lint finding severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintSeverity {
    /// Should be fixed
    Warning,
    /// Worth knowing
    Info,
}

/// Lints a scenario.
///
/// `source` is the original YAML text, used only to attach line numbers;
/// pass `None` when the text is unavailable.
#[must_use]
pub fn lint(scenario: &Scenario, registry: &StepRegistry, source: Option<&str>) -> Vec<LintDiagnostic> {
    let lines = source.map(step_lines).unwrap_or_default();
    let mut diagnostics = Vec::new();

    for (index, (_, step)) in scenario.flat_steps().enumerate() {
        let line = lines.get(index).copied();
        check_text_only_selector(step, index, line, &mut diagnostics);
        check_missing_any_fallback(step, index, line, registry, &mut diagnostics);
        check_missing_secret(step, index, line, &mut diagnostics);
    }

    diagnostics
}

fn check_text_only_selector(
    step: &Step,
    index: usize,
    line: Option<usize>,
    out: &mut Vec<LintDiagnostic>,
) {
    let Some(by) = step.selector() else { return };
    if selector_uses_bare_text(&by) {
        out.push(LintDiagnostic {
            rule: "text-only-selector",
            severity: LintSeverity::Warning,
            step_name: step.display_name(),
            step_index: index,
            line,
            message: "selecting by visible text alone is brittle; prefer testId, role or css with a text filter".to_string(),
        });
    }
}

fn selector_uses_bare_text(by: &By) -> bool {
    match by {
        By::Text(_) => true,
        By::Any(candidates) => candidates.iter().any(selector_uses_bare_text),
        _ => false,
    }
}

fn check_missing_any_fallback(
    step: &Step,
    index: usize,
    line: Option<usize>,
    registry: &StepRegistry,
    out: &mut Vec<LintDiagnostic>,
) {
    let is_interaction = registry
        .get(&step.kind)
        .is_some_and(|h| h.category() == StepCategory::Interaction);
    if !is_interaction {
        return;
    }
    let Some(by) = step.selector() else { return };
    if by.is_single() && !matches!(by, By::TestId(_)) {
        out.push(LintDiagnostic {
            rule: "missing-any-fallback",
            severity: LintSeverity::Info,
            step_name: step.display_name(),
            step_index: index,
            line,
            message: format!(
                "interaction on single selector {by}; an any-fallback list would survive markup drift"
            ),
        });
    }
}

fn check_missing_secret(
    step: &Step,
    index: usize,
    line: Option<usize>,
    out: &mut Vec<LintDiagnostic>,
) {
    if step.kind != "fill" {
        return;
    }
    let common = step.common();
    if common.secret {
        return;
    }
    let Some(by) = step.selector() else { return };
    let Some(hint) = by.human_hint() else { return };
    if is_secret_hint(hint) {
        out.push(LintDiagnostic {
            rule: "missing-secret",
            severity: LintSeverity::Warning,
            step_name: step.display_name(),
            step_index: index,
            line,
            message: format!(
                "fill target {by} looks like a credential field; set secret: true to mask its value in artifacts"
            ),
        });
    }
}

/// Best-effort source line per flattened step, in document order.
///
/// Steps are sequence items keyed by their type under the root `steps:`
/// block; hook steps live under `hooks:` and are excluded by scanning only
/// the `steps:` block.
fn step_lines(source: &str) -> Vec<usize> {
    let mut lines = Vec::new();
    let mut in_steps = false;
    for (i, raw) in source.lines().enumerate() {
        if raw.starts_with("steps:") {
            in_steps = true;
            continue;
        }
        if in_steps && !raw.is_empty() && !raw.starts_with(' ') && !raw.starts_with('-') {
            in_steps = false;
        }
        if !in_steps {
            continue;
        }
        let trimmed = raw.trim_start();
        if let Some(rest) = trimmed.strip_prefix("- ") {
            let key: String = rest
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            if !key.is_empty() && key != "section" && rest[key.len()..].starts_with(':') {
                lines.push(i + 1);
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::loader;
    use std::path::Path;

    fn lint_text(text: &str) -> Vec<LintDiagnostic> {
        let scenario = loader::parse(text, Path::new("flow.yaml")).unwrap();
        lint(&scenario, &StepRegistry::with_builtins(), Some(text))
    }

    #[test]
    fn clean_scenario_has_no_findings() {
        let diags = lint_text(
            r#"
title: t
baseUrl: https://e.com
steps:
  - goto: { url: /login, name: open-login }
  - fill:
      by: { label: Email }
      value: u@e.com
      name: fill-email
  - fill:
      by: { label: Password }
      value: "${env.PASSWORD}"
      secret: true
      name: fill-password
  - click:
      by: { testId: sign-in }
      name: click-sign-in
"#,
        );
        let warnings: Vec<_> = diags
            .iter()
            .filter(|d| d.severity == LintSeverity::Warning)
            .collect();
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn bare_text_selector_warns() {
        let diags = lint_text(
            r"
title: t
baseUrl: https://e.com
steps:
  - click:
      by: { text: Save }
",
        );
        assert!(diags.iter().any(|d| d.rule == "text-only-selector"));
    }

    #[test]
    fn single_non_test_id_interaction_gets_info() {
        let diags = lint_text(
            r"
title: t
baseUrl: https://e.com
steps:
  - click:
      by: { role: button, name: Save }
",
        );
        let finding = diags
            .iter()
            .find(|d| d.rule == "missing-any-fallback")
            .expect("expected info finding");
        assert_eq!(finding.severity, LintSeverity::Info);
        assert_eq!(finding.step_index, 0);
    }

    #[test]
    fn test_id_interaction_is_clean() {
        let diags = lint_text(
            r"
title: t
baseUrl: https://e.com
steps:
  - click:
      by: { testId: save }
",
        );
        assert!(diags.iter().all(|d| d.rule != "missing-any-fallback"));
    }

    #[test]
    fn unprotected_password_fill_warns() {
        let diags = lint_text(
            r"
title: t
baseUrl: https://e.com
steps:
  - fill:
      by: { label: Password }
      value: hunter2
",
        );
        assert!(diags.iter().any(|d| d.rule == "missing-secret"));
    }

    #[test]
    fn localized_password_label_warns() {
        let diags = lint_text(
            r"
title: t
baseUrl: https://e.com
steps:
  - fill:
      by: { label: パスワード }
      value: hunter2
",
        );
        assert!(diags.iter().any(|d| d.rule == "missing-secret"));
    }

    #[test]
    fn secret_fill_is_clean() {
        let diags = lint_text(
            r"
title: t
baseUrl: https://e.com
steps:
  - fill:
      by: { label: Password }
      value: hunter2
      secret: true
",
        );
        assert!(diags.iter().all(|d| d.rule != "missing-secret"));
    }

    #[test]
    fn step_lines_point_at_step_keys() {
        let text = r"title: t
baseUrl: https://e.com
steps:
  - goto: { url: /a }
  - click:
      by: { text: Save }
";
        let diags = lint_text(text);
        let finding = diags.iter().find(|d| d.rule == "text-only-selector").unwrap();
        assert_eq!(finding.line, Some(5));
    }
}
