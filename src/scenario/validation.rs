//! Scenario validation.
//!
//! Performed after parsing, on the fully deserialized [`Scenario`].
//! Validation collects ALL issues rather than stopping at the first, so a
//! user fixing a document sees every problem at once. Step payloads are
//! checked through the registry, which makes plugin steps validate exactly
//! like built-ins.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Severity, ValidationIssue};
use crate::scenario::schema::{By, Scenario, Step, StepNode};
use crate::scenario::template;
use crate::steps::StepRegistry;

/// Kebab-case, verb-object step name shape.
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]+)*$").expect("valid regex"));

/// Result of scenario validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Issues that prevent the scenario from running.
    pub errors: Vec<ValidationIssue>,

    /// Informational issues.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Scenario validator. Collects all errors and warnings.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a scenario against the given step registry.
    pub fn validate(mut self, scenario: &Scenario, registry: &StepRegistry) -> ValidationResult {
        self.validate_root(scenario);
        self.validate_vars(scenario);

        for (index, node) in scenario.steps.iter().enumerate() {
            match node {
                StepNode::Step(step) => {
                    self.validate_step(step, &format!("steps[{index}]"), registry);
                }
                StepNode::Section(section) => {
                    let path = format!("steps[{index}].section");
                    if section.title.is_empty() {
                        self.add_error(&format!("{path}.title"), "section title cannot be empty");
                    }
                    if section.steps.is_empty() {
                        self.add_error(&format!("{path}.steps"), "section contains no steps");
                    }
                    for (i, step) in section.steps.iter().enumerate() {
                        self.validate_step(step, &format!("{path}.steps[{i}]"), registry);
                    }
                }
            }
        }

        for (i, step) in scenario.hooks.before_each_step.iter().enumerate() {
            self.validate_step(step, &format!("hooks.beforeEachStep[{i}]"), registry);
        }
        for (i, step) in scenario.hooks.after_each_step.iter().enumerate() {
            self.validate_step(step, &format!("hooks.afterEachStep[{i}]"), registry);
        }

        self.check_duplicate_names(scenario);

        ValidationResult {
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    // ========================================================================
    // Root fields
    // ========================================================================

    fn validate_root(&mut self, scenario: &Scenario) {
        if scenario.title.trim().is_empty() {
            self.add_error("title", "title is required and cannot be empty");
        }
        if !scenario.base_url.starts_with("http://") && !scenario.base_url.starts_with("https://") {
            self.add_error(
                "baseUrl",
                "baseUrl must be an absolute http(s) URL",
            );
        }
        if scenario.steps.is_empty() {
            self.add_error("steps", "steps must contain at least one step");
        }
        let quality = scenario.artifacts.screenshots.quality;
        if !(1..=100).contains(&quality) {
            self.add_error(
                "artifacts.screenshots.quality",
                "quality must be between 1 and 100",
            );
        }
        if scenario.timeout_ms == 0 {
            self.add_error("timeoutMs", "timeout must be greater than zero");
        }
    }

    fn validate_vars(&mut self, scenario: &Scenario) {
        for (name, value) in &scenario.vars {
            self.check_references(value, &format!("vars.{name}"));
        }
    }

    // ========================================================================
    // Steps
    // ========================================================================

    fn validate_step(&mut self, step: &Step, path: &str, registry: &StepRegistry) {
        let Some(handler) = registry.get(&step.kind) else {
            self.add_error(path, &format!("unknown step type '{}'", step.kind));
            return;
        };
        if let Err(message) = handler.check(&step.payload) {
            self.add_error(path, &format!("invalid '{}' payload: {message}", step.kind));
        }

        let common = step.common();
        if let Some(name) = &common.name {
            if !NAME_RE.is_match(name) {
                self.add_warning(
                    &format!("{path}.name"),
                    &format!("step name '{name}' is not kebab-case"),
                );
            }
        }

        if let Some(by) = step.selector() {
            self.validate_selector(&by, &format!("{path}.by"), 0);
            if common.strict.is_some() && !by.is_single() {
                self.add_error(
                    &format!("{path}.strict"),
                    "strict is permitted on single-selector steps only",
                );
            }
        } else if common.strict.is_some() {
            self.add_error(
                &format!("{path}.strict"),
                "strict is permitted on single-selector steps only",
            );
        }

        self.check_payload_references(&step.payload, path);
    }

    fn validate_selector(&mut self, by: &By, path: &str, depth: usize) {
        if let By::Any(candidates) = by {
            if depth > 0 {
                self.add_error(path, "'any' selectors may not nest");
                return;
            }
            if candidates.len() < 2 {
                self.add_error(path, "'any' requires at least 2 candidates");
            }
            for (i, candidate) in candidates.iter().enumerate() {
                self.validate_selector(candidate, &format!("{path}.any[{i}]"), depth + 1);
            }
        }
    }

    fn check_payload_references(&mut self, value: &serde_yaml::Value, path: &str) {
        match value {
            serde_yaml::Value::String(s) => self.check_references(s, path),
            serde_yaml::Value::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.check_payload_references(item, &format!("{path}[{i}]"));
                }
            }
            serde_yaml::Value::Mapping(map) => {
                for (k, v) in map {
                    let key = k.as_str().unwrap_or("?");
                    self.check_payload_references(v, &format!("{path}.{key}"));
                }
            }
            _ => {}
        }
    }

    fn check_references(&mut self, text: &str, path: &str) {
        for expr in template::references(text) {
            let namespace = expr.split_once('.').map(|(ns, _)| ns);
            if !matches!(namespace, Some("env" | "vars")) {
                self.add_error(
                    path,
                    &format!(
                        "malformed reference '${{{expr}}}': only ${{env.X}} and ${{vars.X}} are recognized"
                    ),
                );
            }
        }
    }

    fn check_duplicate_names(&mut self, scenario: &Scenario) {
        let mut seen = std::collections::HashSet::new();
        for (_, step) in scenario.flat_steps() {
            if let Some(name) = step.common().name {
                if !seen.insert(name.clone()) {
                    self.add_warning(
                        "steps",
                        &format!("duplicate step name '{name}'; consider a -2 suffix"),
                    );
                }
            }
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::loader;
    use std::path::Path;

    fn validate(text: &str) -> ValidationResult {
        let scenario = loader::parse(text, Path::new("flow.yaml")).unwrap();
        Validator::new().validate(&scenario, &StepRegistry::with_builtins())
    }

    #[test]
    fn valid_scenario_passes() {
        let result = validate(
            r"
title: ok
baseUrl: https://e.com
steps:
  - goto: { url: /login }
  - click:
      by: { testId: save }
",
        );
        assert!(result.is_valid(), "unexpected errors: {:?}", result.errors);
    }

    #[test]
    fn empty_title_and_relative_base_url_fail() {
        let result = validate(
            r"
title: ''
baseUrl: /relative
steps:
  - reload: {}
",
        );
        assert!(result.has_errors());
        let paths: Vec<_> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"title"));
        assert!(paths.contains(&"baseUrl"));
    }

    #[test]
    fn empty_steps_fail() {
        let result = validate("title: t\nbaseUrl: https://e.com\nsteps: []\n");
        assert!(result.has_errors());
    }

    #[test]
    fn unknown_step_type_fails() {
        let result = validate(
            r"
title: t
baseUrl: https://e.com
steps:
  - teleport: { to: mars }
",
        );
        assert!(result.has_errors());
        assert!(result.errors[0].message.contains("teleport"));
    }

    #[test]
    fn any_with_one_candidate_fails() {
        let result = validate(
            r"
title: t
baseUrl: https://e.com
steps:
  - click:
      by:
        any:
          - { testId: save }
",
        );
        assert!(result.has_errors());
        assert!(result.errors.iter().any(|e| e.message.contains("at least 2")));
    }

    #[test]
    fn nested_any_fails() {
        let result = validate(
            r"
title: t
baseUrl: https://e.com
steps:
  - click:
      by:
        any:
          - { testId: save }
          - any:
              - { testId: a }
              - { testId: b }
",
        );
        assert!(result.has_errors());
        assert!(result.errors.iter().any(|e| e.message.contains("nest")));
    }

    #[test]
    fn strict_on_any_fails() {
        let result = validate(
            r"
title: t
baseUrl: https://e.com
steps:
  - click:
      strict: false
      by:
        any:
          - { testId: a }
          - { testId: b }
",
        );
        assert!(result.has_errors());
        assert!(result.errors.iter().any(|e| e.path.ends_with(".strict")));
    }

    #[test]
    fn malformed_reference_fails() {
        let result = validate(
            r#"
title: t
baseUrl: https://e.com
steps:
  - fill:
      by: { label: Email }
      value: "${secrets.KEY}"
"#,
        );
        assert!(result.has_errors());
        assert!(result.errors.iter().any(|e| e.message.contains("secrets.KEY")));
    }

    #[test]
    fn bad_payload_shape_fails() {
        let result = validate(
            r"
title: t
baseUrl: https://e.com
steps:
  - fill:
      by: { label: Email }
",
        );
        // fill requires `value`
        assert!(result.has_errors());
        assert!(result.errors.iter().any(|e| e.message.contains("fill")));
    }

    #[test]
    fn hook_steps_are_validated() {
        let result = validate(
            r"
title: t
baseUrl: https://e.com
hooks:
  beforeEachStep:
    - nonsense: {}
steps:
  - reload: {}
",
        );
        assert!(result.has_errors());
        assert!(result.errors.iter().any(|e| e.path.contains("beforeEachStep")));
    }

    #[test]
    fn non_kebab_name_warns() {
        let result = validate(
            r"
title: t
baseUrl: https://e.com
steps:
  - click:
      by: { testId: save }
      name: ClickSave
",
        );
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.message.contains("kebab")));
    }
}
