//! Script-to-scenario importer.
//!
//! Reads a recorded script, lifts it into raw actions, maps each onto a
//! step, then applies the readability passes: auto-naming, secret
//! detection, optional assertion insertion and advisory sectioning.
//! Unknown call shapes produce a warning and a passthrough `log` step;
//! they never abort the conversion.

pub mod mapping;
pub mod naming;
pub mod scanner;

use std::path::Path;

use tracing::debug;

use crate::error::ImportError;
use crate::scenario::lint::is_secret_hint;
use crate::scenario::schema::{By, Scenario, Section, Step, StepNode};
use crate::steps::assertions::ExpectByParams;

use mapping::MappedStep;
use naming::NameAllocator;
use scanner::ScanItem;

/// Default submit-action lexicon for sectioning, including localized
/// equivalents.
pub const DEFAULT_SUBMIT_WORDS: &[&str] = &[
    "submit", "save", "sign in", "sign-in", "signin", "log in", "login", "send", "confirm",
    "next", "続行", "送信", "ログイン", "保存",
];

/// Importer options.
///
/// The sectioning heuristics are configurable rather than hard-coded: the
/// submit lexicon and the URL-change rule can both be adjusted per project.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Insert `expectVisible` after deterministic-locator interactions
    pub with_expects: bool,
    /// Start a new section when the URL path prefix changes
    pub section_on_url_change: bool,
    /// Lowercased words marking a click as submit-like
    pub submit_words: Vec<String>,
    /// Scenario title override (derived from the file name by default)
    pub title: Option<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            with_expects: false,
            section_on_url_change: true,
            submit_words: DEFAULT_SUBMIT_WORDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            title: None,
        }
    }
}

/// Severity of an import diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportSeverity {
    /// Worth fixing in the emitted scenario
    Warning,
    /// Informational
    Info,
}

/// One diagnostic produced during import.
#[derive(Debug, Clone)]
pub struct ImportDiagnostic {
    /// Severity
    pub severity: ImportSeverity,
    /// 1-based source line in the recorded script
    pub line: usize,
    /// Human-readable message
    pub message: String,
}

/// Result of importing a recorded script.
#[derive(Debug)]
pub struct ImportResult {
    /// The emitted scenario
    pub scenario: Scenario,
    /// Warnings and notes gathered along the way
    pub diagnostics: Vec<ImportDiagnostic>,
}

/// Imports a recorded script file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains no
/// recognizable actions.
pub fn import_file(path: &Path, opts: &ImportOptions) -> Result<ImportResult, ImportError> {
    let source = std::fs::read_to_string(path).map_err(|e| ImportError::Unreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    import_script(&source, path, opts)
}

/// Imports recorded script text.
///
/// # Errors
///
/// Returns [`ImportError::Empty`] when nothing in the script is
/// recognizable as an action.
pub fn import_script(
    source: &str,
    path: &Path,
    opts: &ImportOptions,
) -> Result<ImportResult, ImportError> {
    let mut diagnostics = Vec::new();
    let mut names = NameAllocator::new();
    let mut steps: Vec<MappedStep> = Vec::new();
    let mut last_by: Option<By> = None;
    let mut any_recognized = false;

    for item in scanner::scan(source) {
        match item {
            ScanItem::Action(action) => match mapping::map_action(&action, last_by.as_ref()) {
                Ok(mapped) => {
                    any_recognized = true;
                    if let Some(by) = &mapped.by {
                        last_by = Some(by.clone());
                    }
                    steps.push(mapped);
                }
                Err(failure) => {
                    diagnostics.push(ImportDiagnostic {
                        severity: ImportSeverity::Warning,
                        line: action.line,
                        message: format!("{failure}; emitted as passthrough"),
                    });
                    steps.push(passthrough(
                        &format!("page.{}(…)", action.kind),
                        action.line,
                        &mut names,
                    ));
                }
            },
            ScanItem::Unknown { line, text } => {
                diagnostics.push(ImportDiagnostic {
                    severity: ImportSeverity::Warning,
                    line,
                    message: format!("unrecognized statement; emitted as passthrough: {text}"),
                });
                steps.push(passthrough(&text, line, &mut names));
            }
        }
    }

    if !any_recognized {
        return Err(ImportError::Empty {
            path: path.to_path_buf(),
        });
    }

    apply_secret_detection(&mut steps, &mut diagnostics);
    if opts.with_expects {
        insert_expects(&mut steps);
    }
    assign_names(&mut steps, &mut names);

    let base_url = steps
        .iter()
        .find(|s| s.step.kind == "goto")
        .and_then(|s| s.url.as_deref())
        .map_or_else(|| "http://localhost".to_string(), origin_of);

    let title = opts
        .title
        .clone()
        .unwrap_or_else(|| title_from_path(path));

    let nodes = sectionize(steps, opts);
    debug!(steps = count_steps(&nodes), "import finished");

    Ok(ImportResult {
        scenario: Scenario {
            title,
            base_url,
            vars: indexmap::IndexMap::new(),
            artifacts: crate::scenario::schema::ArtifactsPolicy::default(),
            hooks: crate::scenario::schema::Hooks::default(),
            healing: crate::scenario::schema::HealingMode::default(),
            timeout_ms: 10_000,
            env: crate::scenario::schema::RunEnv::default(),
            steps: nodes,
        },
        diagnostics,
    })
}

fn count_steps(nodes: &[StepNode]) -> usize {
    nodes
        .iter()
        .map(|n| match n {
            StepNode::Step(_) => 1,
            StepNode::Section(s) => s.steps.len(),
        })
        .sum()
}

fn passthrough(text: &str, line: usize, names: &mut NameAllocator) -> MappedStep {
    let name = names.allocate("note", &format!("line-{line}"));
    let payload = serde_yaml::to_value(serde_yaml::Mapping::from_iter([
        (
            serde_yaml::Value::String("message".to_string()),
            serde_yaml::Value::String(format!("passthrough (recorder line {line}): {text}")),
        ),
        (
            serde_yaml::Value::String("name".to_string()),
            serde_yaml::Value::String(name),
        ),
    ]))
    .unwrap_or(serde_yaml::Value::Null);
    MappedStep {
        step: Step {
            kind: "log".to_string(),
            payload,
        },
        by: None,
        url: None,
        line,
    }
}

// ============================================================================
// Readability passes
// ============================================================================

/// Sets `secret: true` on fills whose selector looks credential-bearing.
fn apply_secret_detection(steps: &mut [MappedStep], diagnostics: &mut Vec<ImportDiagnostic>) {
    for mapped in steps.iter_mut() {
        if mapped.step.kind != "fill" {
            continue;
        }
        let Some(hint) = mapped.by.as_ref().and_then(By::human_hint) else {
            continue;
        };
        if is_secret_hint(hint) {
            set_payload_field(
                &mut mapped.step,
                "secret",
                serde_yaml::Value::Bool(true),
            );
            diagnostics.push(ImportDiagnostic {
                severity: ImportSeverity::Warning,
                line: mapped.line,
                message: format!(
                    "fill target {:?} looks like a credential; marked secret and its value will be masked in artifacts",
                    hint
                ),
            });
        }
    }
}

/// Inserts `expectVisible` after interactions with deterministic locators
/// (testId, or role with a name). Never after navigation.
fn insert_expects(steps: &mut Vec<MappedStep>) {
    const INTERACTIONS: &[&str] = &[
        "click", "dblclick", "fill", "press", "check", "uncheck", "selectOption",
    ];
    let mut out: Vec<MappedStep> = Vec::with_capacity(steps.len());
    for mapped in steps.drain(..) {
        let insert = INTERACTIONS.contains(&mapped.step.kind.as_str())
            && matches!(
                &mapped.by,
                Some(By::TestId(_) | By::Role { name: Some(_), .. })
            );
        let by = mapped.by.clone();
        let line = mapped.line;
        out.push(mapped);
        if insert {
            if let Some(by) = by {
                if let Ok(step) = Step::from_payload("expectVisible", &ExpectByParams {
                    by: by.clone(),
                    common: crate::scenario::schema::StepCommon::default(),
                }) {
                    out.push(MappedStep {
                        step,
                        by: Some(by),
                        url: None,
                        line,
                    });
                }
            }
        }
    }
    *steps = out;
}

/// Assigns verb-object names to every step lacking one.
fn assign_names(steps: &mut [MappedStep], names: &mut NameAllocator) {
    for mapped in steps.iter_mut() {
        if mapped.step.common().name.is_some() {
            continue;
        }
        let verb = naming::verb_for(&mapped.step.kind);
        let object = mapped.url.as_deref().map_or_else(
            || {
                mapped
                    .by
                    .as_ref()
                    .map(naming::object_for_selector)
                    .unwrap_or_default()
            },
            naming::object_for_url,
        );
        let name = names.allocate(verb, &object);
        set_payload_field(
            &mut mapped.step,
            "name",
            serde_yaml::Value::String(name),
        );
    }
}

fn set_payload_field(step: &mut Step, key: &str, value: serde_yaml::Value) {
    if let serde_yaml::Value::Mapping(map) = &mut step.payload {
        map.insert(serde_yaml::Value::String(key.to_string()), value);
    }
}

// ============================================================================
// Sectioning
// ============================================================================

const INPUT_KINDS: &[&str] = &["fill", "check", "uncheck", "selectOption", "press"];
const ASSERTION_KINDS: &[&str] = &["expectVisible", "expectHidden", "expectText", "expectUrl"];

/// Heuristically partitions steps into sections. Advisory only: ordering
/// is never changed, and a single resulting section stays flat.
fn sectionize(steps: Vec<MappedStep>, opts: &ImportOptions) -> Vec<StepNode> {
    let mut boundaries = vec![0usize];
    let mut last_path_prefix: Option<String> = None;

    for (i, mapped) in steps.iter().enumerate() {
        // (a) URL path prefix changed
        if opts.section_on_url_change && mapped.step.kind == "goto" {
            if let Some(url) = &mapped.url {
                let prefix = path_prefix(url);
                if last_path_prefix.as_deref().is_some_and(|p| p != prefix) && i > 0 {
                    boundaries.push(i);
                }
                last_path_prefix = Some(prefix);
            }
        }
        // (b) input run ends with a submit-like action
        if i > 0
            && is_submit_like(mapped, &opts.submit_words)
            && INPUT_KINDS.contains(&steps[i - 1].step.kind.as_str())
            && i + 1 < steps.len()
        {
            boundaries.push(i + 1);
        }
        // (c) an assertion follows a group of interactions
        if i > 0
            && ASSERTION_KINDS.contains(&mapped.step.kind.as_str())
            && !ASSERTION_KINDS.contains(&steps[i - 1].step.kind.as_str())
            && steps[i - 1].step.kind != "goto"
        {
            boundaries.push(i);
        }
    }

    boundaries.sort_unstable();
    boundaries.dedup();

    if boundaries.len() < 2 {
        return steps
            .into_iter()
            .map(|m| StepNode::Step(m.step))
            .collect();
    }

    let mut nodes = Vec::new();
    let mut bounds = boundaries.into_iter().peekable();
    let mut sections: Vec<(usize, usize)> = Vec::new();
    while let Some(start) = bounds.next() {
        let end = bounds.peek().copied().unwrap_or(steps.len());
        sections.push((start, end));
    }

    for (n, (start, end)) in sections.iter().enumerate() {
        let slice = &steps[*start..*end];
        let title = slice
            .iter()
            .find_map(|m| m.url.as_deref().map(section_title))
            .unwrap_or_else(|| format!("Part {}", n + 1));
        nodes.push(StepNode::Section(Section {
            title,
            steps: slice.iter().map(|m| m.step.clone()).collect(),
        }));
    }
    nodes
}

fn is_submit_like(mapped: &MappedStep, submit_words: &[String]) -> bool {
    if mapped.step.kind != "click" && mapped.step.kind != "press" {
        return false;
    }
    let Some(hint) = mapped.by.as_ref().and_then(By::human_hint) else {
        return mapped.step.kind == "press";
    };
    let lower = hint.to_lowercase();
    submit_words.iter().any(|w| lower.contains(w.as_str()))
}

fn path_prefix(url: &str) -> String {
    let after_scheme = url.split("://").nth(1).unwrap_or(url);
    let path = after_scheme.find('/').map_or("", |i| &after_scheme[i..]);
    path.trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn section_title(url: &str) -> String {
    let segment = path_prefix(url);
    if segment.is_empty() {
        return "Home".to_string();
    }
    let spaced = segment.replace(['-', '_'], " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |c| {
        c.to_uppercase().collect::<String>() + chars.as_str()
    })
}

fn origin_of(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    format!("{}{}", &url[..scheme_end + 3], &rest[..host_end])
}

fn title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("imported scenario");
    let stem = stem.strip_prefix("raw_").unwrap_or(stem);
    let spaced = stem.replace(['-', '_'], " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |c| {
        c.to_uppercase().collect::<String>() + chars.as_str()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_SCRIPT: &str = r#"
page.goto("https://example.com/login")
page.get_by_label("Email").fill("u@e.com")
page.get_by_label("Password").fill("p@ss")
page.get_by_role("button", name="Sign in").click()
"#;

    fn import(source: &str) -> ImportResult {
        import_script(source, Path::new("raw_login.py"), &ImportOptions::default()).unwrap()
    }

    #[test]
    fn login_script_maps_to_four_named_steps() {
        let result = import(LOGIN_SCRIPT);
        let steps: Vec<&Step> = result
            .scenario
            .flat_steps()
            .map(|(_, s)| s)
            .collect();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].kind, "goto");
        assert_eq!(steps[1].kind, "fill");
        assert_eq!(steps[2].kind, "fill");
        assert_eq!(steps[3].kind, "click");

        let names: Vec<String> = steps.iter().map(|s| s.display_name()).collect();
        assert_eq!(
            names,
            vec![
                "navigate-to-example",
                "fill-email",
                "fill-password",
                "click-sign-in"
            ]
        );
    }

    #[test]
    fn password_fill_is_marked_secret_with_warning() {
        let result = import(LOGIN_SCRIPT);
        let secret_step = result
            .scenario
            .flat_steps()
            .map(|(_, s)| s)
            .find(|s| s.display_name() == "fill-password")
            .unwrap();
        assert!(secret_step.common().secret);
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.severity == ImportSeverity::Warning && d.message.contains("credential"))
        );
    }

    #[test]
    fn base_url_is_first_goto_origin() {
        let result = import(LOGIN_SCRIPT);
        assert_eq!(result.scenario.base_url, "https://example.com");
    }

    #[test]
    fn unknown_statement_becomes_passthrough_log() {
        let source = "page.goto(\"https://e.com/\")\npage.mouse.wheel(0, 100)\n";
        let result = import(source);
        let steps: Vec<&Step> = result.scenario.flat_steps().map(|(_, s)| s).collect();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].kind, "log");
        let message = steps[1]
            .payload
            .get("message")
            .and_then(serde_yaml::Value::as_str)
            .unwrap();
        assert!(message.contains("passthrough"));
        assert!(message.contains("mouse.wheel"));
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn with_expects_inserts_after_deterministic_interactions_only() {
        let source = r#"
page.goto("https://e.com/login")
page.get_by_test_id("email").fill("u@e.com")
page.locator("button.save").click()
"#;
        let opts = ImportOptions {
            with_expects: true,
            ..ImportOptions::default()
        };
        let result = import_script(source, Path::new("raw_x.py"), &opts).unwrap();
        let kinds: Vec<&str> = result
            .scenario
            .flat_steps()
            .map(|(_, s)| s.kind.as_str())
            .collect();
        // goto gets no expect; the testId fill gets one; the css click does not
        assert_eq!(kinds, vec!["goto", "fill", "expectVisible", "click"]);
    }

    #[test]
    fn url_change_creates_sections() {
        let source = r#"
page.goto("https://e.com/login")
page.get_by_label("Email").fill("u@e.com")
page.goto("https://e.com/cart/items")
page.get_by_role("button", name="Checkout").click()
"#;
        let result = import(source);
        let sections: Vec<&StepNode> = result.scenario.steps.iter().collect();
        assert_eq!(sections.len(), 2);
        match (&sections[0], &sections[1]) {
            (StepNode::Section(a), StepNode::Section(b)) => {
                assert_eq!(a.title, "Login");
                assert_eq!(b.title, "Cart");
                assert_eq!(a.steps.len(), 2);
                assert_eq!(b.steps.len(), 2);
            }
            _ => panic!("expected two sections"),
        }
    }

    #[test]
    fn sectioning_never_reorders_steps() {
        let source = r#"
page.goto("https://e.com/login")
page.get_by_label("Email").fill("a")
page.goto("https://e.com/cart")
page.get_by_label("Qty").fill("2")
"#;
        let result = import(source);
        let names: Vec<String> = result
            .scenario
            .flat_steps()
            .map(|(_, s)| s.display_name())
            .collect();
        assert_eq!(
            names,
            vec![
                "navigate-to-example",
                "fill-email",
                "navigate-to-example-2",
                "fill-qty"
            ]
        );
    }

    #[test]
    fn empty_script_is_an_error() {
        let err = import_script("# nothing\n", Path::new("raw_e.py"), &ImportOptions::default())
            .unwrap_err();
        assert!(matches!(err, crate::error::ImportError::Empty { .. }));
    }

    #[test]
    fn title_derived_from_file_name() {
        let result = import(LOGIN_SCRIPT);
        assert_eq!(result.scenario.title, "Login");
    }
}
