//! Action-to-step mapping.
//!
//! Maps each [`RawAction`] onto a scenario step. The mapping is total on
//! recognized forms; anything else is handed back so the importer can emit
//! a passthrough comment instead of aborting.

use crate::scenario::schema::{By, Step, StepCommon};
use crate::steps::assertions::{ExpectByParams, ExpectTextParams, ExpectUrlParams};
use crate::steps::interaction::{ByParams, PressParams, ValueParams};
use crate::steps::navigation::GotoParams;

use super::scanner::{CallLink, RawAction};

/// A mapped step plus the selector it targets (used downstream for
/// naming, secret detection and `--with-expects`).
#[derive(Debug, Clone)]
pub struct MappedStep {
    /// The emitted step (name not yet assigned)
    pub step: Step,
    /// Selector the step targets, if any
    pub by: Option<By>,
    /// Navigation target, for `goto` steps
    pub url: Option<String>,
    /// Source line of the originating action
    pub line: usize,
}

/// Why an action could not be mapped.
#[derive(Debug, Clone)]
pub enum MapFailure {
    /// The locator chain uses an unrecognized method or shape
    UnknownLocator(String),
    /// The terminal method is not in the recognized vocabulary
    UnknownMethod(String),
    /// A required argument is missing or has the wrong type
    BadArguments(String),
}

impl std::fmt::Display for MapFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLocator(m) => write!(f, "unrecognized locator '{m}'"),
            Self::UnknownMethod(m) => write!(f, "unrecognized call '{m}'"),
            Self::BadArguments(m) => write!(f, "bad arguments: {m}"),
        }
    }
}

/// Normalizes a raw locator string: strips a redundant `css=` prefix,
/// trims, and collapses whitespace runs. Idempotent.
#[must_use]
pub fn normalize_locator(input: &str) -> String {
    let trimmed = input.trim();
    let stripped = trimmed.strip_prefix("css=").unwrap_or(trimmed);
    let mut out = String::with_capacity(stripped.len());
    let mut in_space = false;
    for c in stripped.chars() {
        if c.is_whitespace() {
            if !in_space && !out.is_empty() {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out.trim_end().to_string()
}

/// Derives a [`By`] from a locator chain.
///
/// # Errors
///
/// Returns the offending method name when the chain deviates from the
/// recognized vocabulary.
pub fn by_from_chain(chain: &[CallLink]) -> Result<By, MapFailure> {
    let Some(head) = chain.first() else {
        return Err(MapFailure::UnknownLocator("<empty chain>".to_string()));
    };
    let mut by = match head.method.as_str() {
        "get_by_test_id" => By::TestId(required_str(head)?),
        "get_by_role" => By::Role {
            role: required_str(head)?,
            name: head.kwarg_str("name").map(ToString::to_string),
        },
        "get_by_label" => By::Label(required_str(head)?),
        "get_by_placeholder" => By::Placeholder(required_str(head)?),
        "get_by_text" => By::Text(required_str(head)?),
        "locator" => By::Css {
            css: normalize_locator(&required_str(head)?),
            text: None,
        },
        other => return Err(MapFailure::UnknownLocator(other.to_string())),
    };

    for link in &chain[1..] {
        match (link.method.as_str(), &mut by) {
            ("filter", By::Css { text, .. }) => {
                let Some(has_text) = link.kwarg_str("has_text") else {
                    return Err(MapFailure::UnknownLocator("filter without has_text".to_string()));
                };
                *text = Some(has_text.to_string());
            }
            (other, _) => return Err(MapFailure::UnknownLocator(other.to_string())),
        }
    }
    Ok(by)
}

fn required_str(link: &CallLink) -> Result<String, MapFailure> {
    link.first_str()
        .map(ToString::to_string)
        .ok_or_else(|| MapFailure::BadArguments(format!("{} needs a string argument", link.method)))
}

/// Maps one action to a step.
///
/// `last_by` is the selector of the most recent targeted interaction; a
/// bare `page.press(key)` targets it, mirroring how the recorder emits a
/// key press on the previously focused locator.
///
/// # Errors
///
/// Returns a [`MapFailure`] describing why the action is unmappable; the
/// caller demotes this to a warning plus a passthrough comment.
pub fn map_action(action: &RawAction, last_by: Option<&By>) -> Result<MappedStep, MapFailure> {
    let common = StepCommon::default();
    let line = action.line;

    let mapped = match action.kind.as_str() {
        "goto" => {
            let url = first_str(action)?;
            let step = step("goto", &GotoParams {
                url: url.clone(),
                common,
            })?;
            MappedStep {
                step,
                by: None,
                url: Some(url),
                line,
            }
        }
        "click" | "dblclick" | "check" | "uncheck" => {
            let by = by_from_chain(&action.chain)?;
            let step = step(&action.kind, &ByParams {
                by: by.clone(),
                common,
            })?;
            MappedStep {
                step,
                by: Some(by),
                url: None,
                line,
            }
        }
        "fill" => {
            let by = by_from_chain(&action.chain)?;
            let step = step("fill", &ValueParams {
                by: by.clone(),
                value: first_str(action)?,
                common,
            })?;
            MappedStep {
                step,
                by: Some(by),
                url: None,
                line,
            }
        }
        "select_option" => {
            let by = by_from_chain(&action.chain)?;
            let step = step("selectOption", &ValueParams {
                by: by.clone(),
                value: first_str(action)?,
                common,
            })?;
            MappedStep {
                step,
                by: Some(by),
                url: None,
                line,
            }
        }
        "press" => {
            let by = if action.chain.is_empty() {
                last_by
                    .cloned()
                    .ok_or_else(|| MapFailure::BadArguments("press with no prior target".to_string()))?
            } else {
                by_from_chain(&action.chain)?
            };
            let step = step("press", &PressParams {
                by: by.clone(),
                key: first_str(action)?,
                common,
            })?;
            MappedStep {
                step,
                by: Some(by),
                url: None,
                line,
            }
        }
        "to_be_visible" => {
            let by = by_from_chain(&action.chain)?;
            let step = step("expectVisible", &ExpectByParams {
                by: by.clone(),
                common,
            })?;
            MappedStep {
                step,
                by: Some(by),
                url: None,
                line,
            }
        }
        "to_be_hidden" => {
            let by = by_from_chain(&action.chain)?;
            let step = step("expectHidden", &ExpectByParams {
                by: by.clone(),
                common,
            })?;
            MappedStep {
                step,
                by: Some(by),
                url: None,
                line,
            }
        }
        "to_have_text" => {
            let by = by_from_chain(&action.chain)?;
            let step = step("expectText", &ExpectTextParams {
                by: by.clone(),
                text: first_str(action)?,
                exact: false,
                common,
            })?;
            MappedStep {
                step,
                by: Some(by),
                url: None,
                line,
            }
        }
        "to_have_url" => {
            let url = first_str(action)?;
            let step = step("expectUrl", &ExpectUrlParams {
                url: url.clone(),
                common,
            })?;
            MappedStep {
                step,
                by: None,
                url: Some(url),
                line,
            }
        }
        other => return Err(MapFailure::UnknownMethod(other.to_string())),
    };
    Ok(mapped)
}

fn first_str(action: &RawAction) -> Result<String, MapFailure> {
    action
        .args
        .first()
        .and_then(super::scanner::Arg::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| MapFailure::BadArguments(format!("{} needs a string argument", action.kind)))
}

fn step<T: serde::Serialize>(kind: &str, payload: &T) -> Result<Step, MapFailure> {
    Step::from_payload(kind, payload).map_err(|e| MapFailure::BadArguments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::scanner::{ScanItem, scan};

    fn action_of(line: &str) -> RawAction {
        match scan(line).remove(0) {
            ScanItem::Action(a) => a,
            ScanItem::Unknown { text, .. } => panic!("unexpectedly unknown: {text}"),
        }
    }

    #[test]
    fn normalize_strips_css_prefix_and_collapses_whitespace() {
        assert_eq!(normalize_locator("css=button.save"), "button.save");
        assert_eq!(normalize_locator("  div  >  span\t "), "div > span");
    }

    #[test]
    fn normalize_is_idempotent() {
        for input in ["css=button.save", "  a   b ", "ul > li.item"] {
            let once = normalize_locator(input);
            assert_eq!(normalize_locator(&once), once);
        }
    }

    #[test]
    fn maps_role_click() {
        let action = action_of("page.get_by_role(\"button\", name=\"Sign in\").click()");
        let mapped = map_action(&action, None).unwrap();
        assert_eq!(mapped.step.kind, "click");
        assert_eq!(
            mapped.by,
            Some(By::Role {
                role: "button".to_string(),
                name: Some("Sign in".to_string()),
            })
        );
    }

    #[test]
    fn maps_locator_fill_with_normalization() {
        let action = action_of("page.locator(\"css=#email \").fill(\"u@e.com\")");
        let mapped = map_action(&action, None).unwrap();
        assert_eq!(mapped.step.kind, "fill");
        assert_eq!(
            mapped.by,
            Some(By::Css {
                css: "#email".to_string(),
                text: None,
            })
        );
    }

    #[test]
    fn maps_filter_has_text() {
        let action = action_of("page.locator(\"li.item\").filter(has_text=\"Apples\").click()");
        let mapped = map_action(&action, None).unwrap();
        assert_eq!(
            mapped.by,
            Some(By::Css {
                css: "li.item".to_string(),
                text: Some("Apples".to_string()),
            })
        );
    }

    #[test]
    fn bare_press_targets_previous_locator() {
        let previous = By::Label("Email".to_string());
        let action = action_of("page.press(\"Enter\")");
        let mapped = map_action(&action, Some(&previous)).unwrap();
        assert_eq!(mapped.step.kind, "press");
        assert_eq!(mapped.by, Some(previous));
    }

    #[test]
    fn maps_page_url_assertion() {
        let action = action_of("expect(page).to_have_url(\"https://example.com/home\")");
        let mapped = map_action(&action, None).unwrap();
        assert_eq!(mapped.step.kind, "expectUrl");
        assert_eq!(mapped.url.as_deref(), Some("https://example.com/home"));
    }

    #[test]
    fn unknown_terminal_method_is_reported() {
        let action = action_of("page.get_by_text(\"hi\").hover()");
        let err = map_action(&action, None).unwrap_err();
        assert!(matches!(err, MapFailure::UnknownMethod(m) if m == "hover"));
    }

    #[test]
    fn unknown_locator_is_reported() {
        let action = action_of("page.frame_locator(\"#f\").click()");
        let err = map_action(&action, None).unwrap_err();
        assert!(matches!(err, MapFailure::UnknownLocator(_)));
    }
}
