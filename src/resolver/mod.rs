//! Selector resolution.
//!
//! Maps a declarative [`By`] expression onto a live element handle.
//! Resolution enforces the strictness invariant (exactly one visible
//! match), walks `any` fallback lists in declaration order, and, when the
//! scenario opts into `safe` healing, retries a `NoMatch` single selector
//! with a fixed widening schedule. Strictness violations are never healed.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::driver::{ElementHandle, Locator, Page};
use crate::error::{CandidateFailure, ResolveError};
use crate::scenario::schema::{By, HealingMode};

/// Poll interval for visibility/match probes.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Floor for the per-candidate slice of an `any` timeout.
const MIN_CANDIDATE_BUDGET: Duration = Duration::from_millis(100);

/// Similarity threshold for accessible-name healing.
const NAME_SIMILARITY_FLOOR: f64 = 0.9;

/// Options supplied by the runner for one resolution.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Overall time budget
    pub timeout: Duration,
    /// Require exactly one match (`false` only for debug steps)
    pub strict: bool,
    /// Scenario healing mode
    pub healing: HealingMode,
}

/// One attempted healing variant and what happened.
#[derive(Debug, Clone)]
pub struct HealingAttempt {
    /// Pretty-printed widened selector
    pub selector: String,
    /// Outcome description ("matched", "no match", "ambiguous (3)", …)
    pub outcome: String,
}

/// A successful resolution.
#[derive(Debug)]
pub struct Resolution {
    /// The resolved element
    pub handle: ElementHandle,
    /// Pretty-printed candidate that won, when an `any` fallback advanced
    /// past its first candidate
    pub fell_back_to: Option<String>,
}

/// Maps a single (non-`any`) selector onto its primitive driver locator.
///
/// The mapping is fixed and total over the six single variants.
#[must_use]
pub fn primitive(by: &By) -> Option<Locator> {
    match by {
        By::TestId(v) => Some(Locator::TestId(v.clone())),
        By::Role { role, name } => Some(Locator::Role {
            role: role.clone(),
            name: name.clone(),
        }),
        By::Label(v) => Some(Locator::Label(v.clone())),
        By::Placeholder(v) => Some(Locator::Placeholder(v.clone())),
        By::Css { css, text } => Some(Locator::Css {
            css: css.clone(),
            text: text.clone(),
        }),
        By::Text(v) => Some(Locator::Text(v.clone())),
        By::Any(_) => None,
    }
}

/// Resolves a selector to exactly one visible element handle.
///
/// Healing attempts made along the way, successful or not, are appended
/// to `attempts` so the runner can attach them to the step diagnostics.
///
/// # Errors
///
/// - [`ResolveError::Ambiguous`] immediately when a strict probe sees more
///   than one match.
/// - [`ResolveError::NoMatch`] / [`ResolveError::Timeout`] when the budget
///   elapses without a visible singular match.
/// - [`ResolveError::AllCandidatesFailed`] when every `any` candidate
///   fails; the error carries every (candidate, reason) pair in order.
pub async fn resolve(
    page: &dyn Page,
    by: &By,
    opts: &ResolveOptions,
    attempts: &mut Vec<HealingAttempt>,
) -> Result<Resolution, ResolveError> {
    match by {
        By::Any(candidates) => resolve_any(page, candidates, opts).await,
        single => resolve_with_healing(page, single, opts, attempts).await,
    }
}

async fn resolve_with_healing(
    page: &dyn Page,
    by: &By,
    opts: &ResolveOptions,
    attempts: &mut Vec<HealingAttempt>,
) -> Result<Resolution, ResolveError> {
    let Some(locator) = primitive(by) else {
        return Err(ResolveError::NoMatch {
            selector: by.to_string(),
        });
    };
    // The timeout covers the whole schedule: under safe healing the
    // primary selector gets half the budget so the widening attempts
    // still fit inside the step timeout.
    let deadline = Instant::now() + opts.timeout;
    let primary_budget = if opts.healing == HealingMode::Safe {
        opts.timeout / 2
    } else {
        opts.timeout
    };
    match resolve_single(page, &locator, &by.to_string(), primary_budget, opts.strict).await {
        Ok(handle) => Ok(Resolution {
            handle,
            fell_back_to: None,
        }),
        // Only NoMatch is healed; Ambiguous and Timeout surface as-is.
        Err(err @ ResolveError::NoMatch { .. }) if opts.healing == HealingMode::Safe => {
            match heal(page, by, deadline, attempts).await {
                Some(handle) => Ok(Resolution {
                    handle,
                    fell_back_to: None,
                }),
                None => {
                    debug!(selector = %by, "healing exhausted");
                    Err(err)
                }
            }
        }
        Err(err) => Err(err),
    }
}

/// Fixed widening schedule for `safe` healing:
/// 1. drop non-identifying filters (css text, role name)
/// 2. search by accessible name derived from the original selector
/// 3. search by testId / label inferred from the target's semantics
async fn heal(
    page: &dyn Page,
    by: &By,
    deadline: Instant,
    attempts: &mut Vec<HealingAttempt>,
) -> Option<ElementHandle> {
    let mut schedule: Vec<By> = Vec::new();
    match by {
        By::Css { css, text: Some(_) } => schedule.push(By::Css {
            css: css.clone(),
            text: None,
        }),
        By::Role { role, name: Some(_) } => schedule.push(By::Role {
            role: role.clone(),
            name: None,
        }),
        _ => {}
    }
    if let Some(hint) = by.human_hint() {
        schedule.push(By::Text(hint.to_string()));
        schedule.push(By::TestId(slug(hint)));
        schedule.push(By::Label(hint.to_string()));
    }

    for widened in schedule {
        if widened == *by {
            continue;
        }
        let Some(locator) = primitive(&widened) else {
            continue;
        };
        let pretty = widened.to_string();
        match probe_once(page, &locator).await {
            Ok(ProbeOutcome::One(handle)) => {
                attempts.push(HealingAttempt {
                    selector: pretty,
                    outcome: "matched".to_string(),
                });
                return Some(handle);
            }
            Ok(ProbeOutcome::Many(handles)) => {
                // A widened name search may legitimately hit several nodes;
                // accept an unambiguous best by name similarity.
                if let Some(hint) = by.human_hint() {
                    if let Some(best) = best_by_similarity(page, &handles, hint).await {
                        attempts.push(HealingAttempt {
                            selector: pretty,
                            outcome: format!(
                                "matched best of {} by name similarity",
                                handles.len()
                            ),
                        });
                        return Some(best);
                    }
                }
                attempts.push(HealingAttempt {
                    selector: pretty,
                    outcome: format!("ambiguous ({})", handles.len()),
                });
            }
            Ok(ProbeOutcome::None) => {
                // Give slow-rendering targets a bounded wait, half of
                // whatever budget remains so later attempts still run.
                let remaining = deadline.saturating_duration_since(Instant::now());
                let wait = (remaining / 2).min(Duration::from_millis(500));
                if wait >= POLL_INTERVAL {
                    if let Ok(handle) = resolve_single(page, &locator, &pretty, wait, true).await {
                        attempts.push(HealingAttempt {
                            selector: pretty,
                            outcome: "matched".to_string(),
                        });
                        return Some(handle);
                    }
                }
                attempts.push(HealingAttempt {
                    selector: pretty,
                    outcome: "no match".to_string(),
                });
            }
            Err(e) => attempts.push(HealingAttempt {
                selector: pretty,
                outcome: format!("driver error: {e}"),
            }),
        }
    }
    None
}

enum ProbeOutcome {
    None,
    One(ElementHandle),
    Many(Vec<ElementHandle>),
}

async fn probe_once(
    page: &dyn Page,
    locator: &Locator,
) -> Result<ProbeOutcome, crate::error::DriverError> {
    let mut visible = Vec::new();
    for handle in page.locate(locator).await? {
        if page.is_visible(handle).await? {
            visible.push(handle);
        }
    }
    Ok(match visible.len() {
        0 => ProbeOutcome::None,
        1 => ProbeOutcome::One(visible[0]),
        _ => ProbeOutcome::Many(visible),
    })
}

async fn best_by_similarity(
    page: &dyn Page,
    handles: &[ElementHandle],
    hint: &str,
) -> Option<ElementHandle> {
    let mut scored = Vec::new();
    for &handle in handles {
        let text = page.text_content(handle).await.ok()?;
        scored.push((strsim::jaro_winkler(&text, hint), handle));
    }
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    match scored.as_slice() {
        [(best, handle), rest @ ..]
            if *best >= NAME_SIMILARITY_FLOOR
                && rest.first().is_none_or(|(second, _)| second < best) =>
        {
            Some(*handle)
        }
        _ => None,
    }
}

/// Kebab-case slug of a human-identifying string, used to infer test ids.
#[must_use]
pub fn slug(input: &str) -> String {
    let mut out = String::new();
    let mut dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

async fn resolve_any(
    page: &dyn Page,
    candidates: &[By],
    opts: &ResolveOptions,
) -> Result<Resolution, ResolveError> {
    let slices = u32::try_from(candidates.len().max(1)).unwrap_or(u32::MAX);
    let budget = (opts.timeout / slices).max(MIN_CANDIDATE_BUDGET);
    let mut failures = Vec::new();

    for (index, candidate) in candidates.iter().enumerate() {
        let Some(locator) = primitive(candidate) else {
            // Validation rejects nested `any`; treat defensively as no match.
            failures.push((candidate.to_string(), CandidateFailure::NoMatch));
            continue;
        };
        let pretty = candidate.to_string();
        match resolve_single(page, &locator, &pretty, budget, true).await {
            Ok(handle) => {
                if index > 0 {
                    debug!(candidate = %pretty, index, "any fallback advanced");
                }
                return Ok(Resolution {
                    handle,
                    fell_back_to: (index > 0).then_some(pretty),
                });
            }
            Err(e) => failures.push((pretty, classify(&e))),
        }
    }

    Err(ResolveError::AllCandidatesFailed { failures })
}

const fn classify(err: &ResolveError) -> CandidateFailure {
    match err {
        ResolveError::NoMatch { .. } => CandidateFailure::NoMatch,
        ResolveError::Ambiguous { .. } => CandidateFailure::MultipleMatches,
        ResolveError::Timeout { .. } => CandidateFailure::NotVisible,
        ResolveError::AllCandidatesFailed { .. } => CandidateFailure::Timeout,
    }
}

/// Core polling loop for one primitive locator.
///
/// Ambiguity under strict mode fails on the first probe that observes it;
/// zero matches and invisible matches are re-probed until the deadline.
async fn resolve_single(
    page: &dyn Page,
    locator: &Locator,
    pretty: &str,
    timeout: Duration,
    strict: bool,
) -> Result<ElementHandle, ResolveError> {
    let deadline = Instant::now() + timeout;
    let mut saw_match = false;

    loop {
        let matches = page
            .locate(locator)
            .await
            .map_err(|_| ResolveError::NoMatch {
                selector: pretty.to_string(),
            })?;

        if matches.len() > 1 && strict {
            return Err(ResolveError::Ambiguous {
                selector: pretty.to_string(),
                count: matches.len(),
            });
        }

        if !matches.is_empty() {
            saw_match = true;
            for handle in &matches {
                let visible = page.is_visible(*handle).await.unwrap_or(false);
                if visible {
                    return Ok(*handle);
                }
            }
        }

        if Instant::now() >= deadline {
            return Err(if saw_match {
                ResolveError::Timeout {
                    selector: pretty.to_string(),
                    timeout,
                }
            } else {
                ResolveError::NoMatch {
                    selector: pretty.to_string(),
                }
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{MockDom, MockDriver, MockElement};
    use crate::driver::{Driver, LaunchOptions};

    async fn page_for(dom: &MockDom) -> Box<dyn Page> {
        let driver = MockDriver::new(dom.clone());
        let ctx = driver.launch(&LaunchOptions::default()).await.unwrap();
        ctx.page().await.unwrap()
    }

    fn opts(ms: u64) -> ResolveOptions {
        ResolveOptions {
            timeout: Duration::from_millis(ms),
            strict: true,
            healing: HealingMode::Off,
        }
    }

    fn button(id: u64, name: &str) -> MockElement {
        let mut e = MockElement::new(id);
        e.role = Some("button".to_string());
        e.name = Some(name.to_string());
        e.text = name.to_string();
        e
    }

    #[tokio::test]
    async fn single_selector_resolves() {
        let dom = MockDom::new();
        dom.add(button(1, "Save"));
        let page = page_for(&dom).await;

        let by = By::Role {
            role: "button".to_string(),
            name: Some("Save".to_string()),
        };
        let mut attempts = Vec::new();
        let res = resolve(page.as_ref(), &by, &opts(200), &mut attempts)
            .await
            .unwrap();
        assert_eq!(res.handle, ElementHandle(1));
        assert!(res.fell_back_to.is_none());
        assert!(attempts.is_empty());
    }

    #[tokio::test]
    async fn ambiguous_fails_immediately_and_is_not_healed() {
        let dom = MockDom::new();
        dom.add(button(1, "Save"));
        dom.add(button(2, "Save"));
        let page = page_for(&dom).await;

        let by = By::Role {
            role: "button".to_string(),
            name: Some("Save".to_string()),
        };
        let mut attempts = Vec::new();
        let started = std::time::Instant::now();
        let err = resolve(page.as_ref(), &by, &opts(5_000), &mut attempts)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Ambiguous { count: 2, .. }));
        assert!(started.elapsed() < Duration::from_millis(1_000));

        // Same outcome under safe healing: strictness is never healed.
        let healing_opts = ResolveOptions {
            healing: HealingMode::Safe,
            ..opts(5_000)
        };
        let err = resolve(page.as_ref(), &by, &healing_opts, &mut attempts)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Ambiguous { count: 2, .. }));
        assert!(attempts.is_empty(), "no healing attempted on ambiguity");
    }

    #[tokio::test]
    async fn any_returns_first_satisfier_without_probing_later() {
        let dom = MockDom::new();
        let mut save = button(1, "Save");
        save.test_id = Some("save".to_string());
        save.css = vec!["button.save".to_string()];
        dom.add(save);
        let page = page_for(&dom).await;

        let by = By::Any(vec![
            By::TestId("save".to_string()),
            By::Role {
                role: "button".to_string(),
                name: Some("Save".to_string()),
            },
            By::Css {
                css: "button.save".to_string(),
                text: None,
            },
        ]);
        let mut attempts = Vec::new();
        let res = resolve(page.as_ref(), &by, &opts(600), &mut attempts)
            .await
            .unwrap();
        assert_eq!(res.handle, ElementHandle(1));
        assert!(res.fell_back_to.is_none(), "first candidate satisfied");
    }

    #[tokio::test]
    async fn any_falls_back_in_order() {
        let dom = MockDom::new();
        let mut save = MockElement::new(3);
        save.css = vec!["button.save".to_string()];
        save.text = "Save".to_string();
        dom.add(save);
        let page = page_for(&dom).await;

        let by = By::Any(vec![
            By::TestId("save".to_string()),
            By::Role {
                role: "button".to_string(),
                name: Some("Save".to_string()),
            },
            By::Css {
                css: "button.save".to_string(),
                text: None,
            },
        ]);
        let mut attempts = Vec::new();
        let res = resolve(page.as_ref(), &by, &opts(600), &mut attempts)
            .await
            .unwrap();
        assert_eq!(res.handle, ElementHandle(3));
        let fell = res.fell_back_to.unwrap();
        assert!(
            fell.contains("button.save"),
            "diagnostic names the winner: {fell}"
        );
    }

    #[tokio::test]
    async fn any_exhaustion_carries_all_reasons_in_order() {
        let dom = MockDom::new();
        dom.add(button(1, "Save"));
        dom.add(button(2, "Save"));
        let page = page_for(&dom).await;

        let by = By::Any(vec![
            By::TestId("missing".to_string()),
            By::Role {
                role: "button".to_string(),
                name: Some("Save".to_string()),
            },
        ]);
        let mut attempts = Vec::new();
        let err = resolve(page.as_ref(), &by, &opts(300), &mut attempts)
            .await
            .unwrap_err();
        let ResolveError::AllCandidatesFailed { failures } = err else {
            panic!("expected exhaustion");
        };
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].1, CandidateFailure::NoMatch);
        assert_eq!(failures[1].1, CandidateFailure::MultipleMatches);
        assert!(failures[0].0.contains("missing"));
    }

    #[tokio::test]
    async fn healing_widens_to_test_id_slug() {
        let dom = MockDom::new();
        let mut e = MockElement::new(9);
        e.test_id = Some("sign-in".to_string());
        e.text = "Sign in".to_string();
        dom.add(e);
        let page = page_for(&dom).await;

        // The recorded role selector no longer matches; healing lands on the
        // testId derived from the accessible name. The text-search attempt
        // also matches here, which is fine; the schedule stops at the first
        // satisfier and records every attempt made.
        let by = By::Role {
            role: "button".to_string(),
            name: Some("Sign in".to_string()),
        };
        let healing_opts = ResolveOptions {
            healing: HealingMode::Safe,
            ..opts(400)
        };
        let mut attempts = Vec::new();
        let res = resolve(page.as_ref(), &by, &healing_opts, &mut attempts)
            .await
            .unwrap();
        assert_eq!(res.handle, ElementHandle(9));
        assert!(!attempts.is_empty());
        assert!(attempts.iter().any(|a| a.outcome.starts_with("matched")));
    }

    #[tokio::test]
    async fn healing_off_fails_immediately() {
        let dom = MockDom::new();
        let page = page_for(&dom).await;
        let by = By::TestId("missing".to_string());
        let mut attempts = Vec::new();
        let err = resolve(page.as_ref(), &by, &opts(150), &mut attempts)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoMatch { .. }));
        assert!(attempts.is_empty());
    }

    #[tokio::test]
    async fn waits_for_delayed_visibility() {
        let dom = MockDom::new();
        let mut e = MockElement::new(4);
        e.test_id = Some("toast".to_string());
        e.visible = false;
        e.visible_after = Some(Duration::from_millis(120));
        dom.add(e);
        let page = page_for(&dom).await;

        let by = By::TestId("toast".to_string());
        let mut attempts = Vec::new();
        let res = resolve(page.as_ref(), &by, &opts(1_000), &mut attempts)
            .await
            .unwrap();
        assert_eq!(res.handle, ElementHandle(4));
    }

    #[test]
    fn primitive_mapping_is_total_over_singles() {
        let singles = [
            By::TestId("a".to_string()),
            By::Role {
                role: "button".to_string(),
                name: None,
            },
            By::Label("a".to_string()),
            By::Placeholder("a".to_string()),
            By::Css {
                css: "a".to_string(),
                text: None,
            },
            By::Text("a".to_string()),
        ];
        for by in singles {
            assert!(primitive(&by).is_some(), "no primitive for {by}");
        }
        assert!(primitive(&By::Any(vec![])).is_none());
    }

    #[test]
    fn slug_is_kebab() {
        assert_eq!(slug("Sign in"), "sign-in");
        assert_eq!(slug("  Save & Close  "), "save-close");
    }
}
