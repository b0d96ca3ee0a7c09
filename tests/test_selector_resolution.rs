mod common;

use common::{run_opts, runner_for, scenario_from};
use flowscribe::driver::mock::{MockDom, MockElement};
use flowscribe::runner::result::StepStatus;

fn save_button_css_only() -> MockDom {
    let dom = MockDom::new();
    let mut save = MockElement::new(7);
    save.css = vec!["button.save".to_string()];
    save.text = "Save".to_string();
    dom.add(save);
    dom
}

#[tokio::test(flavor = "multi_thread")]
async fn any_fallback_is_noted_in_step_diagnostics() {
    let tmp = tempfile::tempdir().unwrap();
    let dom = save_button_css_only();
    let runner = runner_for(&dom);
    let scenario = scenario_from(
        r"
title: fallback
baseUrl: https://example.com
timeoutMs: 900
steps:
  - click:
      name: click-save
      by:
        any:
          - { testId: save }
          - { role: button, name: Save }
          - { css: button.save }
",
    );

    let result = runner
        .run_scenario(&scenario, &run_opts(tmp.path()))
        .await
        .unwrap();

    assert!(result.passed());
    assert_eq!(dom.recorded().clicks, vec![7]);
    let diagnostics = &result.steps[0].diagnostics;
    assert!(
        diagnostics
            .iter()
            .any(|d| d.contains("fell back to") && d.contains("button.save")),
        "diagnostics note the fallback: {diagnostics:?}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn strict_violation_fails_and_is_not_healed() {
    let tmp = tempfile::tempdir().unwrap();
    let dom = MockDom::new();
    for id in [1, 2] {
        let mut button = MockElement::new(id);
        button.role = Some("button".to_string());
        button.name = Some("Save".to_string());
        button.text = "Save".to_string();
        dom.add(button);
    }
    let runner = runner_for(&dom);

    // healing: safe must not change the outcome; strictness is never healed.
    let scenario = scenario_from(
        r"
title: ambiguous
baseUrl: https://example.com
healing: safe
steps:
  - click:
      name: click-save
      by: { role: button, name: Save }
",
    );

    let started = std::time::Instant::now();
    let result = runner
        .run_scenario(&scenario, &run_opts(tmp.path()))
        .await
        .unwrap();

    assert!(!result.passed());
    assert_eq!(result.steps[0].status, StepStatus::Failed);
    let error = result.steps[0].error.as_deref().unwrap();
    assert!(error.contains("2 elements"), "ambiguity is reported: {error}");
    assert!(
        result.steps[0].diagnostics.iter().all(|d| !d.contains("healing")),
        "no healing attempts on ambiguity"
    );
    // Immediate: well under the 10s default step timeout.
    assert!(started.elapsed() < std::time::Duration::from_secs(3));
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_any_reports_every_candidate() {
    let tmp = tempfile::tempdir().unwrap();
    let dom = MockDom::new();
    let runner = runner_for(&dom);
    let scenario = scenario_from(
        r"
title: exhausted
baseUrl: https://example.com
timeoutMs: 400
steps:
  - click:
      name: click-save
      by:
        any:
          - { testId: save }
          - { css: button.save }
",
    );

    let result = runner
        .run_scenario(&scenario, &run_opts(tmp.path()))
        .await
        .unwrap();

    assert!(!result.passed());
    let error = result.steps[0].error.as_deref().unwrap();
    assert!(error.contains("all 2 candidates failed"), "{error}");
    let first = error.find("testId=save").unwrap();
    let second = error.find("button.save").unwrap();
    assert!(first < second, "reasons keep declaration order: {error}");
}

#[tokio::test(flavor = "multi_thread")]
async fn healing_recovers_a_renamed_selector_and_is_recorded() {
    let tmp = tempfile::tempdir().unwrap();
    let dom = MockDom::new();
    let mut button = MockElement::new(4);
    button.test_id = Some("sign-in".to_string());
    button.text = "Sign in".to_string();
    dom.add(button);
    let runner = runner_for(&dom);

    let scenario = scenario_from(
        r"
title: healed
baseUrl: https://example.com
healing: safe
timeoutMs: 600
steps:
  - click:
      name: click-sign-in
      by: { role: button, name: Sign in }
",
    );

    let result = runner
        .run_scenario(&scenario, &run_opts(tmp.path()))
        .await
        .unwrap();

    assert!(result.passed(), "healing found the target: {:?}", result.steps[0]);
    assert_eq!(dom.recorded().clicks, vec![4]);
    assert!(
        result.steps[0]
            .diagnostics
            .iter()
            .any(|d| d.starts_with("healing:")),
        "healing attempts are attached: {:?}",
        result.steps[0].diagnostics
    );
}
