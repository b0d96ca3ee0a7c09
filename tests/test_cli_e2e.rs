//! End-to-end tests over the compiled binary.

use std::path::Path;
use std::process::Command;

fn flowscribe() -> Command {
    Command::new(env!("CARGO_BIN_EXE_flowscribe"))
}

fn write(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

const PASSING_FLOW: &str = r"
title: smoke
baseUrl: https://example.com
steps:
  - log: { message: 'hello', name: say-hello }
";

const FAILING_FLOW: &str = r"
title: doomed
baseUrl: https://example.com
timeoutMs: 300
steps:
  - click:
      by: { testId: missing }
      name: click-missing
";

#[test]
fn validate_exits_zero_for_valid_file() {
    let tmp = tempfile::tempdir().unwrap();
    let flow = tmp.path().join("flow.yaml");
    write(&flow, PASSING_FLOW);

    let output = flowscribe().arg("validate").arg(&flow).output().unwrap();
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ok"));
}

#[test]
fn validate_exits_one_for_invalid_file() {
    let tmp = tempfile::tempdir().unwrap();
    let flow = tmp.path().join("flow.yaml");
    write(&flow, "title: ''\nbaseUrl: not-a-url\nsteps: []\n");

    let output = flowscribe().arg("validate").arg(&flow).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn run_exit_code_tracks_scenario_status() {
    let tmp = tempfile::tempdir().unwrap();
    let passing = tmp.path().join("pass.yaml");
    write(&passing, PASSING_FLOW);
    let failing = tmp.path().join("fail.yaml");
    write(&failing, FAILING_FLOW);
    let runs = tmp.path().join("runs");

    let output = flowscribe()
        .current_dir(tmp.path())
        .arg("run")
        .arg(&passing)
        .arg("--artifacts-root")
        .arg(&runs)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let output = flowscribe()
        .current_dir(tmp.path())
        .arg("run")
        .arg(&failing)
        .arg("--artifacts-root")
        .arg(&runs)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1), "{output:?}");
}

#[test]
fn run_env_flag_feeds_substitution() {
    let tmp = tempfile::tempdir().unwrap();
    let flow = tmp.path().join("flow.yaml");
    write(
        &flow,
        r#"
title: env flow
baseUrl: https://example.com
steps:
  - log: { message: 'greeting=${env.GREETING}', name: log-greeting }
"#,
    );
    let runs = tmp.path().join("runs");

    let output = flowscribe()
        .current_dir(tmp.path())
        .arg("run")
        .arg(&flow)
        .arg("--artifacts-root")
        .arg(&runs)
        .arg("--env")
        .arg("GREETING=bonjour")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    // The substituted value reached the run log.
    let run_dir = std::fs::read_dir(&runs)
        .unwrap()
        .filter_map(Result::ok)
        .find(|e| e.file_name().to_string_lossy().starts_with("run-"))
        .expect("run dir created");
    let log = std::fs::read_to_string(run_dir.path().join("logs/runner.log")).unwrap();
    assert!(log.contains("greeting=bonjour"), "{log}");
}

#[test]
fn import_then_validate_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let script = tmp.path().join("raw_login.py");
    write(
        &script,
        r#"
page.goto("https://example.com/login")
page.get_by_label("Email").fill("u@e.com")
page.get_by_role("button", name="Sign in").click()
"#,
    );
    let flow = tmp.path().join("login.yaml");

    let output = flowscribe()
        .current_dir(tmp.path())
        .arg("import")
        .arg(&script)
        .arg("-o")
        .arg(&flow)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert!(flow.exists());

    let output = flowscribe().arg("validate").arg(&flow).output().unwrap();
    assert_eq!(output.status.code(), Some(0), "{output:?}");
}

#[test]
fn list_steps_enumerates_builtins() {
    let output = flowscribe().arg("list-steps").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in [
        "goto",
        "click",
        "fill",
        "waitForToast",
        "clickWijmoGridCell",
        "apiMock",
    ] {
        assert!(stdout.contains(name), "list-steps missing {name}");
    }
}

#[test]
fn lint_reports_findings_without_failing() {
    let tmp = tempfile::tempdir().unwrap();
    let flow = tmp.path().join("flow.yaml");
    write(
        &flow,
        r"
title: lint me
baseUrl: https://example.com
steps:
  - click:
      by: { text: Save }
      name: click-save
",
    );

    let output = flowscribe()
        .arg("lint")
        .arg(&flow)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("text-only-selector"), "{stdout}");
}

#[test]
fn init_materializes_layout() {
    let tmp = tempfile::tempdir().unwrap();
    let output = flowscribe().arg("init").arg(tmp.path()).output().unwrap();
    assert!(output.status.success());
    for dir in ["flows", "recordings", "runs"] {
        assert!(tmp.path().join(dir).is_dir(), "missing {dir}");
    }
    assert!(tmp.path().join("flowscribe.yaml").is_file());
}

#[test]
fn report_rerenders_from_existing_run() {
    let tmp = tempfile::tempdir().unwrap();
    let flow = tmp.path().join("flow.yaml");
    write(&flow, PASSING_FLOW);
    let runs = tmp.path().join("runs");

    let output = flowscribe()
        .current_dir(tmp.path())
        .arg("run")
        .arg(&flow)
        .arg("--artifacts-root")
        .arg(&runs)
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let run_dir = std::fs::read_dir(&runs)
        .unwrap()
        .filter_map(Result::ok)
        .find(|e| e.file_name().to_string_lossy().starts_with("run-"))
        .unwrap()
        .path();
    std::fs::remove_file(run_dir.join("report.html")).unwrap();

    let output = flowscribe().arg("report").arg(&run_dir).output().unwrap();
    assert!(output.status.success(), "{output:?}");
    assert!(run_dir.join("report.html").exists());
}
