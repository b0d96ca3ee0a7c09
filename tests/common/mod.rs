//! Shared helpers for integration tests.

use std::path::Path;
use std::sync::Arc;

use flowscribe::driver::mock::{MockDom, MockDriver, MockElement};
use flowscribe::runner::{RunOptions, Runner};
use flowscribe::scenario::schema::Scenario;
use flowscribe::scenario::{loader, validation::Validator};
use flowscribe::steps::StepRegistry;

/// Parses and validates scenario YAML, panicking on any problem.
pub fn scenario_from(yaml: &str) -> Scenario {
    let scenario = loader::parse(yaml, Path::new("test-flow.yaml")).expect("scenario parses");
    let result = Validator::new().validate(&scenario, &StepRegistry::with_builtins());
    assert!(
        result.is_valid(),
        "test scenario must validate: {:?}",
        result.errors
    );
    scenario
}

/// A runner driving the given mock DOM.
pub fn runner_for(dom: &MockDom) -> Runner {
    Runner::new(
        Arc::new(MockDriver::new(dom.clone())),
        Arc::new(StepRegistry::with_builtins()),
    )
}

/// Run options writing artifacts under the given root.
pub fn run_opts(artifacts_root: &Path) -> RunOptions {
    RunOptions {
        artifacts_root: artifacts_root.to_path_buf(),
        ..RunOptions::default()
    }
}

/// A login page: email and password inputs plus a sign-in button.
pub fn login_dom() -> MockDom {
    let dom = MockDom::new();
    let mut email = MockElement::new(1);
    email.label = Some("Email".to_string());
    email.placeholder = Some("you@example.com".to_string());
    dom.add(email);

    let mut password = MockElement::new(2);
    password.label = Some("Password".to_string());
    dom.add(password);

    let mut sign_in = MockElement::new(3);
    sign_in.role = Some("button".to_string());
    sign_in.name = Some("Sign in".to_string());
    sign_in.test_id = Some("sign-in".to_string());
    sign_in.text = "Sign in".to_string();
    dom.add(sign_in);

    dom
}

/// Recursively collects every file under `dir`.
pub fn files_under(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if path.is_dir() {
            out.extend(files_under(&path));
        } else {
            out.push(path);
        }
    }
    out
}
