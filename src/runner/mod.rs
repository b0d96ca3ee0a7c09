//! Scenario runner.
//!
//! The lifecycle driver: load & validate → run directory → browser context
//! → trace → per-step loop with hooks and artifact capture → finalize per
//! policy → reports. Within one scenario execution is single-threaded
//! cooperative; the runner awaits the driver at every I/O point. Scenario-
//! level parallelism runs independent lifecycles with disjoint resources.

pub mod result;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use indexmap::IndexMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::artifacts::{ArtifactManager, EnvSnapshot, MASK, SecretVault};
use crate::driver::{BrowserContext, ConsoleMessage, Driver, LaunchOptions, Page};
use crate::error::{FlowscribeError, RunError};
use crate::scenario::lint::is_secret_hint;
use crate::scenario::schema::{
    RetentionMode, Scenario, ScreenshotMode, Step, StepCommon,
};
use crate::scenario::template::{self, EnvRef, TemplateEnv};
use crate::scenario::loader;
use crate::steps::{StepCategory, StepContext, StepRegistry};
use result::{RunStatus, ScenarioResult, StepResult, StepStatus};

/// Options for one runner invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Root directory receiving `run-*` directories
    pub artifacts_root: PathBuf,
    /// Launch the browser without a visible window
    pub headless: bool,
    /// Maximum number of scenarios running concurrently
    pub workers: usize,
    /// Values shadowing the process environment for `${env.X}`
    pub env_overlay: IndexMap<String, String>,
    /// Bound on the whole scenario lifecycle
    pub scenario_timeout: Option<Duration>,
    /// Cancellation signal observed at every suspension point
    pub cancel: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            artifacts_root: PathBuf::from("runs"),
            headless: true,
            workers: 1,
            env_overlay: IndexMap::new(),
            scenario_timeout: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// The scenario runner.
pub struct Runner {
    driver: Arc<dyn Driver>,
    registry: Arc<StepRegistry>,
}

impl Runner {
    /// Creates a runner over a driver and a handler registry.
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, registry: Arc<StepRegistry>) -> Self {
        Self { driver, registry }
    }

    /// The immutable handler registry shared by all scenarios.
    #[must_use]
    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Runs a list of scenarios, at most `opts.workers` concurrently.
    ///
    /// Each scenario owns disjoint resources; aggregate ordering follows
    /// input order.
    pub async fn run_all(
        &self,
        scenarios: &[Arc<Scenario>],
        opts: &RunOptions,
    ) -> Vec<Result<ScenarioResult, FlowscribeError>> {
        futures_util::stream::iter(scenarios.iter().cloned())
            .map(|scenario| async move { self.run_scenario(&scenario, opts).await })
            .buffered(opts.workers.max(1))
            .collect()
            .await
    }

    /// Runs one scenario through the full lifecycle.
    ///
    /// Step failures do not surface as `Err`; they produce an `Ok` result
    /// with `status: failed`. `Err` is reserved for failures outside step
    /// execution: artifact I/O, driver launch, unresolvable run-start vars.
    ///
    /// # Errors
    ///
    /// Returns an error if the run directory cannot be created, the driver
    /// fails to launch, or a scenario variable cannot be resolved.
    pub async fn run_scenario(
        &self,
        scenario: &Scenario,
        opts: &RunOptions,
    ) -> Result<ScenarioResult, FlowscribeError> {
        let started_at = Utc::now();
        let run_start = Instant::now();

        let vault = SecretVault::new();
        let artifacts = ArtifactManager::create(&opts.artifacts_root, vault.clone())?;
        artifacts.log_line(&format!("run started: {}", scenario.title))?;
        info!(title = %scenario.title, dir = %artifacts.root().display(), "scenario run started");

        // Context honors the scenario environment.
        let video_enabled = scenario.artifacts.video.mode != RetentionMode::None;
        let launch = LaunchOptions {
            headless: opts.headless,
            viewport: scenario.env.viewport,
            locale: scenario.env.locale.clone(),
            timezone: scenario.env.timezone.clone(),
            extra_headers: scenario.env.extra_headers.clone(),
            video_dir: video_enabled.then(|| artifacts.video_dir()),
        };
        let context = self.driver.launch(&launch).await?;
        if let Some(path) = &scenario.env.storage_state {
            let raw = std::fs::read_to_string(path)?;
            let state: serde_json::Value = serde_json::from_str(&raw)?;
            context.restore_storage_state(&state).await?;
        }
        let page = context.page().await?;

        let tracing_enabled = scenario.artifacts.trace.mode != RetentionMode::None;
        if tracing_enabled {
            context.start_tracing().await?;
        }

        // Variable environment, built at run start. Later vars may reference
        // earlier ones; values are not re-substituted afterwards.
        let mut env_refs: Vec<EnvRef> = Vec::new();
        let mut vars: IndexMap<String, String> = IndexMap::new();
        for (name, template_str) in &scenario.vars {
            let secret = is_secret_hint(name);
            let value = {
                let tenv = TemplateEnv::new(&vars, &opts.env_overlay);
                template::substitute(template_str, &tenv, &format!("vars.{name}"), secret, &mut env_refs)
                    .map_err(RunError::from)?
            };
            if secret {
                vault.register(&value);
            }
            vars.insert(name.clone(), value);
        }

        artifacts.write_scenario_copy(&loader::dump(scenario)?)?;

        let flat: Vec<(Option<String>, Step)> = scenario
            .flat_steps()
            .map(|(t, s)| (t.map(str::to_string), s.clone()))
            .collect();
        let scenario_deadline = opts.scenario_timeout.map(|t| Instant::now() + t);

        let mut steps_out: Vec<StepResult> = Vec::new();
        let mut console: Vec<ConsoleMessage> = Vec::new();
        let mut failed = false;

        for (index, (section, step)) in flat.iter().enumerate() {
            let common = step.common();
            let name = common.name.clone().unwrap_or_else(|| step.kind.clone());
            let ordinal = index + 1;
            let step_start = Instant::now();
            let mut screenshots: Vec<String> = Vec::new();
            let mut diagnostics: Vec<String> = Vec::new();

            // Cancellation observed before hooks: hooks do not run on
            // cancelled steps, but failure artifacts are still persisted.
            if opts.cancel.is_cancelled() {
                capture(page.as_ref(), &artifacts, scenario, ordinal, "failure", &name, &mut screenshots)
                    .await;
                steps_out.push(failed_step(
                    step, &name, index, section, step_start, &RunError::Cancelled,
                    screenshots, diagnostics, &vault,
                ));
                failed = true;
                break;
            }
            if let Some(deadline) = scenario_deadline {
                if Instant::now() >= deadline {
                    let err = RunError::ScenarioTimeout {
                        timeout: opts.scenario_timeout.unwrap_or_default(),
                    };
                    steps_out.push(failed_step(
                        step, &name, index, section, step_start, &err,
                        screenshots, diagnostics, &vault,
                    ));
                    failed = true;
                    break;
                }
            }

            // Before-hooks, in list order. A hook failure aborts the run
            // without running further hooks for this step.
            if let Err(hook_err) = self
                .run_hooks(
                    &scenario.hooks.before_each_step,
                    scenario, opts, context.as_ref(), page.as_ref(), &artifacts,
                    &mut vars, &mut env_refs, &mut console, index,
                )
                .await
            {
                warn!(step = %name, error = %hook_err, "before-hook failed; aborting run");
                capture(page.as_ref(), &artifacts, scenario, ordinal, "failure", &name, &mut screenshots)
                    .await;
                steps_out.push(failed_step(
                    step, &name, index, section, step_start, &hook_err,
                    screenshots, diagnostics, &vault,
                ));
                failed = true;
                break;
            }

            // "Before" screenshot per policy.
            if matches!(
                scenario.artifacts.screenshots.mode,
                ScreenshotMode::BeforeEachStep | ScreenshotMode::BeforeAndAfter
            ) {
                capture(page.as_ref(), &artifacts, scenario, ordinal, "before", &name, &mut screenshots)
                    .await;
            }

            let outcome = self
                .execute_step(
                    step, &common, &name, index, ordinal, scenario, opts,
                    context.as_ref(), page.as_ref(), &artifacts, scenario_deadline,
                    &mut vars, &mut env_refs, &mut console, &mut diagnostics,
                )
                .await;

            match outcome {
                Ok(()) => {
                    if scenario.artifacts.screenshots.mode == ScreenshotMode::BeforeAndAfter {
                        capture(page.as_ref(), &artifacts, scenario, ordinal, "after", &name, &mut screenshots)
                            .await;
                    }
                    if let Err(hook_err) = self
                        .run_hooks(
                            &scenario.hooks.after_each_step,
                            scenario, opts, context.as_ref(), page.as_ref(), &artifacts,
                            &mut vars, &mut env_refs, &mut console, index,
                        )
                        .await
                    {
                        warn!(step = %name, error = %hook_err, "after-hook failed; aborting run");
                        capture(page.as_ref(), &artifacts, scenario, ordinal, "failure", &name, &mut screenshots)
                            .await;
                        steps_out.push(failed_step(
                            step, &name, index, section, step_start, &hook_err,
                            screenshots, diagnostics, &vault,
                        ));
                        failed = true;
                        break;
                    }
                    let duration = duration_ms(step_start);
                    artifacts.log_line(&format!("step {ordinal:04} {name}: passed ({duration} ms)"))?;
                    steps_out.push(StepResult {
                        name: name.clone(),
                        kind: step.kind.clone(),
                        index,
                        status: StepStatus::Passed,
                        duration_ms: duration,
                        error: None,
                        selector: None,
                        screenshots,
                        section: section.clone(),
                        diagnostics,
                    });
                }
                Err(err) => {
                    capture(page.as_ref(), &artifacts, scenario, ordinal, "failure", &name, &mut screenshots)
                        .await;
                    artifacts.log_line(&format!("step {ordinal:04} {name}: FAILED: {err}"))?;
                    steps_out.push(failed_step(
                        step, &name, index, section, step_start, &err,
                        screenshots, diagnostics, &vault,
                    ));
                    failed = true;
                    break;
                }
            }
        }

        // Remaining steps never ran.
        for (index, (section, step)) in flat.iter().enumerate().skip(steps_out.len()) {
            steps_out.push(StepResult {
                name: step.common().name.unwrap_or_else(|| step.kind.clone()),
                kind: step.kind.clone(),
                index,
                status: StepStatus::Skipped,
                duration_ms: 0,
                error: None,
                selector: None,
                screenshots: Vec::new(),
                section: section.clone(),
                diagnostics: Vec::new(),
            });
        }

        // Console log.
        console.extend(page.console_messages().await);
        artifacts.write_console_log(&console)?;

        // Trace and video finalize per policy.
        if tracing_enabled {
            context.stop_tracing(&artifacts.trace_path()).await?;
        }
        if video_enabled {
            let _ = context.video_path().await;
        }
        if !failed {
            if scenario.artifacts.trace.mode == RetentionMode::OnFailure {
                artifacts.discard_trace();
            }
            if scenario.artifacts.video.mode == RetentionMode::OnFailure {
                artifacts.discard_video();
            }
        }

        // Environment snapshot, secrets masked.
        let mut env_map: IndexMap<String, String> = IndexMap::new();
        for r in &env_refs {
            let masked = r.secret || is_secret_hint(&r.name) || vault.contains_secret(&r.value);
            let value = if masked { MASK.to_string() } else { r.value.clone() };
            env_map.insert(r.name.clone(), value);
        }
        let vars_map: IndexMap<String, String> = vars
            .iter()
            .map(|(k, v)| {
                let masked = is_secret_hint(k) || vault.contains_secret(v);
                (k.clone(), if masked { MASK.to_string() } else { v.clone() })
            })
            .collect();
        artifacts.write_env_snapshot(&EnvSnapshot {
            viewport: scenario.env.viewport,
            locale: scenario.env.locale.clone(),
            timezone: scenario.env.timezone.clone(),
            extra_headers: scenario.env.extra_headers.clone(),
            vars: vars_map,
            env: env_map,
        })?;

        context.close().await?;

        let trace_kept = artifacts.trace_path().exists();
        let result = ScenarioResult {
            title: scenario.title.clone(),
            status: if failed { RunStatus::Failed } else { RunStatus::Passed },
            steps: steps_out,
            started_at,
            duration_ms: duration_ms(run_start),
            artifacts_dir: artifacts.root().to_path_buf(),
            trace: trace_kept.then(|| "trace/trace.zip".to_string()),
        };

        crate::reporter::write_all(&result, artifacts.root())?;
        artifacts.log_line(&format!(
            "run finished: {} ({} ms)",
            if result.passed() { "passed" } else { "failed" },
            result.duration_ms
        ))?;
        info!(title = %scenario.title, passed = result.passed(), "scenario run finished");
        Ok(result)
    }

    /// Substitutes and dispatches one step body, bounded by its timeout and
    /// raced against cancellation.
    #[allow(clippy::too_many_arguments)]
    async fn execute_step(
        &self,
        step: &Step,
        common: &StepCommon,
        name: &str,
        index: usize,
        ordinal: usize,
        scenario: &Scenario,
        opts: &RunOptions,
        browser: &dyn BrowserContext,
        page: &dyn Page,
        artifacts: &ArtifactManager,
        scenario_deadline: Option<Instant>,
        vars: &mut IndexMap<String, String>,
        env_refs: &mut Vec<EnvRef>,
        console: &mut Vec<ConsoleMessage>,
        diagnostics: &mut Vec<String>,
    ) -> Result<(), RunError> {
        // Lazy substitution on all string-typed fields.
        let mut payload = step.payload.clone();
        let refs_before = env_refs.len();
        {
            let tenv = TemplateEnv::new(vars, &opts.env_overlay);
            template::substitute_value(&mut payload, &tenv, name, common.secret, env_refs)?;
        }
        // Secret env references are vaulted before anything can log them.
        for r in &env_refs[refs_before..] {
            if r.secret {
                artifacts.vault().register(&r.value);
            }
        }

        let handler = self
            .registry
            .get(&step.kind)
            .ok_or_else(|| RunError::UnknownStep {
                kind: step.kind.clone(),
            })?;

        let lenient =
            handler.category() == StepCategory::Debug && common.strict == Some(false);
        let step_timeout =
            Duration::from_millis(common.timeout_ms.unwrap_or(scenario.timeout_ms));
        let effective = scenario_deadline.map_or(step_timeout, |deadline| {
            step_timeout.min(deadline.saturating_duration_since(Instant::now()))
        });
        if effective.is_zero() {
            return Err(RunError::ScenarioTimeout {
                timeout: opts.scenario_timeout.unwrap_or_default(),
            });
        }

        let mut ctx = StepContext {
            browser,
            vars,
            artifacts,
            healing: scenario.healing,
            timeout: effective,
            lenient,
            step_name: name.to_string(),
            step_index: index,
            ordinal,
            secret: common.secret,
            base_url: &scenario.base_url,
            diagnostics,
            console,
        };

        tokio::select! {
            () = opts.cancel.cancelled() => Err(RunError::Cancelled),
            outcome = tokio::time::timeout(effective, handler.execute(page, &payload, &mut ctx)) => {
                outcome.map_or(Err(RunError::StepTimeout { timeout: effective }), |r| r)
            }
        }
    }

    /// Runs a hook step list in order; the first failure aborts.
    #[allow(clippy::too_many_arguments)]
    async fn run_hooks(
        &self,
        hooks: &[Step],
        scenario: &Scenario,
        opts: &RunOptions,
        browser: &dyn BrowserContext,
        page: &dyn Page,
        artifacts: &ArtifactManager,
        vars: &mut IndexMap<String, String>,
        env_refs: &mut Vec<EnvRef>,
        console: &mut Vec<ConsoleMessage>,
        step_index: usize,
    ) -> Result<(), RunError> {
        for hook in hooks {
            let common = hook.common();
            let hook_name = common.name.clone().unwrap_or_else(|| hook.kind.clone());
            let mut diagnostics = Vec::new();
            let outcome = self
                .execute_step(
                    hook, &common, &hook_name, step_index, step_index + 1, scenario, opts,
                    browser, page, artifacts, None,
                    vars, env_refs, console, &mut diagnostics,
                )
                .await;
            if let Err(e) = outcome {
                return Err(RunError::HookFailed {
                    hook: hook_name,
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }

}

/// Captures a screenshot, appending its run-relative path; capture
/// problems are logged, not fatal.
async fn capture(
    page: &dyn Page,
    artifacts: &ArtifactManager,
    scenario: &Scenario,
    ordinal: usize,
    phase: &str,
    name: &str,
    screenshots: &mut Vec<String>,
) {
    if scenario.artifacts.screenshots.mode == ScreenshotMode::None && phase != "failure" {
        return;
    }
    let policy = &scenario.artifacts.screenshots;
    match page.screenshot(policy.format, policy.quality).await {
        Ok(bytes) => {
            match artifacts.write_screenshot(
                ordinal,
                phase,
                name,
                policy.format.extension(),
                &bytes,
            ) {
                Ok(path) => {
                    let rel = path
                        .strip_prefix(artifacts.root())
                        .map_or_else(|_| path.display().to_string(), |p| p.display().to_string());
                    screenshots.push(rel);
                }
                Err(e) => warn!(error = %e, "failed to persist screenshot"),
            }
        }
        Err(e) => warn!(error = %e, "failed to capture screenshot"),
    }
}

#[allow(clippy::too_many_arguments)]
fn failed_step(
    step: &Step,
    name: &str,
    index: usize,
    section: &Option<String>,
    step_start: Instant,
    err: &RunError,
    screenshots: Vec<String>,
    diagnostics: Vec<String>,
    vault: &SecretVault,
) -> StepResult {
    StepResult {
        name: name.to_string(),
        kind: step.kind.clone(),
        index,
        status: StepStatus::Failed,
        duration_ms: duration_ms(step_start),
        error: Some(vault.mask(&err.to_string())),
        selector: step.selector().map(|by| by.to_string()),
        screenshots,
        section: section.clone(),
        diagnostics,
    }
}

fn duration_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
