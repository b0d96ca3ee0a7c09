//! Step registry and handlers.
//!
//! A handler executes one step type against a page. The registry maps step
//! type names to handlers; registration is open, so plugin handlers
//! participate in validation, linting, listing and execution exactly like
//! the built-ins registered by [`StepRegistry::with_builtins`].

pub mod assertions;
pub mod capture;
pub mod debug;
pub mod highlevel;
pub mod interaction;
pub mod navigation;
pub mod session;
pub mod waits;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::artifacts::ArtifactManager;
use crate::driver::{BrowserContext, ConsoleMessage, ElementHandle, Page};
use crate::error::RunError;
use crate::resolver::{self, ResolveOptions};
use crate::scenario::schema::{By, HealingMode};

// ============================================================================
// Step Context
// ============================================================================

/// Per-step execution context handed to handlers.
///
/// Owned by a single runner invocation; handlers reach the browser context,
/// the runtime variable environment and the artifact manager through it.
pub struct StepContext<'a> {
    /// The browser context owning the page
    pub browser: &'a dyn BrowserContext,
    /// Runtime variable environment, extended by capture steps
    pub vars: &'a mut IndexMap<String, String>,
    /// Artifact manager for the run
    pub artifacts: &'a ArtifactManager,
    /// Scenario healing mode
    pub healing: HealingMode,
    /// Effective per-step timeout
    pub timeout: Duration,
    /// Whether lenient (non-strict) resolution is permitted (debug steps
    /// that set `strict: false` only)
    pub lenient: bool,
    /// Effective step name
    pub step_name: String,
    /// Zero-based step index
    pub step_index: usize,
    /// One-based ordinal used in artifact filenames
    pub ordinal: usize,
    /// Whether values flowing through this step are secret
    pub secret: bool,
    /// Scenario base URL
    pub base_url: &'a str,
    /// Diagnostic notes attached to the step result (fallback, healing)
    pub diagnostics: &'a mut Vec<String>,
    /// Console messages drained so far in this run
    pub console: &'a mut Vec<ConsoleMessage>,
}

impl StepContext<'_> {
    /// Resolves a selector under this step's strictness and timeout,
    /// recording fallback and healing notes on the step result.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::error::ResolveError`] wrapped in [`RunError`].
    pub async fn resolve(&mut self, page: &dyn Page, by: &By) -> Result<ElementHandle, RunError> {
        let opts = ResolveOptions {
            timeout: self.timeout,
            strict: !self.lenient,
            healing: self.healing,
        };
        let mut attempts = Vec::new();
        let outcome = resolver::resolve(page, by, &opts, &mut attempts).await;
        for attempt in &attempts {
            self.diagnostics
                .push(format!("healing: {} -> {}", attempt.selector, attempt.outcome));
        }
        let resolution = outcome?;
        if let Some(winner) = &resolution.fell_back_to {
            self.diagnostics.push(format!("fell back to {winner}"));
        }
        Ok(resolution.handle)
    }

    /// Appends a masked line to the run log.
    pub fn log(&self, line: &str) {
        let _ = self.artifacts.log_line(line);
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// Rough grouping of step types, used by the linter and `list-steps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepCategory {
    /// Page navigation
    Navigation,
    /// Element interaction
    Interaction,
    /// Explicit waits
    Wait,
    /// Assertions
    Assertion,
    /// Value capture into variables
    Capture,
    /// Debugging aids
    Debug,
    /// Browser session state
    Session,
    /// Multi-step composite interactions
    HighLevel,
}

impl StepCategory {
    /// Lowercase label for listings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::Interaction => "interaction",
            Self::Wait => "wait",
            Self::Assertion => "assertion",
            Self::Capture => "capture",
            Self::Debug => "debug",
            Self::Session => "session",
            Self::HighLevel => "high-level",
        }
    }
}

/// A step handler: payload schema plus execution.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Step type name, the registry key.
    fn name(&self) -> &'static str;

    /// Handler category.
    fn category(&self) -> StepCategory;

    /// One-line payload description shown by `list-steps`.
    fn schema(&self) -> &'static str;

    /// Validates a payload against the handler's typed parameters.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the first schema mismatch.
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String>;

    /// Executes the step against the page.
    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError>;
}

/// Deserializes a payload into the handler's typed parameters.
///
/// # Errors
///
/// Returns [`RunError::InvalidPayload`] naming the step type.
pub fn parse_payload<T: DeserializeOwned>(
    kind: &str,
    payload: &serde_yaml::Value,
) -> Result<T, RunError> {
    serde_yaml::from_value(payload.clone()).map_err(|e| RunError::InvalidPayload {
        kind: kind.to_string(),
        message: e.to_string(),
    })
}

/// `check` implementation shared by the typed handlers.
///
/// # Errors
///
/// Returns the parse error text on schema mismatch.
pub fn check_payload<T: DeserializeOwned>(payload: &serde_yaml::Value) -> Result<(), String> {
    serde_yaml::from_value::<T>(payload.clone())
        .map(|_| ())
        .map_err(|e| e.to_string())
}

// ============================================================================
// Registry
// ============================================================================

/// Name-indexed catalog of step handlers.
#[derive(Default)]
pub struct StepRegistry {
    handlers: IndexMap<String, Arc<dyn StepHandler>>,
}

impl StepRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in handler registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for handler in builtin_handlers() {
            registry.register(handler);
        }
        registry
    }

    /// Registers a handler. A later registration under the same name
    /// replaces the earlier one.
    pub fn register(&mut self, handler: Arc<dyn StepHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    /// Looks up the handler for a step type.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn StepHandler>> {
        self.handlers.get(name)
    }

    /// Every registered handler in registration order.
    pub fn list(&self) -> impl Iterator<Item = &Arc<dyn StepHandler>> {
        self.handlers.values()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

fn builtin_handlers() -> Vec<Arc<dyn StepHandler>> {
    vec![
        // Navigation
        Arc::new(navigation::Goto),
        Arc::new(navigation::Back),
        Arc::new(navigation::Reload),
        // Interaction
        Arc::new(interaction::Click),
        Arc::new(interaction::DblClick),
        Arc::new(interaction::Fill),
        Arc::new(interaction::Press),
        Arc::new(interaction::Check),
        Arc::new(interaction::Uncheck),
        Arc::new(interaction::SelectOption),
        // Waits
        Arc::new(waits::WaitFor),
        Arc::new(waits::WaitForVisible),
        Arc::new(waits::WaitForHidden),
        Arc::new(waits::WaitForNetworkIdle),
        // Assertions
        Arc::new(assertions::ExpectVisible),
        Arc::new(assertions::ExpectHidden),
        Arc::new(assertions::ExpectText),
        Arc::new(assertions::ExpectUrl),
        // Capture
        Arc::new(capture::StoreText),
        Arc::new(capture::StoreAttr),
        // Debug
        Arc::new(debug::Screenshot),
        Arc::new(debug::Log),
        Arc::new(debug::DumpDom),
        // Session
        Arc::new(session::UseStorageState),
        Arc::new(session::SaveStorageState),
        // High-level
        Arc::new(highlevel::SelectOverlayOption),
        Arc::new(highlevel::SelectWijmoCombo),
        Arc::new(highlevel::ClickWijmoGridCell),
        Arc::new(highlevel::SetDatePicker),
        Arc::new(highlevel::UploadFile),
        Arc::new(highlevel::WaitForToast),
        Arc::new(highlevel::AssertNoConsoleError),
        Arc::new(highlevel::ApiMock),
        Arc::new(highlevel::RouteStub),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILTIN_NAMES: &[&str] = &[
        "goto",
        "back",
        "reload",
        "click",
        "dblclick",
        "fill",
        "press",
        "check",
        "uncheck",
        "selectOption",
        "waitFor",
        "waitForVisible",
        "waitForHidden",
        "waitForNetworkIdle",
        "expectVisible",
        "expectHidden",
        "expectText",
        "expectUrl",
        "storeText",
        "storeAttr",
        "screenshot",
        "log",
        "dumpDom",
        "useStorageState",
        "saveStorageState",
        "selectOverlayOption",
        "selectWijmoCombo",
        "clickWijmoGridCell",
        "setDatePicker",
        "uploadFile",
        "waitForToast",
        "assertNoConsoleError",
        "apiMock",
        "routeStub",
    ];

    #[test]
    fn registry_is_total_over_builtins() {
        let registry = StepRegistry::with_builtins();
        for name in BUILTIN_NAMES {
            assert!(registry.get(name).is_some(), "missing handler for '{name}'");
        }
        assert_eq!(registry.len(), BUILTIN_NAMES.len());
    }

    #[test]
    fn list_includes_plugin_handlers() {
        struct Plugin;

        #[async_trait]
        impl StepHandler for Plugin {
            fn name(&self) -> &'static str {
                "acceptCookieBanner"
            }
            fn category(&self) -> StepCategory {
                StepCategory::HighLevel
            }
            fn schema(&self) -> &'static str {
                "no parameters"
            }
            fn check(&self, _payload: &serde_yaml::Value) -> Result<(), String> {
                Ok(())
            }
            async fn execute(
                &self,
                _page: &dyn Page,
                _payload: &serde_yaml::Value,
                _ctx: &mut StepContext<'_>,
            ) -> Result<(), RunError> {
                Ok(())
            }
        }

        let mut registry = StepRegistry::with_builtins();
        registry.register(Arc::new(Plugin));
        assert!(registry.get("acceptCookieBanner").is_some());
        let names: Vec<_> = registry.list().map(|h| h.name()).collect();
        assert!(names.contains(&"acceptCookieBanner"));
        assert!(names.contains(&"click"));
    }
}
