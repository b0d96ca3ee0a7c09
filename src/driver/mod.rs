//! Browser driver capability.
//!
//! The actual browser (process launch, navigation, DOM evaluation, tracing)
//! is an external collaborator consumed through the object-safe traits in
//! this module. The replay engine never talks to a browser directly; it
//! drives a [`Driver`] implementation. The in-memory [`mock`] driver ships
//! with the crate for tests and dry runs; real integrations plug in by
//! implementing these traits.

pub mod mock;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::DriverError;
use crate::scenario::schema::{ImageFormat, Viewport};

// ============================================================================
// Locators
// ============================================================================

/// A primitive locator understood by the driver.
///
/// Each non-`any` [`By`](crate::scenario::schema::By) variant maps
/// one-to-one onto exactly one of these; the mapping is fixed and total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Stable test-id attribute
    TestId(String),
    /// Accessibility role with optional accessible-name filter
    Role {
        /// ARIA role
        role: String,
        /// Accessible name filter
        name: Option<String>,
    },
    /// Form control associated with a label
    Label(String),
    /// Placeholder attribute
    Placeholder(String),
    /// CSS expression with optional visible-text filter
    Css {
        /// CSS expression
        css: String,
        /// Visible-text filter
        text: Option<String>,
    },
    /// Visible text content
    Text(String),
}

/// Opaque element handle minted by the driver.
///
/// Valid for the page state it was resolved against; the driver reports
/// [`DriverError::StaleHandle`] when a handle has detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub u64);

// ============================================================================
// Launch & Context Options
// ============================================================================

/// Options for launching a browser context.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Run without a visible browser window
    pub headless: bool,
    /// Viewport size
    pub viewport: Option<Viewport>,
    /// BCP 47 locale
    pub locale: Option<String>,
    /// IANA timezone
    pub timezone: Option<String>,
    /// Extra HTTP headers for every request
    pub extra_headers: IndexMap<String, String>,
    /// Record video into this directory
    pub video_dir: Option<PathBuf>,
}

/// Action applied to a network route intercepted by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAction {
    /// Answer the request without hitting the network
    Fulfill {
        /// HTTP status code
        status: u16,
        /// Content-Type header
        content_type: String,
        /// Response body
        body: String,
    },
    /// Fail the request
    Abort,
    /// Let the request through unchanged
    Continue,
}

/// A browser console message observed by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleMessage {
    /// Message severity
    pub level: ConsoleLevel,
    /// Message text
    pub text: String,
}

/// Console message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// console.log / console.info
    Log,
    /// console.warn
    Warning,
    /// console.error and uncaught exceptions
    Error,
}

// ============================================================================
// Capability Traits
// ============================================================================

/// A browser automation driver.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Human-readable driver name for logging.
    fn name(&self) -> &'static str;

    /// Launches an isolated browser context.
    async fn launch(&self, opts: &LaunchOptions) -> Result<Box<dyn BrowserContext>, DriverError>;
}

/// An isolated browser context owning one page.
#[async_trait]
pub trait BrowserContext: Send + Sync {
    /// Returns the context's page.
    async fn page(&self) -> Result<Box<dyn Page>, DriverError>;

    /// Starts collecting a trace.
    async fn start_tracing(&self) -> Result<(), DriverError>;

    /// Stops tracing and writes the archive to `out`.
    async fn stop_tracing(&self, out: &Path) -> Result<(), DriverError>;

    /// Serializes cookies and local storage.
    async fn storage_state(&self) -> Result<serde_json::Value, DriverError>;

    /// Restores a previously saved storage state.
    async fn restore_storage_state(&self, state: &serde_json::Value) -> Result<(), DriverError>;

    /// Intercepts requests matching `pattern` with the given action.
    async fn route(&self, pattern: &str, action: RouteAction) -> Result<(), DriverError>;

    /// Path of the recorded video, if recording was enabled.
    async fn video_path(&self) -> Option<PathBuf>;

    /// Closes the context and releases browser resources.
    async fn close(&self) -> Result<(), DriverError>;
}

/// One browser page.
///
/// Interaction methods rely on the driver's actionability auto-wait;
/// `goto` resolves only after the DOM-content-loaded signal.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigates to `url` and awaits DOM-content-loaded.
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    /// Navigates one entry back in history.
    async fn back(&self) -> Result<(), DriverError>;

    /// Reloads the current page.
    async fn reload(&self) -> Result<(), DriverError>;

    /// Current page URL.
    async fn url(&self) -> String;

    /// Returns all elements matching the locator, in DOM order.
    async fn locate(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError>;

    /// Returns matching elements scoped under `root`.
    async fn locate_within(
        &self,
        root: ElementHandle,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError>;

    /// Whether the element is visible.
    async fn is_visible(&self, el: ElementHandle) -> Result<bool, DriverError>;

    /// Clicks the element.
    async fn click(&self, el: ElementHandle) -> Result<(), DriverError>;

    /// Double-clicks the element.
    async fn dblclick(&self, el: ElementHandle) -> Result<(), DriverError>;

    /// Replaces the element's value with `value`.
    async fn fill(&self, el: ElementHandle, value: &str) -> Result<(), DriverError>;

    /// Sends a key chord to the element.
    async fn press(&self, el: ElementHandle, key: &str) -> Result<(), DriverError>;

    /// Sets a checkbox or radio to the given state.
    async fn set_checked(&self, el: ElementHandle, checked: bool) -> Result<(), DriverError>;

    /// Selects the option with the given value or visible text.
    async fn select_option(&self, el: ElementHandle, option: &str) -> Result<(), DriverError>;

    /// Attaches files to a file input.
    async fn set_input_files(&self, el: ElementHandle, files: &[PathBuf])
    -> Result<(), DriverError>;

    /// The element's trimmed text content.
    async fn text_content(&self, el: ElementHandle) -> Result<String, DriverError>;

    /// The element's attribute value, if present.
    async fn attribute(
        &self,
        el: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    /// Captures a screenshot of the page.
    async fn screenshot(&self, format: ImageFormat, quality: u8) -> Result<Vec<u8>, DriverError>;

    /// The page's serialized DOM.
    async fn content(&self) -> Result<String, DriverError>;

    /// Scrolls the element into view.
    async fn scroll_into_view(&self, el: ElementHandle) -> Result<(), DriverError>;

    /// Scrolls the element's scroll container by `dy` CSS pixels.
    async fn scroll_by(&self, el: ElementHandle, dy: i32) -> Result<(), DriverError>;

    /// Waits until no network request has been in flight for the driver's
    /// idle threshold, bounded by `timeout`.
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), DriverError>;

    /// Drains console messages observed since the last call.
    async fn console_messages(&self) -> Vec<ConsoleMessage>;
}
