//! High-level handlers.
//!
//! Each one encapsulates a multi-step dance that is unstable when spelled
//! out primitively: overlay option pickers, Wijmo combos and virtualized
//! grids, date pickers, file uploads, toasts, console assertions and
//! network stubbing.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use super::{StepCategory, StepContext, StepHandler, check_payload, parse_payload};
use crate::driver::{ConsoleLevel, ElementHandle, Locator, Page, RouteAction};
use crate::error::{ResolveError, RunError};
use crate::scenario::schema::{By, StepCommon};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound on scroll-and-retry rounds in the grid row search.
const MAX_GRID_SCROLLS: usize = 40;

/// Pixels scrolled per grid retry round (one viewport).
const GRID_SCROLL_STEP: i32 = 600;

/// Wijmo's dropdown list convention.
const WIJMO_DROPDOWN_CSS: &str = ".wj-dropdown-panel";

// ============================================================================
// Shared helpers
// ============================================================================

/// Resolves the descendant of `root` whose visible text equals `text`.
///
/// Polls until exactly one visible, text-equal descendant exists; several
/// equal matches violate strictness and fail like any ambiguity.
async fn resolve_option_in(
    page: &dyn Page,
    root: ElementHandle,
    text: &str,
    timeout: Duration,
) -> Result<ElementHandle, RunError> {
    let deadline = Instant::now() + timeout;
    let locator = Locator::Text(text.to_string());
    loop {
        let mut equal = Vec::new();
        for handle in page.locate_within(root, &locator).await? {
            if !page.is_visible(handle).await.unwrap_or(false) {
                continue;
            }
            if page.text_content(handle).await? == text {
                equal.push(handle);
            }
        }
        match equal.len() {
            1 => return Ok(equal[0]),
            n if n > 1 => {
                return Err(ResolveError::Ambiguous {
                    selector: format!("option text={text:?}"),
                    count: n,
                }
                .into());
            }
            _ => {}
        }
        if Instant::now() >= deadline {
            return Err(ResolveError::NoMatch {
                selector: format!("option text={text:?}"),
            }
            .into());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

// ============================================================================
// selectOverlayOption
// ============================================================================

/// Payload for `selectOverlayOption`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOverlayOptionParams {
    /// Trigger that opens the overlay
    pub open: By,
    /// The overlay list container
    pub list: By,
    /// Visible text of the option to pick
    pub option_text: String,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Open an overlay, wait for its list, pick an option by exact text.
pub struct SelectOverlayOption;

#[async_trait]
impl StepHandler for SelectOverlayOption {
    fn name(&self) -> &'static str {
        "selectOverlayOption"
    }
    fn category(&self) -> StepCategory {
        StepCategory::HighLevel
    }
    fn schema(&self) -> &'static str {
        "open: selector, list: selector, optionText: string"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<SelectOverlayOptionParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: SelectOverlayOptionParams = parse_payload(self.name(), payload)?;
        let trigger = ctx.resolve(page, &params.open).await?;
        page.click(trigger).await?;

        let list = ctx.resolve(page, &params.list).await?;
        let option = resolve_option_in(page, list, &params.option_text, ctx.timeout).await?;
        page.click(option).await?;
        ctx.log(&format!(
            "selectOverlayOption {} -> {:?}",
            params.open, params.option_text
        ));
        Ok(())
    }
}

// ============================================================================
// selectWijmoCombo
// ============================================================================

/// Payload for `selectWijmoCombo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectWijmoComboParams {
    /// The combo root element
    pub root: By,
    /// Visible text of the option to pick
    pub option_text: String,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// `selectOverlayOption` scoped to Wijmo's dropdown-panel convention.
pub struct SelectWijmoCombo;

#[async_trait]
impl StepHandler for SelectWijmoCombo {
    fn name(&self) -> &'static str {
        "selectWijmoCombo"
    }
    fn category(&self) -> StepCategory {
        StepCategory::HighLevel
    }
    fn schema(&self) -> &'static str {
        "root: selector, optionText: string"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<SelectWijmoComboParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: SelectWijmoComboParams = parse_payload(self.name(), payload)?;
        let root = ctx.resolve(page, &params.root).await?;
        page.click(root).await?;

        let list_by = By::Css {
            css: WIJMO_DROPDOWN_CSS.to_string(),
            text: None,
        };
        let list = ctx.resolve(page, &list_by).await?;
        let option = resolve_option_in(page, list, &params.option_text, ctx.timeout).await?;
        page.click(option).await?;
        ctx.log(&format!(
            "selectWijmoCombo {} -> {:?}",
            params.root, params.option_text
        ));
        Ok(())
    }
}

// ============================================================================
// clickWijmoGridCell
// ============================================================================

/// Row-identifying key for `clickWijmoGridCell`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowKey {
    /// Column whose cell identifies the row
    pub column: String,
    /// Exact cell text identifying the row
    pub equals: String,
}

/// Payload for `clickWijmoGridCell`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickWijmoGridCellParams {
    /// The grid container
    pub grid: By,
    /// How to find the row
    pub row_key: RowKey,
    /// Column of the cell to click
    pub column: String,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Find a row in a virtualized Wijmo grid, scrolling as needed, then click
/// the requested cell.
pub struct ClickWijmoGridCell;

impl ClickWijmoGridCell {
    async fn find_row(
        page: &dyn Page,
        grid: ElementHandle,
        key: &RowKey,
    ) -> Result<Option<ElementHandle>, RunError> {
        let row_locator = Locator::Css {
            css: ".wj-row".to_string(),
            text: None,
        };
        let key_cell_locator = Locator::Css {
            css: format!(".wj-cell[data-col=\"{}\"]", key.column),
            text: None,
        };
        for row in page.locate_within(grid, &row_locator).await? {
            for cell in page.locate_within(row, &key_cell_locator).await? {
                if page.text_content(cell).await? == key.equals {
                    return Ok(Some(row));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl StepHandler for ClickWijmoGridCell {
    fn name(&self) -> &'static str {
        "clickWijmoGridCell"
    }
    fn category(&self) -> StepCategory {
        StepCategory::HighLevel
    }
    fn schema(&self) -> &'static str {
        "grid: selector, rowKey: {column, equals}, column: string"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<ClickWijmoGridCellParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: ClickWijmoGridCellParams = parse_payload(self.name(), payload)?;
        let grid = ctx.resolve(page, &params.grid).await?;

        let mut row = Self::find_row(page, grid, &params.row_key).await?;
        let mut scrolls = 0;
        while row.is_none() && scrolls < MAX_GRID_SCROLLS {
            page.scroll_by(grid, GRID_SCROLL_STEP).await?;
            scrolls += 1;
            debug!(step = %ctx.step_name, scrolls, "grid row not in window, scrolled");
            ctx.log(&format!(
                "scrolled grid {} searching for {}={:?} (round {scrolls})",
                params.grid, params.row_key.column, params.row_key.equals
            ));
            row = Self::find_row(page, grid, &params.row_key).await?;
        }

        let Some(row) = row else {
            return Err(ResolveError::NoMatch {
                selector: format!(
                    "grid row {}={:?} after {scrolls} scrolls",
                    params.row_key.column, params.row_key.equals
                ),
            }
            .into());
        };

        let cell_locator = Locator::Css {
            css: format!(".wj-cell[data-col=\"{}\"]", params.column),
            text: None,
        };
        let cells = page.locate_within(row, &cell_locator).await?;
        let Some(&cell) = cells.first() else {
            return Err(ResolveError::NoMatch {
                selector: format!("grid cell column {:?}", params.column),
            }
            .into());
        };
        page.click(cell).await?;
        ctx.log(&format!(
            "clickWijmoGridCell {}={:?} column {:?}",
            params.row_key.column, params.row_key.equals, params.column
        ));
        Ok(())
    }
}

// ============================================================================
// setDatePicker
// ============================================================================

/// Payload for `setDatePicker`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDatePickerParams {
    /// The date input
    pub by: By,
    /// ISO date (YYYY-MM-DD)
    pub date: String,
    /// chrono format string the widget expects (e.g. "%d/%m/%Y")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Fill a date input, formatting an ISO date for the widget.
pub struct SetDatePicker;

#[async_trait]
impl StepHandler for SetDatePicker {
    fn name(&self) -> &'static str {
        "setDatePicker"
    }
    fn category(&self) -> StepCategory {
        StepCategory::HighLevel
    }
    fn schema(&self) -> &'static str {
        "by: selector, date: YYYY-MM-DD, format: chrono pattern (optional)"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<SetDatePickerParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: SetDatePickerParams = parse_payload(self.name(), payload)?;
        let value = match &params.format {
            Some(format) => {
                let date = chrono::NaiveDate::parse_from_str(&params.date, "%Y-%m-%d")
                    .map_err(|e| RunError::InvalidPayload {
                        kind: self.name().to_string(),
                        message: format!("date {:?}: {e}", params.date),
                    })?;
                date.format(format).to_string()
            }
            None => params.date.clone(),
        };
        let handle = ctx.resolve(page, &params.by).await?;
        page.fill(handle, &value).await?;
        page.press(handle, "Enter").await?;
        ctx.log(&format!("setDatePicker {} = {value}", params.by));
        Ok(())
    }
}

// ============================================================================
// uploadFile
// ============================================================================

/// Payload for `uploadFile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileParams {
    /// The file input
    pub by: By,
    /// File to attach
    pub file_path: PathBuf,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Attach a file to a file input.
pub struct UploadFile;

#[async_trait]
impl StepHandler for UploadFile {
    fn name(&self) -> &'static str {
        "uploadFile"
    }
    fn category(&self) -> StepCategory {
        StepCategory::HighLevel
    }
    fn schema(&self) -> &'static str {
        "by: selector, filePath: path"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<UploadFileParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: UploadFileParams = parse_payload(self.name(), payload)?;
        let handle = ctx.resolve(page, &params.by).await?;
        page.set_input_files(handle, std::slice::from_ref(&params.file_path))
            .await?;
        ctx.log(&format!(
            "uploadFile {} <- {}",
            params.by,
            params.file_path.display()
        ));
        Ok(())
    }
}

// ============================================================================
// waitForToast
// ============================================================================

/// Payload for `waitForToast`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitForToastParams {
    /// Toast text to wait for
    pub text: String,
    /// Shared step fields (`timeoutMs` bounds the wait)
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Wait for a transient notification containing the given text.
pub struct WaitForToast;

#[async_trait]
impl StepHandler for WaitForToast {
    fn name(&self) -> &'static str {
        "waitForToast"
    }
    fn category(&self) -> StepCategory {
        StepCategory::HighLevel
    }
    fn schema(&self) -> &'static str {
        "text: string, timeoutMs: override (optional)"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<WaitForToastParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: WaitForToastParams = parse_payload(self.name(), payload)?;
        let by = By::Text(params.text.clone());
        ctx.resolve(page, &by).await?;
        ctx.log(&format!("toast observed: {:?}", params.text));
        Ok(())
    }
}

// ============================================================================
// assertNoConsoleError
// ============================================================================

/// Payload for `assertNoConsoleError`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertNoConsoleErrorParams {
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Fail if any console error has been observed so far in the run.
pub struct AssertNoConsoleError;

#[async_trait]
impl StepHandler for AssertNoConsoleError {
    fn name(&self) -> &'static str {
        "assertNoConsoleError"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Assertion
    }
    fn schema(&self) -> &'static str {
        "no parameters"
    }
    fn check(&self, _payload: &serde_yaml::Value) -> Result<(), String> {
        Ok(())
    }

    async fn execute(
        &self,
        page: &dyn Page,
        _payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let fresh = page.console_messages().await;
        ctx.console.extend(fresh);
        let errors: Vec<&str> = ctx
            .console
            .iter()
            .filter(|m| m.level == ConsoleLevel::Error)
            .map(|m| m.text.as_str())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RunError::Assertion {
                message: format!(
                    "{} console error(s) observed: {}",
                    errors.len(),
                    errors.join("; ")
                ),
            })
        }
    }
}

// ============================================================================
// apiMock / routeStub
// ============================================================================

/// Payload for `apiMock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMockParams {
    /// URL or URL pattern to intercept
    pub url: String,
    /// HTTP method filter (any method when omitted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// JSON body the mock answers with
    pub response: serde_yaml::Value,
    /// HTTP status (default 200)
    #[serde(default = "default_status")]
    pub status: u16,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

const fn default_status() -> u16 {
    200
}

/// Answer matching API requests with a canned JSON response.
pub struct ApiMock;

#[async_trait]
impl StepHandler for ApiMock {
    fn name(&self) -> &'static str {
        "apiMock"
    }
    fn category(&self) -> StepCategory {
        StepCategory::HighLevel
    }
    fn schema(&self) -> &'static str {
        "url: pattern, method: string (optional), response: JSON value, status: int (default 200)"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<ApiMockParams>(payload)
    }

    async fn execute(
        &self,
        _page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: ApiMockParams = parse_payload(self.name(), payload)?;
        let body = serde_json::to_string(&params.response).map_err(|e| {
            RunError::InvalidPayload {
                kind: self.name().to_string(),
                message: format!("response is not JSON-representable: {e}"),
            }
        })?;
        let pattern = params.method.as_ref().map_or_else(
            || params.url.clone(),
            |method| format!("{} {}", method.to_uppercase(), params.url),
        );
        ctx.browser
            .route(
                &pattern,
                RouteAction::Fulfill {
                    status: params.status,
                    content_type: "application/json".to_string(),
                    body,
                },
            )
            .await?;
        info!(step = %ctx.step_name, pattern = %pattern, "api mock installed");
        ctx.log(&format!("apiMock {pattern}"));
        Ok(())
    }
}

/// Payload for `routeStub`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStubParams {
    /// URL or URL pattern to intercept
    pub url: String,
    /// Stub strategy: `abort`, `empty` or `continue`
    pub handler: StubHandler,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Stub strategies for `routeStub`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StubHandler {
    /// Fail the request
    Abort,
    /// Answer with an empty 204
    Empty,
    /// Let the request through
    Continue,
}

/// Install a named stub strategy on a route.
pub struct RouteStub;

#[async_trait]
impl StepHandler for RouteStub {
    fn name(&self) -> &'static str {
        "routeStub"
    }
    fn category(&self) -> StepCategory {
        StepCategory::HighLevel
    }
    fn schema(&self) -> &'static str {
        "url: pattern, handler: abort | empty | continue"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<RouteStubParams>(payload)
    }

    async fn execute(
        &self,
        _page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: RouteStubParams = parse_payload(self.name(), payload)?;
        let action = match params.handler {
            StubHandler::Abort => RouteAction::Abort,
            StubHandler::Continue => RouteAction::Continue,
            StubHandler::Empty => RouteAction::Fulfill {
                status: 204,
                content_type: "text/plain".to_string(),
                body: String::new(),
            },
        };
        ctx.browser.route(&params.url, action).await?;
        ctx.log(&format!("routeStub {} ({:?})", params.url, params.handler));
        Ok(())
    }
}
