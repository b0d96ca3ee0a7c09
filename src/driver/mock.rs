//! In-memory mock driver.
//!
//! A scriptable DOM standing in for a real browser: elements declare which
//! locator facets they match, visibility can be delayed or gated on a
//! trigger click, and a virtual grid window models row virtualization.
//! Used by the test suite and by `run --driver mock` dry runs.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;

use super::{
    BrowserContext, ConsoleLevel, ConsoleMessage, Driver, ElementHandle, LaunchOptions, Locator,
    Page, RouteAction,
};
use crate::error::DriverError;
use crate::scenario::schema::ImageFormat;

// Handle ranges for synthesized virtual-grid elements.
const GRID_ROW_BASE: u64 = 1_000_000;
const GRID_CELL_BASE: u64 = 2_000_000;
const GRID_CELL_ROW_STRIDE: u64 = 1_000;

// ============================================================================
// Scriptable DOM
// ============================================================================

/// One mock element and the locator facets it matches.
#[derive(Debug, Clone, Default)]
pub struct MockElement {
    /// Element id; also its handle value
    pub id: u64,
    /// Matches `Locator::TestId`
    pub test_id: Option<String>,
    /// Matches `Locator::Role`
    pub role: Option<String>,
    /// Accessible name, filtered by `Locator::Role { name }`
    pub name: Option<String>,
    /// Matches `Locator::Label`
    pub label: Option<String>,
    /// Matches `Locator::Placeholder`
    pub placeholder: Option<String>,
    /// CSS expressions this element matches, verbatim
    pub css: Vec<String>,
    /// Visible text content
    pub text: String,
    /// Attribute map
    pub attrs: IndexMap<String, String>,
    /// Whether the element is currently visible
    pub visible: bool,
    /// Becomes visible this long after the last navigation
    pub visible_after: Option<Duration>,
    /// Becomes visible once the element with this id is clicked
    pub shown_by_click: Option<u64>,
    /// Scope parent, for `locate_within`
    pub parent: Option<u64>,
    /// Current input value (written by `fill`)
    pub value: String,
    /// Checkbox state
    pub checked: bool,
}

impl MockElement {
    /// Creates an element with the given id, visible by default.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            visible: true,
            ..Self::default()
        }
    }
}

/// A virtualized grid: only `window_size` rows are materialized at a time.
#[derive(Debug, Clone)]
pub struct VirtualGrid {
    /// Id of the grid container element
    pub container: u64,
    /// Full dataset; one map of column name → cell text per row
    pub rows: Vec<IndexMap<String, String>>,
    /// Index of the first materialized row
    pub window_start: usize,
    /// Number of materialized rows
    pub window_size: usize,
}

/// Interactions recorded by the mock for assertions.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    /// Element ids clicked, in order
    pub clicks: Vec<u64>,
    /// (element id, value) pairs filled, in order
    pub fills: Vec<(u64, String)>,
    /// (element id, key) pairs pressed
    pub presses: Vec<(u64, String)>,
    /// Grid cells clicked as (row index, column name)
    pub grid_clicks: Vec<(usize, String)>,
    /// Number of grid scroll operations
    pub grid_scrolls: usize,
    /// Routes installed via the context
    pub routes: Vec<(String, RouteAction)>,
    /// URLs navigated to, in order
    pub navigations: Vec<String>,
    /// Storage states restored
    pub restored_storage: Vec<serde_json::Value>,
}

#[derive(Debug)]
struct DomState {
    elements: Vec<MockElement>,
    grid: Option<VirtualGrid>,
    url: String,
    history: Vec<String>,
    console: Vec<ConsoleMessage>,
    storage: serde_json::Value,
    recorded: Recorded,
    loaded_at: tokio::time::Instant,
    clicked: Vec<u64>,
}

/// Shared scriptable DOM behind the mock driver.
///
/// Tests keep a clone of the `Arc` to stage elements and to inspect
/// recorded interactions after a run.
#[derive(Debug, Clone)]
pub struct MockDom {
    state: Arc<Mutex<DomState>>,
}

impl Default for MockDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDom {
    /// Creates an empty DOM.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DomState {
                elements: Vec::new(),
                grid: None,
                url: "about:blank".to_string(),
                history: Vec::new(),
                console: Vec::new(),
                storage: serde_json::json!({}),
                recorded: Recorded::default(),
                loaded_at: tokio::time::Instant::now(),
                clicked: Vec::new(),
            })),
        }
    }

    /// Adds an element to the DOM.
    pub fn add(&self, element: MockElement) {
        self.lock().elements.push(element);
    }

    /// Installs a virtualized grid.
    pub fn set_grid(&self, grid: VirtualGrid) {
        self.lock().grid = Some(grid);
    }

    /// Pushes a console message.
    pub fn push_console(&self, level: ConsoleLevel, text: &str) {
        self.lock().console.push(ConsoleMessage {
            level,
            text: text.to_string(),
        });
    }

    /// Snapshot of everything the mock recorded.
    #[must_use]
    pub fn recorded(&self) -> Recorded {
        self.lock().recorded.clone()
    }

    /// Current value of the element with the given id.
    #[must_use]
    pub fn value_of(&self, id: u64) -> Option<String> {
        self.lock()
            .elements
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.value.clone())
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, DomState> {
        // Held briefly for state mutation, never across .await points.
        self.state.lock().expect("mock dom lock poisoned")
    }
}

impl DomState {
    fn element_visible(&self, e: &MockElement) -> bool {
        if e.visible {
            return true;
        }
        if let Some(delay) = e.visible_after {
            if self.loaded_at.elapsed() >= delay {
                return true;
            }
        }
        if let Some(trigger) = e.shown_by_click {
            if self.clicked.contains(&trigger) {
                return true;
            }
        }
        false
    }

    fn matches(e: &MockElement, locator: &Locator) -> bool {
        match locator {
            Locator::TestId(v) => e.test_id.as_deref() == Some(v),
            Locator::Role { role, name } => {
                e.role.as_deref() == Some(role)
                    && name
                        .as_ref()
                        .is_none_or(|n| e.name.as_deref() == Some(n.as_str()))
            }
            Locator::Label(v) => e.label.as_deref() == Some(v),
            Locator::Placeholder(v) => e.placeholder.as_deref() == Some(v),
            Locator::Css { css, text } => {
                e.css.iter().any(|c| c == css)
                    && text.as_ref().is_none_or(|t| e.text.contains(t.as_str()))
            }
            Locator::Text(v) => !e.text.is_empty() && e.text.contains(v.as_str()),
        }
    }

    fn locate_in(&self, parent: Option<u64>, locator: &Locator) -> Vec<ElementHandle> {
        // Virtual grid rows and cells are synthesized, not stored.
        if let Some(handles) = self.locate_grid(parent, locator) {
            return handles;
        }
        self.elements
            .iter()
            .filter(|e| parent.is_none_or(|p| e.parent == Some(p)))
            .filter(|e| Self::matches(e, locator))
            .map(|e| ElementHandle(e.id))
            .collect()
    }

    fn locate_grid(&self, parent: Option<u64>, locator: &Locator) -> Option<Vec<ElementHandle>> {
        let grid = self.grid.as_ref()?;
        let Locator::Css { css, .. } = locator else {
            return None;
        };
        let parent = parent?;

        if parent == grid.container && css == ".wj-row" {
            let end = (grid.window_start + grid.window_size).min(grid.rows.len());
            return Some(
                (grid.window_start..end)
                    .map(|i| ElementHandle(GRID_ROW_BASE + i as u64))
                    .collect(),
            );
        }
        if parent >= GRID_ROW_BASE && parent < GRID_CELL_BASE {
            let row = parent.checked_sub(GRID_ROW_BASE)?;
            let column = css
                .strip_prefix(".wj-cell[data-col=\"")?
                .strip_suffix("\"]")?;
            let col_idx = grid.rows.first()?.keys().position(|k| k == column)?;
            return Some(vec![ElementHandle(
                GRID_CELL_BASE + row * GRID_CELL_ROW_STRIDE + col_idx as u64,
            )]);
        }
        None
    }

    fn grid_cell_text(&self, handle: u64) -> Option<String> {
        let grid = self.grid.as_ref()?;
        let offset = handle.checked_sub(GRID_CELL_BASE)?;
        let row = usize::try_from(offset / GRID_CELL_ROW_STRIDE).ok()?;
        let col = usize::try_from(offset % GRID_CELL_ROW_STRIDE).ok()?;
        let row_map = grid.rows.get(row)?;
        row_map.values().nth(col).cloned()
    }

    fn element_mut(&mut self, id: u64) -> Result<&mut MockElement, DriverError> {
        self.elements
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(DriverError::StaleHandle(id))
    }
}

// ============================================================================
// Driver / Context / Page
// ============================================================================

/// The mock driver. Every launched context shares the same [`MockDom`].
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    dom: MockDom,
}

impl MockDriver {
    /// Creates a driver around the given DOM.
    #[must_use]
    pub fn new(dom: MockDom) -> Self {
        Self { dom }
    }

    /// The shared DOM, for staging and assertions.
    #[must_use]
    pub fn dom(&self) -> MockDom {
        self.dom.clone()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn launch(&self, opts: &LaunchOptions) -> Result<Box<dyn BrowserContext>, DriverError> {
        Ok(Box::new(MockContext {
            dom: self.dom.clone(),
            video_dir: opts.video_dir.clone(),
            tracing: Arc::new(Mutex::new(false)),
        }))
    }
}

struct MockContext {
    dom: MockDom,
    video_dir: Option<PathBuf>,
    tracing: Arc<Mutex<bool>>,
}

#[async_trait]
impl BrowserContext for MockContext {
    async fn page(&self) -> Result<Box<dyn Page>, DriverError> {
        Ok(Box::new(MockPage {
            dom: self.dom.clone(),
        }))
    }

    async fn start_tracing(&self) -> Result<(), DriverError> {
        *self.tracing.lock().map_err(poisoned)? = true;
        Ok(())
    }

    async fn stop_tracing(&self, out: &Path) -> Result<(), DriverError> {
        let was_tracing = *self.tracing.lock().map_err(poisoned)?;
        if was_tracing {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, b"mock-trace")?;
        }
        Ok(())
    }

    async fn storage_state(&self) -> Result<serde_json::Value, DriverError> {
        Ok(self.dom.lock().storage.clone())
    }

    async fn restore_storage_state(&self, state: &serde_json::Value) -> Result<(), DriverError> {
        let mut dom = self.dom.lock();
        dom.storage = state.clone();
        dom.recorded.restored_storage.push(state.clone());
        Ok(())
    }

    async fn route(&self, pattern: &str, action: RouteAction) -> Result<(), DriverError> {
        self.dom
            .lock()
            .recorded
            .routes
            .push((pattern.to_string(), action));
        Ok(())
    }

    async fn video_path(&self) -> Option<PathBuf> {
        let dir = self.video_dir.as_ref()?;
        let path = dir.join("run.webm");
        std::fs::create_dir_all(dir).ok()?;
        std::fs::write(&path, b"mock-video").ok()?;
        Some(path)
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> DriverError {
    DriverError::Protocol("mock state lock poisoned".to_string())
}

struct MockPage {
    dom: MockDom,
}

#[async_trait]
impl Page for MockPage {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        let mut dom = self.dom.lock();
        let previous = std::mem::replace(&mut dom.url, url.to_string());
        dom.history.push(previous);
        dom.recorded.navigations.push(url.to_string());
        dom.loaded_at = tokio::time::Instant::now();
        Ok(())
    }

    async fn back(&self) -> Result<(), DriverError> {
        let mut dom = self.dom.lock();
        if let Some(previous) = dom.history.pop() {
            dom.url = previous;
        }
        Ok(())
    }

    async fn reload(&self) -> Result<(), DriverError> {
        self.dom.lock().loaded_at = tokio::time::Instant::now();
        Ok(())
    }

    async fn url(&self) -> String {
        self.dom.lock().url.clone()
    }

    async fn locate(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError> {
        Ok(self.dom.lock().locate_in(None, locator))
    }

    async fn locate_within(
        &self,
        root: ElementHandle,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        Ok(self.dom.lock().locate_in(Some(root.0), locator))
    }

    async fn is_visible(&self, el: ElementHandle) -> Result<bool, DriverError> {
        let dom = self.dom.lock();
        if el.0 >= GRID_ROW_BASE {
            return Ok(true);
        }
        let element = dom
            .elements
            .iter()
            .find(|e| e.id == el.0)
            .ok_or(DriverError::StaleHandle(el.0))?;
        Ok(dom.element_visible(element))
    }

    async fn click(&self, el: ElementHandle) -> Result<(), DriverError> {
        let mut dom = self.dom.lock();
        if let Some(offset) = el.0.checked_sub(GRID_CELL_BASE) {
            if dom.grid.is_some() {
                let row = usize::try_from(offset / GRID_CELL_ROW_STRIDE)
                    .map_err(|_| DriverError::StaleHandle(el.0))?;
                let col = usize::try_from(offset % GRID_CELL_ROW_STRIDE)
                    .map_err(|_| DriverError::StaleHandle(el.0))?;
                let column = dom
                    .grid
                    .as_ref()
                    .and_then(|g| g.rows.first())
                    .and_then(|r| r.keys().nth(col).cloned())
                    .ok_or(DriverError::StaleHandle(el.0))?;
                dom.recorded.grid_clicks.push((row, column));
                return Ok(());
            }
        }
        dom.element_mut(el.0)?;
        dom.clicked.push(el.0);
        dom.recorded.clicks.push(el.0);
        Ok(())
    }

    async fn dblclick(&self, el: ElementHandle) -> Result<(), DriverError> {
        self.click(el).await?;
        self.click(el).await
    }

    async fn fill(&self, el: ElementHandle, value: &str) -> Result<(), DriverError> {
        let mut dom = self.dom.lock();
        dom.element_mut(el.0)?.value = value.to_string();
        dom.recorded.fills.push((el.0, value.to_string()));
        Ok(())
    }

    async fn press(&self, el: ElementHandle, key: &str) -> Result<(), DriverError> {
        let mut dom = self.dom.lock();
        dom.element_mut(el.0)?;
        dom.recorded.presses.push((el.0, key.to_string()));
        Ok(())
    }

    async fn set_checked(&self, el: ElementHandle, checked: bool) -> Result<(), DriverError> {
        self.dom.lock().element_mut(el.0)?.checked = checked;
        Ok(())
    }

    async fn select_option(&self, el: ElementHandle, option: &str) -> Result<(), DriverError> {
        let mut dom = self.dom.lock();
        dom.element_mut(el.0)?.value = option.to_string();
        dom.recorded.fills.push((el.0, option.to_string()));
        Ok(())
    }

    async fn set_input_files(
        &self,
        el: ElementHandle,
        files: &[PathBuf],
    ) -> Result<(), DriverError> {
        let joined = files
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.dom.lock().element_mut(el.0)?.value = joined;
        Ok(())
    }

    async fn text_content(&self, el: ElementHandle) -> Result<String, DriverError> {
        let dom = self.dom.lock();
        if el.0 >= GRID_CELL_BASE {
            return dom
                .grid_cell_text(el.0)
                .ok_or(DriverError::StaleHandle(el.0));
        }
        dom.elements
            .iter()
            .find(|e| e.id == el.0)
            .map(|e| e.text.trim().to_string())
            .ok_or(DriverError::StaleHandle(el.0))
    }

    async fn attribute(
        &self,
        el: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let dom = self.dom.lock();
        let element = dom
            .elements
            .iter()
            .find(|e| e.id == el.0)
            .ok_or(DriverError::StaleHandle(el.0))?;
        if name == "value" {
            return Ok(Some(element.value.clone()));
        }
        Ok(element.attrs.get(name).cloned())
    }

    async fn screenshot(&self, format: ImageFormat, _quality: u8) -> Result<Vec<u8>, DriverError> {
        // Deterministic bytes; real pixels are a driver concern.
        let url = self.dom.lock().url.clone();
        Ok(format!("mock-screenshot:{}:{url}", format.extension()).into_bytes())
    }

    async fn content(&self) -> Result<String, DriverError> {
        let dom = self.dom.lock();
        let mut out = String::from("<html><body>");
        for e in &dom.elements {
            out.push_str(&format!("<div data-mock-id=\"{}\">{}</div>", e.id, e.text));
        }
        out.push_str("</body></html>");
        Ok(out)
    }

    async fn scroll_into_view(&self, _el: ElementHandle) -> Result<(), DriverError> {
        Ok(())
    }

    async fn scroll_by(&self, el: ElementHandle, _dy: i32) -> Result<(), DriverError> {
        let mut dom = self.dom.lock();
        let Some(grid) = dom.grid.as_mut() else {
            return Ok(());
        };
        if el.0 == grid.container {
            grid.window_start = (grid.window_start + grid.window_size).min(grid.rows.len());
            dom.recorded.grid_scrolls += 1;
        }
        Ok(())
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> Result<(), DriverError> {
        Ok(())
    }

    async fn console_messages(&self) -> Vec<ConsoleMessage> {
        std::mem::take(&mut self.dom.lock().console)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(dom: &MockDom) -> MockPage {
        MockPage { dom: dom.clone() }
    }

    #[tokio::test]
    async fn locate_by_facets() {
        let dom = MockDom::new();
        let mut save = MockElement::new(1);
        save.test_id = Some("save".to_string());
        save.role = Some("button".to_string());
        save.name = Some("Save".to_string());
        dom.add(save);

        let p = page(&dom);
        assert_eq!(
            p.locate(&Locator::TestId("save".to_string())).await.unwrap(),
            vec![ElementHandle(1)]
        );
        assert_eq!(
            p.locate(&Locator::Role {
                role: "button".to_string(),
                name: Some("Save".to_string()),
            })
            .await
            .unwrap(),
            vec![ElementHandle(1)]
        );
        assert!(
            p.locate(&Locator::TestId("other".to_string()))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn shown_by_click_gates_visibility() {
        let dom = MockDom::new();
        let mut trigger = MockElement::new(1);
        trigger.test_id = Some("open".to_string());
        dom.add(trigger);
        let mut panel = MockElement::new(2);
        panel.css = vec![".panel".to_string()];
        panel.visible = false;
        panel.shown_by_click = Some(1);
        dom.add(panel);

        let p = page(&dom);
        assert!(!p.is_visible(ElementHandle(2)).await.unwrap());
        p.click(ElementHandle(1)).await.unwrap();
        assert!(p.is_visible(ElementHandle(2)).await.unwrap());
    }

    #[tokio::test]
    async fn grid_window_scrolls() {
        let dom = MockDom::new();
        dom.add({
            let mut g = MockElement::new(10);
            g.test_id = Some("grid".to_string());
            g
        });
        let rows: Vec<IndexMap<String, String>> = (0..100)
            .map(|i| {
                let mut m = IndexMap::new();
                m.insert("id".to_string(), format!("row-{i}"));
                m.insert("status".to_string(), "ok".to_string());
                m
            })
            .collect();
        dom.set_grid(VirtualGrid {
            container: 10,
            rows,
            window_start: 0,
            window_size: 20,
        });

        let p = page(&dom);
        let grid = ElementHandle(10);
        let row_locator = Locator::Css {
            css: ".wj-row".to_string(),
            text: None,
        };
        let first = p.locate_within(grid, &row_locator).await.unwrap();
        assert_eq!(first.len(), 20);

        p.scroll_by(grid, 800).await.unwrap();
        let second = p.locate_within(grid, &row_locator).await.unwrap();
        assert_eq!(second[0], ElementHandle(GRID_ROW_BASE + 20));

        let cell_locator = Locator::Css {
            css: ".wj-cell[data-col=\"id\"]".to_string(),
            text: None,
        };
        let cells = p.locate_within(second[0], &cell_locator).await.unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(p.text_content(cells[0]).await.unwrap(), "row-20");
    }

    #[tokio::test]
    async fn fill_records_value() {
        let dom = MockDom::new();
        let mut input = MockElement::new(5);
        input.label = Some("Email".to_string());
        dom.add(input);

        let p = page(&dom);
        let found = p.locate(&Locator::Label("Email".to_string())).await.unwrap();
        p.fill(found[0], "u@e.com").await.unwrap();
        assert_eq!(dom.value_of(5), Some("u@e.com".to_string()));
        assert_eq!(dom.recorded().fills, vec![(5, "u@e.com".to_string())]);
    }
}
