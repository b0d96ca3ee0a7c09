//! Scenario document types.
//!
//! These types are deserialized from YAML scenario files. The step list is
//! deliberately open: a [`Step`] keeps its payload as raw YAML so that any
//! handler registered in the step registry (built-in or plugin) can own
//! its payload schema. The selector algebra [`By`] is a closed sum; the set
//! of variants is fixed and pattern matching over it is exhaustive.

use indexmap::IndexMap;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Top-Level Scenario
// ============================================================================

/// Root scenario document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    /// Human-readable scenario title (required, non-empty)
    pub title: String,

    /// Absolute base URL; relative `goto` targets resolve against it
    pub base_url: String,

    /// Variable templates, in declaration order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub vars: IndexMap<String, String>,

    /// Artifact capture policy
    #[serde(default)]
    pub artifacts: ArtifactsPolicy,

    /// Hook step lists run around every step
    #[serde(default, skip_serializing_if = "Hooks::is_empty")]
    pub hooks: Hooks,

    /// Selector healing mode
    #[serde(default)]
    pub healing: HealingMode,

    /// Default per-step timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Browser environment knobs honored at context creation
    #[serde(default, skip_serializing_if = "RunEnv::is_empty")]
    pub env: RunEnv,

    /// Ordered step sequence (required, non-empty)
    pub steps: Vec<StepNode>,
}

const fn default_timeout_ms() -> u64 {
    10_000
}

impl Scenario {
    /// Iterates over executable steps in order, flattening sections.
    ///
    /// Yields `(section_title, step)` pairs; the title is `None` for
    /// top-level steps.
    pub fn flat_steps(&self) -> impl Iterator<Item = (Option<&str>, &Step)> {
        self.steps.iter().flat_map(|node| match node {
            StepNode::Step(step) => with_title(None, std::slice::from_ref(step)),
            StepNode::Section(section) => {
                with_title(Some(section.title.as_str()), &section.steps)
            }
        })
    }
}

fn with_title<'a>(
    title: Option<&'a str>,
    steps: &'a [Step],
) -> impl Iterator<Item = (Option<&'a str>, &'a Step)> {
    steps.iter().map(move |s| (title, s))
}

/// Selector healing mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealingMode {
    /// No widening; selector failures are immediate
    #[default]
    Off,
    /// Retry `NoMatch` failures with a fixed widening schedule
    Safe,
}

// ============================================================================
// Hooks
// ============================================================================

/// Hook step lists. Hooks see the same scope as ordinary steps but cannot
/// themselves contain hooks or sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hooks {
    /// Steps run before every step, in list order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before_each_step: Vec<Step>,

    /// Steps run after every successful step, in list order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after_each_step: Vec<Step>,
}

impl Hooks {
    /// Returns `true` if no hooks are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.before_each_step.is_empty() && self.after_each_step.is_empty()
    }
}

// ============================================================================
// Artifacts Policy
// ============================================================================

/// Artifact capture policy: three independent sub-policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactsPolicy {
    /// Screenshot capture policy
    #[serde(default)]
    pub screenshots: ScreenshotPolicy,

    /// Trace retention policy
    #[serde(default)]
    pub trace: RetentionPolicy,

    /// Video retention policy
    #[serde(default = "video_default")]
    pub video: RetentionPolicy,
}

// Video defaults to `none` (recording is opt-in), unlike trace.
fn video_default() -> RetentionPolicy {
    RetentionPolicy {
        mode: RetentionMode::None,
    }
}

impl Default for ArtifactsPolicy {
    fn default() -> Self {
        Self {
            screenshots: ScreenshotPolicy::default(),
            trace: RetentionPolicy::default(),
            video: video_default(),
        }
    }
}

/// Screenshot capture policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotPolicy {
    /// When screenshots are captured
    #[serde(default)]
    pub mode: ScreenshotMode,

    /// Image format
    #[serde(default)]
    pub format: ImageFormat,

    /// Compression quality, 1..=100 (JPEG only)
    #[serde(default = "default_quality")]
    pub quality: u8,
}

const fn default_quality() -> u8 {
    80
}

impl Default for ScreenshotPolicy {
    fn default() -> Self {
        Self {
            mode: ScreenshotMode::default(),
            format: ImageFormat::default(),
            quality: default_quality(),
        }
    }
}

/// When screenshots are captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenshotMode {
    /// One screenshot before every step
    #[default]
    BeforeEachStep,
    /// Screenshots before and after every step
    BeforeAndAfter,
    /// No screenshots
    None,
}

/// Screenshot image format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JPEG (smaller, lossy)
    #[default]
    Jpeg,
    /// PNG (lossless)
    Png,
}

impl ImageFormat {
    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }
}

/// Retention policy for trace and video artifacts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    /// Retention mode
    #[serde(default)]
    pub mode: RetentionMode,
}

/// Whether an artifact is kept after the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionMode {
    /// Keep only when the run failed
    #[default]
    OnFailure,
    /// Always keep
    Always,
    /// Never record
    None,
}

// ============================================================================
// Browser Environment
// ============================================================================

/// Browser environment knobs applied at context creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEnv {
    /// Viewport size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,

    /// BCP 47 locale (e.g. "ja-JP")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// IANA timezone (e.g. "Asia/Tokyo")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Extra HTTP headers sent with every request
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra_headers: IndexMap<String, String>,

    /// Storage state file restored before the first step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_state: Option<PathBuf>,
}

impl RunEnv {
    /// Returns `true` if every knob is unset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.viewport.is_none()
            && self.locale.is_none()
            && self.timezone.is_none()
            && self.extra_headers.is_empty()
            && self.storage_state.is_none()
    }
}

/// Viewport dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

// ============================================================================
// Steps
// ============================================================================

/// A node in the step list: either an executable step or a section.
#[derive(Debug, Clone)]
pub enum StepNode {
    /// An executable step
    Step(Step),
    /// A labeled group of steps, advisory only
    Section(Section),
}

/// A labeled group of consecutive steps. Sections have no runtime
/// semantics beyond appearing in results and reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Section label
    pub title: String,
    /// Ordered sub-steps (sections do not nest)
    pub steps: Vec<Step>,
}

/// One executable step: a type name plus its raw YAML payload.
///
/// The payload stays untyped here so that plugin handlers registered at
/// runtime participate in parsing, validation and execution exactly like
/// built-ins; each handler materializes its own typed parameters.
#[derive(Debug, Clone)]
pub struct Step {
    /// Step type name, the registry key (e.g. "click", "waitForToast")
    pub kind: String,
    /// Raw payload mapping
    pub payload: serde_yaml::Value,
}

/// Fields shared by every step payload, parsed leniently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCommon {
    /// Step name (kebab-case, verb-object)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether values flowing through this step are secret
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub secret: bool,

    /// Per-step timeout override in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Strictness override (single-selector steps only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

impl Step {
    /// Creates a step from a type name and a typed payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized to YAML.
    pub fn from_payload<T: Serialize>(kind: &str, payload: &T) -> Result<Self, serde_yaml::Error> {
        Ok(Self {
            kind: kind.to_string(),
            payload: serde_yaml::to_value(payload)?,
        })
    }

    /// Parses the shared fields out of the payload.
    ///
    /// Unknown payload shapes yield defaults; the handler reports precise
    /// schema errors at dispatch time.
    #[must_use]
    pub fn common(&self) -> StepCommon {
        serde_yaml::from_value(self.payload.clone()).unwrap_or_default()
    }

    /// Extracts the `by` selector from the payload, if present.
    #[must_use]
    pub fn selector(&self) -> Option<By> {
        self.payload
            .get("by")
            .and_then(|v| serde_yaml::from_value(v.clone()).ok())
    }

    /// Returns the effective display name: explicit name or the type name.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.common().name.unwrap_or_else(|| self.kind.clone())
    }
}

// Step serializes as a single-key mapping: `{ <kind>: <payload> }`.
impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serde_yaml::Mapping::new();
        map.insert(
            serde_yaml::Value::String(self.kind.clone()),
            self.payload.clone(),
        );
        serde_yaml::Value::Mapping(map).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        let (kind, payload) = single_key(&value).map_err(DeError::custom)?;
        if kind == "section" {
            return Err(DeError::custom("section is not allowed here"));
        }
        Ok(Self { kind, payload })
    }
}

impl Serialize for StepNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Step(step) => step.serialize(serializer),
            Self::Section(section) => {
                let mut map = serde_yaml::Mapping::new();
                map.insert(
                    serde_yaml::Value::String("section".to_string()),
                    serde_yaml::to_value(section).map_err(serde::ser::Error::custom)?,
                );
                serde_yaml::Value::Mapping(map).serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for StepNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        let (kind, payload) = single_key(&value).map_err(DeError::custom)?;
        if kind == "section" {
            let section: Section = serde_yaml::from_value(payload).map_err(DeError::custom)?;
            Ok(Self::Section(section))
        } else {
            Ok(Self::Step(Step { kind, payload }))
        }
    }
}

fn single_key(value: &serde_yaml::Value) -> Result<(String, serde_yaml::Value), String> {
    let map = value
        .as_mapping()
        .ok_or_else(|| "step must be a single-key mapping".to_string())?;
    if map.len() != 1 {
        return Err(format!(
            "step must be a single-key mapping keyed by its type, found {} keys",
            map.len()
        ));
    }
    let (key, payload) = map.iter().next().ok_or_else(|| "empty step".to_string())?;
    let kind = key
        .as_str()
        .ok_or_else(|| "step type must be a string".to_string())?;
    Ok((kind.to_string(), payload.clone()))
}

// ============================================================================
// Selector Algebra
// ============================================================================

/// A declarative selector expression.
///
/// Exactly one variant is populated per value; every non-`any` case is a
/// single selector that maps one-to-one onto a primitive driver locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum By {
    /// Match a stable test-id attribute
    TestId(String),
    /// Match by accessibility role, optionally filtered by accessible name
    Role {
        /// ARIA role (e.g. "button")
        role: String,
        /// Accessible name filter
        name: Option<String>,
    },
    /// Match a form control associated with the given label text
    Label(String),
    /// Match by placeholder attribute
    Placeholder(String),
    /// CSS selector, optionally filtered by visible text
    Css {
        /// CSS expression
        css: String,
        /// Visible-text filter
        text: Option<String>,
    },
    /// Match by visible text content only (discouraged; linted)
    Text(String),
    /// Ordered fallback list; may not nest
    Any(Vec<By>),
}

impl By {
    /// Returns `true` for every non-`any` variant.
    #[must_use]
    pub const fn is_single(&self) -> bool {
        !matches!(self, Self::Any(_))
    }

    /// The human-identifying string of the selector, if it has one.
    ///
    /// Used by secret detection, healing, and auto-naming: the accessible
    /// name, label, placeholder or text that identifies the target to a
    /// person reading the scenario.
    #[must_use]
    pub fn human_hint(&self) -> Option<&str> {
        match self {
            Self::TestId(v) | Self::Label(v) | Self::Placeholder(v) | Self::Text(v) => Some(v),
            Self::Role { name, .. } => name.as_deref(),
            Self::Css { text, .. } => text.as_deref(),
            Self::Any(candidates) => candidates.iter().find_map(Self::human_hint),
        }
    }
}

impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TestId(v) => write!(f, "testId={v}"),
            Self::Role { role, name } => match name {
                Some(n) => write!(f, "role={role}[name={n:?}]"),
                None => write!(f, "role={role}"),
            },
            Self::Label(v) => write!(f, "label={v:?}"),
            Self::Placeholder(v) => write!(f, "placeholder={v:?}"),
            Self::Css { css, text } => match text {
                Some(t) => write!(f, "css={css}[text={t:?}]"),
                None => write!(f, "css={css}"),
            },
            Self::Text(v) => write!(f, "text={v:?}"),
            Self::Any(candidates) => {
                write!(f, "any[")?;
                for (i, c) in candidates.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, "]")
            }
        }
    }
}

// By serializes as a mapping discriminated by field presence, per the
// selector table: `{testId: v}`, `{role: r, name: n}`, `{css: e, text: t}`,
// `{any: [..]}` and so on.
impl Serialize for By {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serde_yaml::Mapping::new();
        let mut put = |k: &str, v: serde_yaml::Value| {
            map.insert(serde_yaml::Value::String(k.to_string()), v);
        };
        match self {
            Self::TestId(v) => put("testId", serde_yaml::Value::String(v.clone())),
            Self::Role { role, name } => {
                put("role", serde_yaml::Value::String(role.clone()));
                if let Some(n) = name {
                    put("name", serde_yaml::Value::String(n.clone()));
                }
            }
            Self::Label(v) => put("label", serde_yaml::Value::String(v.clone())),
            Self::Placeholder(v) => put("placeholder", serde_yaml::Value::String(v.clone())),
            Self::Css { css, text } => {
                put("css", serde_yaml::Value::String(css.clone()));
                if let Some(t) = text {
                    put("text", serde_yaml::Value::String(t.clone()));
                }
            }
            Self::Text(v) => put("text", serde_yaml::Value::String(v.clone())),
            Self::Any(candidates) => {
                let items: Result<Vec<_>, _> =
                    candidates.iter().map(serde_yaml::to_value).collect();
                put(
                    "any",
                    serde_yaml::Value::Sequence(items.map_err(serde::ser::Error::custom)?),
                );
            }
        }
        serde_yaml::Value::Mapping(map).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for By {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        parse_by(&value).map_err(DeError::custom)
    }
}

fn parse_by(value: &serde_yaml::Value) -> Result<By, String> {
    let map = value
        .as_mapping()
        .ok_or_else(|| "selector must be a mapping".to_string())?;
    let get_str = |key: &str| -> Result<Option<String>, String> {
        let key = serde_yaml::Value::String(key.to_string());
        match map.get(&key) {
            None => Ok(None),
            Some(serde_yaml::Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => {
                let name = key.as_str().unwrap_or_default();
                Err(format!("selector field '{name}' must be a string, got {other:?}"))
            }
        }
    };

    let known = ["testId", "role", "name", "label", "placeholder", "css", "text", "any"];
    for key in map.keys() {
        let Some(k) = key.as_str() else {
            return Err("selector keys must be strings".to_string());
        };
        if !known.contains(&k) {
            return Err(format!("unknown selector field '{k}'"));
        }
    }

    let any_key = serde_yaml::Value::String("any".to_string());
    if let Some(candidates) = map.get(&any_key) {
        if map.len() != 1 {
            return Err("'any' selector may not carry other fields".to_string());
        }
        let seq = candidates
            .as_sequence()
            .ok_or_else(|| "'any' must be a sequence of selectors".to_string())?;
        let parsed: Result<Vec<By>, String> = seq.iter().map(parse_by).collect();
        return Ok(By::Any(parsed?));
    }
    if let Some(v) = get_str("testId")? {
        return Ok(By::TestId(v));
    }
    if let Some(role) = get_str("role")? {
        return Ok(By::Role {
            role,
            name: get_str("name")?,
        });
    }
    if let Some(v) = get_str("label")? {
        return Ok(By::Label(v));
    }
    if let Some(v) = get_str("placeholder")? {
        return Ok(By::Placeholder(v));
    }
    if let Some(css) = get_str("css")? {
        return Ok(By::Css {
            css,
            text: get_str("text")?,
        });
    }
    if let Some(v) = get_str("text")? {
        return Ok(By::Text(v));
    }
    Err("selector has no recognized discriminating field".to_string())
}
