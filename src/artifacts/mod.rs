//! Run artifacts.
//!
//! Owns the per-run directory layout and file naming: screenshots, trace,
//! video, logs, the scenario copy and the environment snapshot. Every byte
//! written through this module passes the secret vault first, so plaintext
//! secret values never reach disk.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::driver::{ConsoleLevel, ConsoleMessage};
use crate::resolver::slug;
use crate::scenario::schema::Viewport;

/// Fixed mask replacing secret values in artifacts.
pub const MASK: &str = "*****";

// ============================================================================
// Secret Vault
// ============================================================================

/// Registry of plaintext values that must never reach an artifact.
///
/// The runner registers every value that flows through a `secret: true`
/// step or variable; [`SecretVault::mask`] replaces all occurrences before
/// any write.
#[derive(Debug, Clone, Default)]
pub struct SecretVault {
    values: Arc<Mutex<Vec<String>>>,
}

impl SecretVault {
    /// Creates an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plaintext secret value. Empty values are ignored.
    pub fn register(&self, value: &str) {
        if value.is_empty() {
            return;
        }
        let mut values = self.lock();
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }

    /// Replaces every registered value occurring in `text` with [`MASK`].
    #[must_use]
    pub fn mask(&self, text: &str) -> String {
        let values = self.lock();
        let mut out = text.to_string();
        for value in values.iter() {
            if out.contains(value.as_str()) {
                out = out.replace(value.as_str(), MASK);
            }
        }
        out
    }

    /// Whether `text` contains any registered value.
    #[must_use]
    pub fn contains_secret(&self, text: &str) -> bool {
        self.lock().iter().any(|v| text.contains(v.as_str()))
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.values.lock().expect("secret vault lock poisoned")
    }
}

// ============================================================================
// Environment Snapshot
// ============================================================================

/// Snapshot written to `env.json`, secrets already masked.
#[derive(Debug, Serialize)]
pub struct EnvSnapshot {
    /// Recorded viewport
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    /// Recorded locale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Recorded timezone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Extra headers applied to the context
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra_headers: IndexMap<String, String>,
    /// Resolved scenario variables
    pub vars: IndexMap<String, String>,
    /// Environment variables referenced during the run
    pub env: IndexMap<String, String>,
}

// ============================================================================
// Artifact Manager
// ============================================================================

/// Owns one `run-YYYYMMDD-HHMMSS` directory and all files inside it.
pub struct ArtifactManager {
    root: PathBuf,
    vault: SecretVault,
    // std Mutex held briefly for buffered writes, never across .await points.
    runner_log: Mutex<Option<BufWriter<File>>>,
}

impl ArtifactManager {
    /// Creates the run directory under `artifacts_root`.
    ///
    /// The directory is named `run-YYYYMMDD-HHMMSS`; on collision a `-2`,
    /// `-3`… suffix is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create(artifacts_root: &Path, vault: SecretVault) -> std::io::Result<Self> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let base = artifacts_root.join(format!("run-{stamp}"));
        let root = unique_dir(&base)?;
        debug!(root = %root.display(), "run directory created");
        Ok(Self {
            root,
            vault,
            runner_log: Mutex::new(None),
        })
    }

    /// The run directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The shared secret vault.
    #[must_use]
    pub fn vault(&self) -> &SecretVault {
        &self.vault
    }

    /// Path of the screenshot for step `ordinal` (1-based) and phase
    /// ("before", "after", "failure"): `screenshots/NNNN_<phase>-<step>.<ext>`.
    #[must_use]
    pub fn screenshot_path(&self, ordinal: usize, phase: &str, step: &str, ext: &str) -> PathBuf {
        let step = sanitize_step_name(step);
        self.root
            .join("screenshots")
            .join(format!("{ordinal:04}_{phase}-{step}.{ext}"))
    }

    /// Writes screenshot bytes, creating `screenshots/` on first use.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn write_screenshot(
        &self,
        ordinal: usize,
        phase: &str,
        step: &str,
        ext: &str,
        bytes: &[u8],
    ) -> std::io::Result<PathBuf> {
        let path = self.screenshot_path(ordinal, phase, step, ext);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Path of the trace archive: `trace/trace.zip`.
    #[must_use]
    pub fn trace_path(&self) -> PathBuf {
        self.root.join("trace").join("trace.zip")
    }

    /// Video directory: `video/`.
    #[must_use]
    pub fn video_dir(&self) -> PathBuf {
        self.root.join("video")
    }

    /// Appends a masked line to `logs/runner.log`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    ///
    /// # Panics
    ///
    /// Panics if the internal log mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn log_line(&self, line: &str) -> std::io::Result<()> {
        let masked = self.vault.mask(line);
        let mut guard = self.runner_log.lock().expect("runner log lock poisoned");
        if guard.is_none() {
            let dir = self.root.join("logs");
            std::fs::create_dir_all(&dir)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("runner.log"))?;
            *guard = Some(BufWriter::new(file));
        }
        if let Some(writer) = guard.as_mut() {
            writeln!(writer, "{masked}")?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Writes drained console messages to `logs/console.log`, masked.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn write_console_log(&self, messages: &[ConsoleMessage]) -> std::io::Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let dir = self.root.join("logs");
        std::fs::create_dir_all(&dir)?;
        let mut out = String::new();
        for m in messages {
            let level = match m.level {
                ConsoleLevel::Log => "log",
                ConsoleLevel::Warning => "warning",
                ConsoleLevel::Error => "error",
            };
            out.push_str(&format!("[{level}] {}\n", self.vault.mask(&m.text)));
        }
        let path = dir.join("console.log");
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(out.as_bytes())
    }

    /// Writes the scenario copy to `flow.yaml`, masked.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn write_scenario_copy(&self, yaml: &str) -> std::io::Result<()> {
        std::fs::write(self.root.join("flow.yaml"), self.vault.mask(yaml))
    }

    /// Writes the environment snapshot to `env.json`.
    ///
    /// The snapshot is expected to be pre-masked per secret flag; the vault
    /// pass here is a second barrier.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or I/O failure.
    pub fn write_env_snapshot(&self, snapshot: &EnvSnapshot) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(self.root.join("env.json"), self.vault.mask(&json))
    }

    /// Writes a masked DOM dump to `logs/dom-NNNN.html`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn write_dom_dump(&self, ordinal: usize, html: &str) -> std::io::Result<PathBuf> {
        let dir = self.root.join("logs");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("dom-{ordinal:04}.html"));
        std::fs::write(&path, self.vault.mask(html))?;
        Ok(path)
    }

    /// Removes the trace archive (success with `on_failure` policy).
    pub fn discard_trace(&self) {
        let path = self.trace_path();
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }

    /// Removes recorded videos (success with `on_failure` policy).
    pub fn discard_video(&self) {
        let dir = self.video_dir();
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return;
        };
        for entry in entries.filter_map(Result::ok) {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}

/// Sanitizes a step name for use in a filename: kebab-case, leading
/// alphabetic character guaranteed.
fn sanitize_step_name(step: &str) -> String {
    let s = slug(step);
    if s.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        s
    } else {
        format!("step-{s}")
    }
}

fn unique_dir(base: &Path) -> std::io::Result<PathBuf> {
    if let Some(parent) = base.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // create_dir (not create_dir_all) fails on an existing directory, which
    // is exactly the collision signal we want.
    if std::fs::create_dir(base).is_ok() {
        return Ok(base.to_path_buf());
    }
    for n in 2..100 {
        let candidate = PathBuf::from(format!("{}-{n}", base.display()));
        if std::fs::create_dir(&candidate).is_ok() {
            return Ok(candidate);
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("cannot create unique run dir near {}", base.display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vault_masks_all_occurrences() {
        let vault = SecretVault::new();
        vault.register("hunter2");
        let masked = vault.mask("pw=hunter2 again hunter2");
        assert!(!masked.contains("hunter2"));
        assert_eq!(masked, format!("pw={MASK} again {MASK}"));
    }

    #[test]
    fn vault_ignores_empty() {
        let vault = SecretVault::new();
        vault.register("");
        assert_eq!(vault.mask("unchanged"), "unchanged");
    }

    #[test]
    fn screenshot_names_are_zero_padded_kebab() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = ArtifactManager::create(tmp.path(), SecretVault::new()).unwrap();
        let path = mgr.screenshot_path(3, "before", "click-sign-in", "jpeg");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, "0003_before-click-sign-in.jpeg");

        // Unnamed steps fall back to their (camelCase) type name, which the
        // sanitizer lowercases so filenames stay shell-friendly.
        let path = mgr.screenshot_path(12, "before", "waitForVisible", "png");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, "0012_before-waitforvisible.png");
    }

    #[test]
    fn run_dir_collision_gets_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let a = ArtifactManager::create(tmp.path(), SecretVault::new()).unwrap();
        let b = ArtifactManager::create(tmp.path(), SecretVault::new()).unwrap();
        assert_ne!(a.root(), b.root());
        assert!(b.root().display().to_string().contains("run-"));
    }

    #[test]
    fn log_line_is_masked() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = SecretVault::new();
        vault.register("s3cret");
        let mgr = ArtifactManager::create(tmp.path(), vault).unwrap();
        mgr.log_line("filling password with s3cret").unwrap();
        let content = std::fs::read_to_string(mgr.root().join("logs/runner.log")).unwrap();
        assert!(!content.contains("s3cret"));
        assert!(content.contains(MASK));
    }

    #[test]
    fn env_snapshot_is_masked() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = SecretVault::new();
        vault.register("hunter2");
        let mgr = ArtifactManager::create(tmp.path(), vault).unwrap();
        let mut env = IndexMap::new();
        env.insert("PASSWORD".to_string(), "hunter2".to_string());
        mgr.write_env_snapshot(&EnvSnapshot {
            viewport: None,
            locale: Some("ja-JP".to_string()),
            timezone: None,
            extra_headers: IndexMap::new(),
            vars: IndexMap::new(),
            env,
        })
        .unwrap();
        let content = std::fs::read_to_string(mgr.root().join("env.json")).unwrap();
        assert!(!content.contains("hunter2"));
        assert!(content.contains(MASK));
        assert!(content.contains("ja-JP"));
    }
}
