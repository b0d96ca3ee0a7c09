//! Project configuration.
//!
//! `flowscribe.yaml` at the project root configures directory layout, the
//! external recorder command and the importer's sectioning knobs. Every
//! field is defaulted; a missing file means defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::importer::DEFAULT_SUBMIT_WORDS;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "flowscribe.yaml";

/// Project configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Directory holding scenario files
    #[serde(default = "default_flows_dir")]
    pub flows_dir: PathBuf,

    /// Directory receiving raw recordings
    #[serde(default = "default_recordings_dir")]
    pub recordings_dir: PathBuf,

    /// Directory receiving run artifacts
    #[serde(default = "default_runs_dir")]
    pub runs_dir: PathBuf,

    /// External recorder command; the target URL is appended
    #[serde(default = "default_recorder_command")]
    pub recorder_command: String,

    /// Importer tuning
    #[serde(default)]
    pub import: ImportConfig,
}

/// Importer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfig {
    /// Start a new section when the URL path prefix changes
    #[serde(default = "default_true")]
    pub section_on_url_change: bool,

    /// Lowercased words marking a click as submit-like
    #[serde(default = "default_submit_words")]
    pub submit_words: Vec<String>,
}

fn default_flows_dir() -> PathBuf {
    PathBuf::from("flows")
}
fn default_recordings_dir() -> PathBuf {
    PathBuf::from("recordings")
}
fn default_runs_dir() -> PathBuf {
    PathBuf::from("runs")
}
fn default_recorder_command() -> String {
    "playwright codegen --target python".to_string()
}
const fn default_true() -> bool {
    true
}
fn default_submit_words() -> Vec<String> {
    DEFAULT_SUBMIT_WORDS.iter().map(|s| (*s).to_string()).collect()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            flows_dir: default_flows_dir(),
            recordings_dir: default_recordings_dir(),
            runs_dir: default_runs_dir(),
            recorder_command: default_recorder_command(),
            import: ImportConfig::default(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            section_on_url_change: true,
            submit_words: default_submit_words(),
        }
    }
}

impl ProjectConfig {
    /// Loads the configuration from `dir/flowscribe.yaml`, defaulting every
    /// missing field. A missing file yields the full defaults.
    ///
    /// # Errors
    ///
    /// Returns an error only when the file exists but cannot be parsed.
    pub fn load(dir: &Path) -> Result<Self, SchemaError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|_| SchemaError::MissingFile {
            path: path.clone(),
        })?;
        serde_yaml::from_str(&raw).map_err(|e| SchemaError::ParseError {
            path,
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })
    }

    /// Serializes the default configuration, written by `init`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn default_yaml() -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ProjectConfig::load(tmp.path()).unwrap();
        assert_eq!(config.flows_dir, PathBuf::from("flows"));
        assert!(config.import.section_on_url_change);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "flowsDir: scenarios\nimport:\n  sectionOnUrlChange: false\n",
        )
        .unwrap();
        let config = ProjectConfig::load(tmp.path()).unwrap();
        assert_eq!(config.flows_dir, PathBuf::from("scenarios"));
        assert!(!config.import.section_on_url_change);
        assert!(!config.import.submit_words.is_empty());
    }

    #[test]
    fn default_yaml_roundtrips() {
        let yaml = ProjectConfig::default_yaml().unwrap();
        let back: ProjectConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.recorder_command, default_recorder_command());
    }
}
