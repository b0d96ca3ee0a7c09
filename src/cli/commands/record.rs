//! `record` command: invoke the external recorder, then import.
//!
//! The recorder is an external executable configured as
//! `recorderCommand`; its output lands under `recordings/raw_<slug>.py`.
//! Unless `--no-import` is given, the importer runs immediately after a
//! successful recording. An import failure leaves the raw recording in
//! place and exits nonzero; the recording itself is never rolled back.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::cli::args::RecordArgs;
use crate::config::ProjectConfig;
use crate::error::{FlowscribeError, SchemaError};
use crate::importer::{self, ImportOptions, naming};
use crate::scenario::loader;

/// Runs the recorder and (by default) the importer.
///
/// # Errors
///
/// Returns an error if the recorder command is malformed or cannot be
/// spawned.
pub async fn execute(args: &RecordArgs) -> Result<i32, FlowscribeError> {
    let config = ProjectConfig::load(Path::new("."))?;
    std::fs::create_dir_all(&config.recordings_dir)?;

    let slug = args.slug.clone().unwrap_or_else(|| {
        args.url
            .as_deref()
            .map_or_else(|| "session".to_string(), naming::object_for_url)
    });
    let recording = unique_path(&config.recordings_dir, &slug);

    let mut parts =
        shlex::split(&config.recorder_command).ok_or_else(|| SchemaError::InvalidValue {
            field: "recorderCommand".to_string(),
            value: config.recorder_command.clone(),
            expected: "a shell-splittable command line".to_string(),
        })?;
    if parts.is_empty() {
        return Err(SchemaError::InvalidValue {
            field: "recorderCommand".to_string(),
            value: config.recorder_command.clone(),
            expected: "a non-empty command".to_string(),
        }
        .into());
    }
    parts.push("-o".to_string());
    parts.push(recording.display().to_string());
    if let Some(url) = &args.url {
        parts.push(url.clone());
    }

    info!(command = %parts.join(" "), "launching recorder");
    let status = tokio::process::Command::new(&parts[0])
        .args(&parts[1..])
        .status()
        .await?;
    if !status.success() {
        eprintln!("recorder exited with {status}");
        return Ok(1);
    }
    println!("recorded {}", recording.display());

    if args.no_import {
        return Ok(0);
    }

    // Auto-import. Failure keeps the recording and reports the error.
    let options = ImportOptions {
        section_on_url_change: config.import.section_on_url_change,
        submit_words: config.import.submit_words.clone(),
        ..ImportOptions::default()
    };
    match importer::import_file(&recording, &options) {
        Ok(result) => {
            std::fs::create_dir_all(&config.flows_dir)?;
            let dest = config.flows_dir.join(format!("{slug}.yaml"));
            std::fs::write(&dest, loader::dump(&result.scenario)?)?;
            for diagnostic in &result.diagnostics {
                eprintln!(
                    "line {}: {}",
                    diagnostic.line, diagnostic.message
                );
            }
            println!("imported {}", dest.display());
            Ok(0)
        }
        Err(e) => {
            eprintln!("import failed ({e}); the raw recording is kept at {}", recording.display());
            Ok(1)
        }
    }
}

fn unique_path(dir: &Path, slug: &str) -> PathBuf {
    let base = dir.join(format!("raw_{slug}.py"));
    if !base.exists() {
        return base;
    }
    for n in 2..1000 {
        let candidate = dir.join(format!("raw_{slug}-{n}.py"));
        if !candidate.exists() {
            return candidate;
        }
    }
    base
}
