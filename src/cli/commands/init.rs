//! `init` command: materialize the project folder layout.

use crate::cli::args::InitArgs;
use crate::config::{CONFIG_FILE, ProjectConfig};
use crate::error::FlowscribeError;

/// Creates the standard directories and a default configuration file.
/// Existing files are left untouched.
///
/// # Errors
///
/// Returns an error on I/O failure.
pub fn execute(args: &InitArgs) -> Result<i32, FlowscribeError> {
    let config = ProjectConfig::default();
    for dir in [&config.flows_dir, &config.recordings_dir, &config.runs_dir] {
        let path = args.dir.join(dir);
        std::fs::create_dir_all(&path)?;
        println!("created {}", path.display());
    }

    let config_path = args.dir.join(CONFIG_FILE);
    if config_path.exists() {
        println!("kept existing {}", config_path.display());
    } else {
        std::fs::write(&config_path, ProjectConfig::default_yaml()?)?;
        println!("created {}", config_path.display());
    }
    Ok(0)
}
