//! Logging setup.
//!
//! Diagnostics go to stderr through `tracing`. The filter directive is
//! derived from the CLI verbosity flags, unless `FLOWSCRIBE_LOG_LEVEL`
//! supplies an explicit one; the renderer is either colored human-readable
//! lines or NDJSON for log collectors.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Environment variable overriding the computed filter directive.
pub const LOG_LEVEL_ENV: &str = "FLOWSCRIBE_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Colored, human-readable lines.
    #[default]
    Human,
    /// Newline-delimited JSON.
    Json,
}

/// Maps a `-v` count onto a filter directive: warn by default, one step
/// per repetition, saturating at trace.
fn directive_for(verbosity: u8) -> &'static str {
    const LEVELS: [&str; 4] = ["warn", "info", "debug", "trace"];
    LEVELS[usize::from(verbosity).min(LEVELS.len() - 1)]
}

/// Installs the global stderr subscriber.
///
/// Safe to call more than once: a later call finds the subscriber already
/// set and becomes a no-op, which keeps test binaries that set up logging
/// per-case working.
pub fn init_logging(format: LogFormat, verbosity: u8) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(directive_for(verbosity)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity > 1)
        .with_writer(std::io::stderr);

    let already_set = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Human => builder
            .with_ansi(std::io::stderr().is_terminal())
            .try_init(),
    };
    let _ = already_set;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_saturates_at_trace() {
        assert_eq!(directive_for(0), "warn");
        assert_eq!(directive_for(1), "info");
        assert_eq!(directive_for(2), "debug");
        assert_eq!(directive_for(3), "trace");
        assert_eq!(directive_for(200), "trace");
    }

    #[test]
    fn repeated_initialization_is_a_no_op() {
        init_logging(LogFormat::Json, 0);
        init_logging(LogFormat::Human, 2);
    }
}
