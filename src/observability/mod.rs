//! Logging and diagnostics plumbing.

pub mod logging;
