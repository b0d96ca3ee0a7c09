//! `flowscribe`: record-and-replay test authoring for web UIs.
//!
//! A user demonstrates a browser workflow once; flowscribe captures it,
//! transforms it into a readable, hand-editable YAML scenario, and later
//! replays it deterministically, producing diagnostic artifacts on each
//! run. The browser itself is consumed as a black-box capability behind
//! the [`driver`] traits.

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod importer;
pub mod observability;
pub mod reporter;
pub mod resolver;
pub mod runner;
pub mod scenario;
pub mod steps;
