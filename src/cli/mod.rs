//! Command-line interface for unit-forge.
//!
//! Provides commands for batch page generation, single-section regeneration
//! and input validation.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
