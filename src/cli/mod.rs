//! Command-line interface for mlops-pipeline.
//!
//! Provides the workflow entry point (`--step`, `--environment`) and one
//! subcommand per step.

mod commands;

pub use commands::{exit_code, parse_cli, run, run_with_cli, Cli, Commands};
