//! CLI module for aero-analytics
//!
//! Provides command-line interface for:
//! - init: Write a default configuration
//! - query: One-shot query over JSON dataset files
//! - health: Engine health report

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{health, init, query, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_dataset, write_response};
