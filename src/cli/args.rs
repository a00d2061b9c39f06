//! CLI argument definitions using clap
//!
//! Commands:
//! - aero-analytics init --config <path>
//! - aero-analytics query --config <path> --tenant <id> --data <name>=<file> --sql <text>
//! - aero-analytics health --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::Tier;

/// Tiered analytics query engine
#[derive(Parser, Debug)]
#[command(name = "aero-analytics")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default engine configuration
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./aero-analytics.json")]
        config: PathBuf,
    },

    /// Load datasets, execute a single query and exit
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./aero-analytics.json")]
        config: PathBuf,

        #[arg(long, default_value = "default")]
        tenant: String,

        /// Dataset to load, as <name>=<file.json> (repeatable)
        #[arg(long = "data", value_parser = parse_dataset_arg)]
        data: Vec<(String, PathBuf)>,

        #[arg(long)]
        sql: String,

        /// Force a tier instead of the configured selection
        #[arg(long)]
        tier: Option<Tier>,
    },

    /// Print the engine health report
    Health {
        /// Path to configuration file
        #[arg(long, default_value = "./aero-analytics.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

fn parse_dataset_arg(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
            Ok((name.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(format!("expected <name>=<file.json>, got '{}'", raw)),
    }
}
