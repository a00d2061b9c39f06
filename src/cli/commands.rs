//! CLI command implementations
//!
//! Commands are one-shot: each builds an engine from the configuration
//! file, does its work and stops the engine before returning.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::engine::{
    AnalyticsStorageEngine, EngineBuilder, EngineConfig, QueryOptions, QueryResult, Tier,
};
use crate::query::Query;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_dataset, write_response};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Query {
            config,
            tenant,
            data,
            sql,
            tier,
        } => query(&config, &tenant, &data, &sql, tier),
        Command::Health { config } => health(&config),
    }
}

/// Write a default configuration file
pub fn init(config_path: &Path) -> CliResult<()> {
    if config_path.exists() {
        return Err(CliError::already_initialized(config_path.display()));
    }

    EngineConfig::default().write_to(config_path)?;
    write_response(json!({
        "initialized": true,
        "config": config_path.display().to_string(),
    }))
}

/// Load datasets into both tiers and run one query
pub fn query(
    config_path: &Path,
    tenant: &str,
    data: &[(String, PathBuf)],
    sql: &str,
    tier: Option<Tier>,
) -> CliResult<()> {
    let engine = boot(config_path)?;
    let runtime = runtime()?;

    let outcome = runtime.block_on(async {
        engine.start().await?;
        let result = run_query(&engine, tenant, data, sql, tier).await;
        engine.stop().await;
        result
    });

    write_response(result_json(&outcome?))
}

/// Print the health report of a freshly started engine
pub fn health(config_path: &Path) -> CliResult<()> {
    let engine = boot(config_path)?;
    let runtime = runtime()?;

    let report = runtime.block_on(async {
        engine.start().await?;
        let report = engine.get_health_status();
        engine.stop().await;
        Ok::<_, CliError>(report)
    })?;

    write_response(serde_json::to_value(report)?)
}

fn boot(config_path: &Path) -> CliResult<Arc<AnalyticsStorageEngine>> {
    let config = EngineConfig::from_file(config_path)?;
    Ok(EngineBuilder::new(config).build()?)
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::io_error(format!("Failed to create tokio runtime: {}", e)))
}

async fn run_query(
    engine: &AnalyticsStorageEngine,
    tenant: &str,
    data: &[(String, PathBuf)],
    sql: &str,
    tier: Option<Tier>,
) -> CliResult<QueryResult> {
    for (name, path) in data {
        let records = read_dataset(path)?;
        engine.load_dataset(tenant, name, records.clone())?;
        if engine.distributed().is_initialized() {
            engine.distribute_dataset(tenant, name, records).await?;
        }
    }

    let mut options = QueryOptions::default();
    if let Some(tier) = tier {
        options = options.with_tier(tier);
    }
    Ok(engine.execute_query(Query::new(sql), tenant, options).await?)
}

fn result_json(result: &QueryResult) -> Value {
    json!({
        "id": result.id,
        "tenant_id": result.tenant_id,
        "rows": result.rows(),
        "columns": result.columns(),
        "row_count": result.row_count(),
        "execution_time_ms": result.execution_time_ms,
        "cached": result.cached,
        "metadata": result.metadata,
    })
}
