//! Command handlers

pub mod config;
pub mod history;
pub mod run;

use anyhow::{Context, Result};
use loadbench_config::LoadBenchConfig;
use loadbench_core::RunId;
use loadbench_execution::LoadTestEngine;
use serde::Serialize;

/// Connect to the configured database
pub(crate) async fn open_engine(config: &LoadBenchConfig) -> Result<LoadTestEngine> {
    LoadTestEngine::from_config(config)
        .await
        .with_context(|| format!("Failed to open load test database at {}", config.database.url))
}

pub(crate) fn parse_run_id(raw: &str) -> Result<RunId> {
    raw.parse::<RunId>().map_err(|e| anyhow::anyhow!(e))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let formatted = serde_json::to_string_pretty(value).context("Failed to format result as JSON")?;
    println!("{}", formatted);
    Ok(())
}
