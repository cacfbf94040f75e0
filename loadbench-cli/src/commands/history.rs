use anyhow::{Context, Result};
use loadbench_config::LoadBenchConfig;
use loadbench_core::{LoadTestRun, MethodKind, RunResource, RunStatus};
use loadbench_storage::{Pagination, RunFilters};
use serde_json::json;
use tracing::info;

use super::{open_engine, parse_run_id, print_json};

fn parse_method(raw: Option<&str>) -> Result<Option<MethodKind>> {
    raw.map(|m| m.parse::<MethodKind>().map_err(|e| anyhow::anyhow!(e)))
        .transpose()
}

pub async fn handle_status(config: &LoadBenchConfig, id: &str) -> Result<()> {
    let engine = open_engine(config).await?;
    let run = engine.get_run(parse_run_id(id)?).await?;
    print_json(&run.to_resource())
}

pub async fn handle_list(
    config: &LoadBenchConfig,
    status: Option<&str>,
    method: Option<&str>,
    limit: u64,
    offset: u64,
) -> Result<()> {
    let filters = RunFilters {
        status: status
            .map(|s| s.parse::<RunStatus>().map_err(|e| anyhow::anyhow!(e)))
            .transpose()?,
        method: parse_method(method)?,
    };
    let engine = open_engine(config).await?;
    let page = engine.list_runs(filters, Pagination { limit, offset }).await?;
    let items: Vec<RunResource> = page.items.iter().map(LoadTestRun::to_resource).collect();
    print_json(&json!({
        "items": items,
        "total": page.total,
        "limit": page.limit,
        "offset": page.offset,
    }))
}

pub async fn handle_cancel(config: &LoadBenchConfig, id: &str) -> Result<()> {
    let engine = open_engine(config).await?;
    let id = parse_run_id(id)?;
    let requested = engine.cancel_run(id).await?;
    if !requested {
        info!(run_id = %id, "Run already finished; nothing to cancel");
    }
    let run = engine.wait(id).await?;
    print_json(&json!({ "cancelRequested": requested, "run": run.to_resource() }))
}

/// Fail runs whose owning process stopped renewing its lease
pub async fn handle_recover(config: &LoadBenchConfig) -> Result<()> {
    let engine = open_engine(config).await?;
    let failed = engine.recover().await?;
    print_json(&json!({ "failed": failed }))
}

pub async fn handle_delete(config: &LoadBenchConfig, id: &str) -> Result<()> {
    let engine = open_engine(config).await?;
    let id = parse_run_id(id)?;
    engine
        .delete_run(id)
        .await
        .with_context(|| format!("Failed to delete run {}", id))?;
    print_json(&json!({ "deleted": id }))
}

pub async fn handle_summary(config: &LoadBenchConfig, method: Option<&str>) -> Result<()> {
    let method = parse_method(method)?;
    let engine = open_engine(config).await?;
    match engine.summarize(method).await? {
        Some(summary) => print_json(&summary),
        None => print_json(&json!({ "message": "No completed runs yet" })),
    }
}

pub async fn handle_breakdown(config: &LoadBenchConfig) -> Result<()> {
    let engine = open_engine(config).await?;
    print_json(&engine.strategy_breakdown().await?)
}

pub async fn handle_rows(config: &LoadBenchConfig, id: &str, limit: u64) -> Result<()> {
    let engine = open_engine(config).await?;
    let id = parse_run_id(id)?;
    let total = engine.row_count(id).await?;
    let rows: Vec<_> = engine
        .rows(id, limit)
        .await?
        .into_iter()
        .map(|row| {
            let values: serde_json::Map<String, serde_json::Value> = row
                .values
                .into_iter()
                .map(|(column, value)| {
                    let value = value.map_or(serde_json::Value::Null, serde_json::Value::String);
                    (column, value)
                })
                .collect();
            json!({ "ordinal": row.ordinal, "values": values })
        })
        .collect();
    print_json(&json!({ "total": total, "rows": rows }))
}
