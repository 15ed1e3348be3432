use crate::config::OutputFormat;
use anyhow::{Context, Result};
use blockq_cache::{SharedCache, TtlCache};
use blockq_core::{QueryResult, TableId, Value};
use blockq_engine::{respond, templates, EngineConfig, OutputFormat as WireFormat, QueryEngine};
use blockq_sources::{
    DataSource, FallbackSource, MockSource, RpcSource, SnapshotSource, SourceRegistry,
};
use colored::Colorize;
use comfy_table::{Cell, Color, Table as ComfyTable};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Wires adapters, cache and engine together. Background tasks (cache sweep,
/// snapshot refresh) are spawned on the current runtime.
pub fn build_engine(config: &EngineConfig) -> Result<Arc<QueryEngine>> {
    let cache: Arc<SharedCache> = Arc::new(TtlCache::new((&config.cache).into()));
    if cache.spawn_sweeper().is_some() {
        info!("Cache sweeper started");
    }

    let sources = Arc::new(build_sources(config)?);
    Ok(Arc::new(QueryEngine::new(sources, cache, config)))
}

fn build_sources(config: &EngineConfig) -> Result<SourceRegistry> {
    let mock: Arc<dyn DataSource> = Arc::new(MockSource::new(seed()));

    let Some(rpc) = &config.rpc else {
        info!("No RPC endpoint configured, serving mock data");
        return Ok(SourceRegistry::with_source_for_all(mock));
    };

    let mut live: Arc<dyn DataSource> =
        Arc::new(RpcSource::new(rpc.clone()).context("Failed to create RPC source")?);

    if let Some(secs) = config.snapshot_max_age_secs {
        let snapshots = Arc::new(SnapshotSource::new(live, Duration::from_secs(secs)));
        snapshots.spawn_refresher();
        live = snapshots;
    }

    info!(url = %rpc.url, "Using live RPC source with mock fallback");
    Ok(SourceRegistry::with_source_for_all(Arc::new(
        FallbackSource::new(live, mock),
    )))
}

fn seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub async fn execute_query(
    engine: &QueryEngine,
    sql: &str,
    owner: &str,
    format: OutputFormat,
    max_rows: usize,
    show_timing: bool,
) -> Result<()> {
    let start = Instant::now();
    let outcome = engine.execute_query(sql, owner).await;

    match format {
        OutputFormat::Table => {
            let result = outcome?;
            print_result_table(&result, max_rows);
            if show_timing {
                print_summary(&result, start.elapsed());
            }
        }
        OutputFormat::Json | OutputFormat::Csv => {
            let wire = if format == OutputFormat::Json {
                WireFormat::Json
            } else {
                WireFormat::Csv
            };
            println!("{}", respond(&outcome, wire).body);
            outcome?;
        }
    }

    Ok(())
}

pub fn print_result_table(result: &QueryResult, max_rows: usize) {
    if result.is_empty() {
        println!("{}", "(no rows)".bright_black());
        return;
    }

    let mut table = ComfyTable::new();
    table.set_header(
        result
            .columns
            .iter()
            .map(|c| Cell::new(c).fg(Color::Cyan))
            .collect::<Vec<_>>(),
    );

    for row in result.rows.iter().take(max_rows) {
        table.add_row(row.iter().map(format_cell).collect::<Vec<_>>());
    }

    println!("{}", table);

    if result.row_count > max_rows {
        println!(
            "{}",
            format!("... {} more rows", result.row_count - max_rows).bright_black()
        );
    }
}

fn format_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::new("NULL").fg(Color::DarkGrey),
        Value::Integer(_) | Value::Float(_) => Cell::new(value).fg(Color::Green),
        other => Cell::new(other),
    }
}

fn print_summary(result: &QueryResult, elapsed: Duration) {
    let mut summary = format!("{} rows in {:.2?}", result.row_count, elapsed);
    if result.degraded {
        summary.push_str(" (degraded: fallback data)");
        println!("{} {}", "⚠".bright_yellow(), summary.bright_yellow());
    } else {
        println!("{} {}", "✓".bright_green(), summary.bright_black());
    }
}

pub fn show_tables() {
    let mut table = ComfyTable::new();
    table.set_header(vec![
        Cell::new("Table").fg(Color::Cyan),
        Cell::new("Columns").fg(Color::Green),
        Cell::new("Description").fg(Color::Yellow),
    ]);

    for id in TableId::ALL {
        table.add_row(vec![
            id.name().to_string(),
            id.schema().len().to_string(),
            id.description().to_string(),
        ]);
    }

    println!("{}", table);
}

pub fn describe_table(name: &str) -> Result<()> {
    let id: TableId = name.parse()?;
    let schema = id.schema();
    let derived: Vec<&str> = id.derived().iter().map(|d| d.name).collect();

    println!("{} {}", "Table:".bright_yellow().bold(), id.name().bright_cyan());

    let mut table = ComfyTable::new();
    table.set_header(vec![
        Cell::new("Column").fg(Color::Cyan),
        Cell::new("Type").fg(Color::Yellow),
        Cell::new("Nullable").fg(Color::Green),
        Cell::new("Derived").fg(Color::Magenta),
    ]);

    for field in schema.fields() {
        table.add_row(vec![
            field.name().to_string(),
            field.data_type().to_string(),
            if field.nullable() { "YES" } else { "NO" }.to_string(),
            if derived.contains(&field.name()) { "YES" } else { "" }.to_string(),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub fn show_templates() {
    let mut table = ComfyTable::new();
    table.set_header(vec![
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Description").fg(Color::Yellow),
        Cell::new("Query").fg(Color::Green),
    ]);

    for template in templates() {
        table.add_row(vec![template.name, template.description, template.query]);
    }

    println!("{}", table);
}
