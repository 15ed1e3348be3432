use anyhow::Result;
use blockq_sources::RpcConfig;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod repl;

use commands::*;
use config::{Config, OutputFormat};
use repl::Repl;

#[derive(Parser)]
#[command(name = "blockq")]
#[command(author, version, about = "blockq - query engine for blockchain analytics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BLOCKQ_CONFIG")]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint for live data; mock data is served without it
    #[arg(long, global = true, env = "BLOCKQ_RPC_URL")]
    rpc_url: Option<String>,

    /// Address whose signatures back the transactions table
    #[arg(long, global = true, env = "BLOCKQ_TRACKED_ADDRESS")]
    tracked_address: Option<String>,

    /// Identity that history and saved queries are recorded under
    #[arg(long, global = true, env = "BLOCKQ_OWNER", default_value = "local")]
    owner: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL
    Repl,

    /// Execute a query
    Query {
        /// Query to execute
        #[arg(short, long)]
        sql: String,

        /// Output format (table, json, csv)
        #[arg(short, long)]
        format: Option<OutputFormat>,
    },

    /// List virtual tables
    Tables,

    /// Describe table schema
    Describe {
        /// Table name
        table: String,
    },

    /// List query templates
    Templates,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };
    apply_overrides(&mut config, &cli);

    match cli.command {
        Some(Commands::Query { sql, format }) => {
            let engine = build_engine(&config.engine)?;
            let format = format.unwrap_or(config.output_format);
            execute_query(
                &engine,
                &sql,
                &cli.owner,
                format,
                config.max_rows,
                config.show_timing,
            )
            .await?;
        }
        Some(Commands::Tables) => show_tables(),
        Some(Commands::Describe { table }) => describe_table(&table)?,
        Some(Commands::Templates) => show_templates(),
        Some(Commands::Repl) | None => {
            print_banner();
            let engine = build_engine(&config.engine)?;
            let mut repl = Repl::new(config, engine, cli.owner)?;
            repl.run().await?;
        }
    }

    Ok(())
}

/// Flags and environment win over the config file.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.rpc_url {
        config.engine.rpc.get_or_insert_with(RpcConfig::default).url = url.clone();
    }
    if let Some(address) = &cli.tracked_address {
        if let Some(rpc) = config.engine.rpc.as_mut() {
            rpc.tracked_address = Some(address.clone());
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        "blockq_cli=debug,blockq_engine=debug,blockq_executor=debug,blockq_sources=debug,blockq_cache=debug,blockq_parser=debug"
    } else {
        "blockq_cli=info,blockq_sources=warn,blockq_engine=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
  _     _            _
 | |__ | | ___   ___| | ____ _
 | '_ \| |/ _ \ / __| |/ / _` |
 | |_) | | (_) | (__|   < (_| |
 |_.__/|_|\___/ \___|_|\_\__, |
                            |_|
    "#
        .bright_cyan()
    );
    println!(
        "{}",
        "Blockchain analytics query engine v0.1.0".bright_yellow()
    );
}
