use anyhow::{Context, Result};
use clap::Parser;
use loadbench_config::{ConfigLoader, LoadBenchConfig, LogLevel};
use std::path::PathBuf;
use tracing::{debug, info};

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};

/// Load configuration from a file, or from environment variables alone
fn load_config(config_path: Option<&PathBuf>) -> Result<LoadBenchConfig> {
    let loader = ConfigLoader::new();
    match config_path {
        Some(path) => loader
            .from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => loader.from_env().context("Failed to load configuration from environment"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level
            .parse::<LogLevel>()
            .map_err(|e| anyhow::anyhow!(e))
            .context("Invalid --log-level")?;
    }
    let _guard = loadbench_logging::init_logging(&config.logging)?;
    debug!(database = %config.database.url, "Configuration loaded");

    match cli.command {
        Some(Commands::Run {
            rows,
            columns,
            date_columns,
            method,
            batch_size,
            seed,
            invalid_date_ratio,
            follow,
        }) => {
            let mut request = loadbench_core::RunRequest::new(rows, columns, date_columns, method);
            request.batch_size = batch_size;
            request.seed = seed;
            request.invalid_date_ratio = invalid_date_ratio;
            commands::run::handle_run(&config, request, follow).await
        }
        Some(Commands::Status { id }) => commands::history::handle_status(&config, &id).await,
        Some(Commands::List {
            status,
            method,
            limit,
            offset,
        }) => {
            commands::history::handle_list(
                &config,
                status.as_deref(),
                method.as_deref(),
                limit,
                offset,
            )
            .await
        }
        Some(Commands::Cancel { id }) => commands::history::handle_cancel(&config, &id).await,
        Some(Commands::Delete { id }) => commands::history::handle_delete(&config, &id).await,
        Some(Commands::Recover) => commands::history::handle_recover(&config).await,
        Some(Commands::Summary { method }) => {
            commands::history::handle_summary(&config, method.as_deref()).await
        }
        Some(Commands::Breakdown) => commands::history::handle_breakdown(&config).await,
        Some(Commands::Rows { id, limit }) => {
            commands::history::handle_rows(&config, &id, limit).await
        }
        Some(Commands::Config { config_cmd }) => match config_cmd {
            ConfigCommands::Validate { config_file } => {
                commands::config::handle_config_validate(&config_file)
            }
            ConfigCommands::Sample => commands::config::handle_config_sample(),
            ConfigCommands::Show { format } => {
                commands::config::handle_config_show(&config, &format)
            }
        },
        None => {
            // If no subcommand is provided, print help
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().context("Failed to print help")?;
            println!();
            info!("No command given");
            Ok(())
        }
    }
}
