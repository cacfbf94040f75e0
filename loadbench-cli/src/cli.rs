//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a load test run and wait for it to finish
    Run {
        /// Number of rows to generate
        #[arg(long, value_name = "N")]
        rows: u64,

        /// Total column count (10-200)
        #[arg(long, value_name = "N", default_value_t = 10)]
        columns: u32,

        /// How many of the columns hold dates
        #[arg(long, value_name = "N", default_value_t = 0)]
        date_columns: u32,

        /// Insert method: single_row, batched
        #[arg(long, value_name = "METHOD", default_value = "batched")]
        method: String,

        /// Rows per transaction for the batched method
        #[arg(long, value_name = "N")]
        batch_size: Option<u32>,

        /// Seed for reproducible datasets
        #[arg(long, value_name = "N")]
        seed: Option<u64>,

        /// Share of date cells rendered unparseable (0.0-1.0)
        #[arg(long, value_name = "RATIO")]
        invalid_date_ratio: Option<f64>,

        /// Print progress snapshots while the run executes
        #[arg(long)]
        follow: bool,
    },

    /// Show one run
    Status {
        /// Run identifier
        id: String,
    },

    /// List run history, newest first
    List {
        /// Filter by status: pending, running, completed, failed, cancelled
        #[arg(long, value_name = "STATUS")]
        status: Option<String>,

        /// Filter by method: single_row, batched
        #[arg(long, value_name = "METHOD")]
        method: Option<String>,

        #[arg(long, value_name = "N", default_value_t = 20)]
        limit: u64,

        #[arg(long, value_name = "N", default_value_t = 0)]
        offset: u64,
    },

    /// Request cancellation of a run
    Cancel {
        /// Run identifier
        id: String,
    },

    /// Delete a run and its rows
    Delete {
        /// Run identifier
        id: String,
    },

    /// Fail runs abandoned by a process that stopped without finishing them
    Recover,

    /// Aggregate performance over completed runs
    Summary {
        /// Restrict to one method: single_row, batched
        #[arg(long, value_name = "METHOD")]
        method: Option<String>,
    },

    /// Per method and batch size comparison
    Breakdown,

    /// Show committed rows of a run
    Rows {
        /// Run identifier
        id: String,

        #[arg(long, value_name = "N", default_value_t = 10)]
        limit: u64,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Print a sample configuration with every default filled in
    Sample,

    /// Show current configuration in use
    Show {
        /// Output format: yaml, json
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::parse_from(["loadbench", "run", "--rows", "1000"]);
        match cli.command {
            Some(Commands::Run {
                rows,
                columns,
                date_columns,
                method,
                batch_size,
                follow,
                ..
            }) => {
                assert_eq!(rows, 1000);
                assert_eq!(columns, 10);
                assert_eq!(date_columns, 0);
                assert_eq!(method, "batched");
                assert_eq!(batch_size, None);
                assert!(!follow);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from([
            "loadbench",
            "list",
            "--config",
            "bench.yaml",
            "--status",
            "failed",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("bench.yaml")));
        assert!(matches!(
            cli.command,
            Some(Commands::List { status: Some(ref s), .. }) if s == "failed"
        ));
    }

    #[test]
    fn test_recover_takes_no_arguments() {
        let cli = Cli::parse_from(["loadbench", "recover"]);
        assert!(matches!(cli.command, Some(Commands::Recover)));
        assert!(Cli::try_parse_from(["loadbench", "recover", "abc"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
