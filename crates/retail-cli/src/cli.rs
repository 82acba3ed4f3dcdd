//! Command-line arguments for `retail-etl`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use retail_model::LoadPolicy;

use retail_cli::config::PASSWORD_ENV;

#[derive(Parser)]
#[command(
    name = "retail-etl",
    version,
    about = "Retail ETL - reconcile store extracts into a sales fact table",
    long_about = "Read the retail CSV extracts, normalize their dates, assemble the\n\
                  fact_sales relation and load dimensions and facts into the warehouse."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for humans, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow row values (dates, keys) in trace output.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the full pipeline over a directory of extracts.
    Run(RunArgs),

    /// Print the warehouse DDL.
    Schema,
}

#[derive(Parser)]
pub struct RunArgs {
    /// Directory holding the eight extract CSV files.
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Output directory for fact_sales.csv and the load report (default: <DATA_DIR>/output).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// JSON configuration file; flags below override its values.
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Load into an in-memory warehouse instead of PostgreSQL.
    #[arg(long = "dry-run", conflicts_with = "no_load")]
    pub dry_run: bool,

    /// Stop after writing fact_sales.csv.
    #[arg(long = "no-load")]
    pub no_load: bool,

    /// What a table load does after a rejected row.
    #[arg(long = "policy", value_enum)]
    pub policy: Option<PolicyArg>,

    /// Refuse tables whose source lacks destination columns.
    #[arg(long = "require-columns")]
    pub require_columns: bool,

    /// Deadline for each table batch, in milliseconds.
    #[arg(long = "batch-timeout-ms", value_name = "MS")]
    pub batch_timeout_ms: Option<u64>,

    #[arg(long = "warehouse-host", value_name = "HOST")]
    pub warehouse_host: Option<String>,

    #[arg(long = "warehouse-port", value_name = "PORT")]
    pub warehouse_port: Option<u16>,

    /// Database (service) name.
    #[arg(long = "warehouse-service", value_name = "NAME")]
    pub warehouse_service: Option<String>,

    #[arg(long = "warehouse-user", value_name = "USER")]
    pub warehouse_user: Option<String>,

    #[arg(
        long = "warehouse-password",
        value_name = "PASSWORD",
        env = PASSWORD_ENV,
        hide_env_values = true
    )]
    pub warehouse_password: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// Stop the table at the first rejected row, keep the rows before it.
    FailFast,
    /// Record the rejected row and continue.
    SkipAndContinue,
}

impl From<PolicyArg> for LoadPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::FailFast => Self::FailFast,
            PolicyArg::SkipAndContinue => Self::SkipAndContinue,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
