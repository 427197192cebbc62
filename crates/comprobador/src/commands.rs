//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use comprobar::Environment;
use std::path::PathBuf;

/// Comprobador: runs back-office verification scenarios in Chromium
#[derive(Parser, Debug)]
#[command(name = "comprobador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (warnings and errors only, no summary)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log line format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daily-demand scenario in Chromium
    Run(RunArgs),

    /// Print the resolved configuration as JSON
    Config(TargetArgs),

    /// List the back-office module paths
    Modules(ModulesArgs),
}

/// Environment selection shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Target environment (falls back to $ENV, then test)
    #[arg(long = "env", value_name = "ENV")]
    pub environment: Option<Environment>,

    /// Back-office base URL override (falls back to $BOH_BASE_URL)
    #[arg(long, value_name = "URL")]
    pub boh_base_url: Option<String>,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Environment selection
    #[command(flatten)]
    pub target: TargetArgs,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers, CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Path to the Chromium binary
    #[arg(long, value_name = "PATH")]
    pub chromium_path: Option<String>,

    /// Write the scenario reports as JSON
    #[arg(long, value_name = "FILE")]
    pub report_json: Option<PathBuf>,

    /// Order number to verify (repeatable)
    #[arg(long = "order-number", value_name = "N")]
    pub order_numbers: Vec<String>,
}

/// Arguments for the modules command
#[derive(Args, Debug)]
pub struct ModulesArgs {
    /// Environment selection
    #[command(flatten)]
    pub target: TargetArgs,

    /// Only list one group (e.g. storeOperations)
    #[arg(long)]
    pub group: Option<String>,
}

/// Log format argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}
