//! Comprobador CLI Library
//!
//! Command-line interface for the Comprobar verification engine.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod logging;
pub mod runner;

pub use commands::{Cli, Commands, LogFormatArg, ModulesArgs, RunArgs, TargetArgs};
pub use config::{
    resolve_runner_config, resolve_runner_config_with, CliConfig, LogFormat, Verbosity,
};
pub use error::{CliError, CliResult};
