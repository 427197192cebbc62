//! Subscriber setup
//!
//! Logs go to stderr so stdout carries only the step summary and JSON output.

use crate::config::{CliConfig, LogFormat};
use crate::error::{CliError, CliResult};
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` when set, otherwise the verbosity default
pub fn env_filter(config: &CliConfig) -> CliResult<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)
            .map_err(|e| CliError::logging(format!("invalid RUST_LOG: {e}"))),
        _ => EnvFilter::try_new(config.verbosity.filter_directives())
            .map_err(|e| CliError::logging(e.to_string())),
    }
}

/// Install the global subscriber
pub fn init(config: &CliConfig) -> CliResult<()> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    let installed = match config.log_format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| CliError::logging(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Verbosity;

    #[test]
    fn test_filter_builds_for_every_level() {
        for verbosity in [
            Verbosity::Quiet,
            Verbosity::Normal,
            Verbosity::Verbose,
            Verbosity::Debug,
        ] {
            let config = CliConfig {
                verbosity,
                log_format: LogFormat::Text,
            };
            assert!(EnvFilter::try_new(config.verbosity.filter_directives()).is_ok());
        }
    }
}
