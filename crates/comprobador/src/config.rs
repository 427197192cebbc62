//! CLI configuration

use crate::commands::{Cli, LogFormatArg, TargetArgs};
use comprobar::config::{BOH_BASE_URL_VAR, ENV_VAR};
use comprobar::RunnerConfig;
use serde::{Deserialize, Serialize};

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - warnings and errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - per-poll detail
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Map `-q` and the `-v` count to a level; quiet wins
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Default filter directives for this level
    #[must_use]
    pub const fn filter_directives(self) -> &'static str {
        match self {
            Self::Quiet => "comprobar=warn,comprobador=warn",
            Self::Normal => "comprobar=info,comprobador=info",
            Self::Verbose => "comprobar=debug,comprobador=debug",
            Self::Debug => "comprobar=trace,comprobador=trace",
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// JSON lines
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Log format
    pub log_format: LogFormat,
}

impl CliConfig {
    /// Build from the global flags
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            verbosity: Verbosity::from_flags(cli.quiet, cli.verbose),
            log_format: cli.log_format.into(),
        }
    }
}

/// Resolve the runner configuration; flags win over the process environment
#[must_use]
pub fn resolve_runner_config(target: &TargetArgs) -> RunnerConfig {
    resolve_runner_config_with(target, |key| std::env::var(key).ok())
}

/// Resolve the runner configuration against an arbitrary variable lookup
#[must_use]
pub fn resolve_runner_config_with<F>(target: &TargetArgs, lookup: F) -> RunnerConfig
where
    F: Fn(&str) -> Option<String>,
{
    RunnerConfig::from_lookup(|key| match key {
        ENV_VAR => target
            .environment
            .map(|env| env.as_str().to_string())
            .or_else(|| lookup(key)),
        BOH_BASE_URL_VAR => target.boh_base_url.clone().or_else(|| lookup(key)),
        _ => lookup(key),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use comprobar::Environment;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_from_flags() {
            assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
            assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
            assert_eq!(Verbosity::from_flags(false, 3), Verbosity::Debug);
            assert_eq!(Verbosity::from_flags(true, 2), Verbosity::Quiet);
        }

        #[test]
        fn test_default_directives() {
            assert_eq!(
                Verbosity::Normal.filter_directives(),
                "comprobar=info,comprobador=info"
            );
            assert!(Verbosity::Quiet.is_quiet());
        }
    }

    mod resolve_tests {
        use super::*;

        #[test]
        fn test_environment_variable_used_without_flag() {
            let config =
                resolve_runner_config_with(&TargetArgs::default(), env_of(&[("ENV", "prod")]));
            assert_eq!(config.environment, Environment::Production);
            assert_eq!(config.profile.boh_base_url, "https://boh.hexcloud.cn");
        }

        #[test]
        fn test_flag_beats_environment_variable() {
            let target = TargetArgs {
                environment: Some(Environment::Test),
                boh_base_url: Some("https://boh.internal".to_string()),
            };
            let config = resolve_runner_config_with(
                &target,
                env_of(&[("ENV", "prod"), ("BOH_BASE_URL", "https://ignored")]),
            );
            assert_eq!(config.environment, Environment::Test);
            assert_eq!(config.profile.boh_base_url, "https://boh.internal");
        }

        #[test]
        fn test_unknown_environment_variable_selects_test() {
            let config =
                resolve_runner_config_with(&TargetArgs::default(), env_of(&[("ENV", "staging")]));
            assert_eq!(config.environment, Environment::Test);
        }
    }
}
