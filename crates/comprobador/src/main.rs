//! Comprobador CLI: back-office verification in Chromium
//!
//! ## Usage
//!
//! ```bash
//! comprobador run                              # Verify the default order on QA
//! comprobador run --env prod --order-number N  # Verify order N in production
//! comprobador config                           # Print the resolved configuration
//! comprobador modules --group storeOperations  # List module URLs
//! ```

use clap::Parser;
use comprobador::{
    logging, resolve_runner_config, runner, Cli, CliConfig, CliResult, Commands, ModulesArgs,
    RunArgs,
};
use comprobar::{render_summary, RunnerConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let cli_config = CliConfig::from_cli(&cli);
    logging::init(&cli_config)?;

    match cli.command {
        Commands::Run(args) => run_scenarios(&cli_config, &args),
        Commands::Config(target) => {
            let config = resolve_runner_config(&target);
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Modules(args) => {
            run_modules(&args);
            Ok(())
        }
    }
}

fn run_modules(args: &ModulesArgs) {
    let config = resolve_runner_config(&args.target);
    for (group, key, path) in config.modules.iter() {
        if args.group.as_deref().map_or(true, |g| g == group) {
            let url = comprobar::config::full_url(&config.profile.boh_base_url, path);
            println!("{group}.{key}\t{url}");
        }
    }
}

fn run_scenarios(cli_config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let config = resolve_runner_config(&args.target);
    tracing::info!(
        environment = %config.environment,
        boh = %config.profile.boh_base_url,
        "configuration resolved"
    );
    let expectations = runner::expectations_for(&args.order_numbers);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let reports = runtime.block_on(launch(args, &config, expectations))?;

    if !cli_config.verbosity.is_quiet() {
        for report in &reports {
            println!("{}", render_summary(report));
        }
    }
    if let Some(path) = &args.report_json {
        runner::write_reports(path, &reports)?;
    }
    runner::overall_result(&reports)
}

#[cfg(feature = "browser")]
async fn launch(
    args: &RunArgs,
    config: &RunnerConfig,
    expectations: Vec<comprobar::DailyDemandExpectations>,
) -> CliResult<Vec<comprobar::ScenarioReport>> {
    runner::run_in_chromium(args, config, expectations).await
}

#[cfg(not(feature = "browser"))]
async fn launch(
    _args: &RunArgs,
    _config: &RunnerConfig,
    _expectations: Vec<comprobar::DailyDemandExpectations>,
) -> CliResult<Vec<comprobar::ScenarioReport>> {
    Err(comprobador::CliError::config(
        "browser support not enabled. Rebuild with --features browser",
    ))
}
