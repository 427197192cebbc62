//! Scenario execution for the `run` command

use crate::error::{CliError, CliResult};
use comprobar::{
    daily_demand_scenario, DailyDemandExpectations, PageDriver, RunnerConfig, ScenarioReport,
    ScenarioRunner, StepReporter,
};
use std::path::Path;
use tracing::info;

/// Expectations for each requested order; none means the built-in order
#[must_use]
pub fn expectations_for(order_numbers: &[String]) -> Vec<DailyDemandExpectations> {
    if order_numbers.is_empty() {
        return vec![DailyDemandExpectations::default()];
    }
    order_numbers
        .iter()
        .map(|n| DailyDemandExpectations::default().with_order_number(n.as_str()))
        .collect()
}

/// Run the daily-demand scenario once per expectation on the same page
pub async fn execute<D: PageDriver + 'static>(
    page: &mut D,
    config: &RunnerConfig,
    expectations: Vec<DailyDemandExpectations>,
    reporter: &mut dyn StepReporter,
) -> Vec<ScenarioReport> {
    let mut reports = Vec::with_capacity(expectations.len());
    for expectation in expectations {
        let order = expectation.order.order_number.clone();
        let report =
            ScenarioRunner::run(daily_demand_scenario(expectation), page, config, reporter).await;
        info!(order = %order, passed = report.passed, "scenario finished");
        reports.push(report);
    }
    reports
}

/// Write the reports as a pretty JSON array
pub fn write_reports(path: &Path, reports: &[ScenarioReport]) -> CliResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(reports)?)?;
    info!(path = %path.display(), "report written");
    Ok(())
}

/// `Ok` when every scenario passed, otherwise the first failure
pub fn overall_result(reports: &[ScenarioReport]) -> CliResult<()> {
    match reports.iter().find(|r| !r.passed) {
        None => Ok(()),
        Some(report) => {
            let message = report.failed_step().map_or_else(
                || format!("{} did not complete", report.name),
                |step| {
                    format!(
                        "{}: step {} ({}) failed",
                        report.name,
                        step.index + 1,
                        step.label
                    )
                },
            );
            Err(CliError::scenario_failed(message))
        }
    }
}

#[cfg(feature = "browser")]
pub use chromium::run_in_chromium;

#[cfg(feature = "browser")]
mod chromium {
    use super::execute;
    use crate::commands::RunArgs;
    use crate::error::CliResult;
    use comprobar::{
        BrowserOptions, ChromiumSession, DailyDemandExpectations, RunnerConfig, ScenarioReport,
        TracingReporter,
    };
    use tracing::warn;

    /// Launch Chromium, run every scenario, close the browser
    pub async fn run_in_chromium(
        args: &RunArgs,
        config: &RunnerConfig,
        expectations: Vec<DailyDemandExpectations>,
    ) -> CliResult<Vec<ScenarioReport>> {
        let mut options = BrowserOptions::default()
            .with_headless(!args.headed)
            .with_no_sandbox(args.no_sandbox);
        if let Some(path) = &args.chromium_path {
            options = options.with_chromium_path(path.as_str());
        }

        let session = ChromiumSession::launch(options).await?;
        let reports = match session.new_page().await {
            Ok(mut page) => Ok(execute(&mut page, config, expectations, &mut TracingReporter).await),
            Err(e) => Err(e),
        };
        if let Err(e) = session.close().await {
            warn!(error = %e, "browser did not close cleanly");
        }
        Ok(reports?)
    }
}
