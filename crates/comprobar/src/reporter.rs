//! Reporter - scenario step boundaries
//!
//! The runner calls a [`StepReporter`] on every step entry and exit. Two
//! implementations ship with the crate: [`TracingReporter`] logs the
//! boundaries, [`CollectingReporter`] records them for assertions.
//!
//! ```text
//! on_scenario_start ─► on_step_start ─► on_step_end ─► ... ─► on_scenario_end
//! ```

use crate::scenario::{ScenarioReport, StepOutcome, StepRecord};
use std::fmt::Write as _;
use tracing::{error, info, warn};

/// Hooks invoked by [`crate::scenario::ScenarioRunner`]
///
/// Every method defaults to a no-op.
pub trait StepReporter: Send {
    /// A scenario is about to run `steps` steps
    fn on_scenario_start(&mut self, _name: &str, _steps: usize) {}

    /// Step `index` is starting
    fn on_step_start(&mut self, _index: usize, _label: &str) {}

    /// A step reached a terminal outcome (including `Skipped`)
    fn on_step_end(&mut self, _record: &StepRecord) {}

    /// The scenario finished
    fn on_scenario_end(&mut self, _report: &ScenarioReport) {}
}

/// Reporter that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl StepReporter for NullReporter {}

/// Reporter that logs step boundaries through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl StepReporter for TracingReporter {
    fn on_scenario_start(&mut self, name: &str, steps: usize) {
        info!(scenario = name, steps, "scenario started");
    }

    fn on_step_start(&mut self, index: usize, label: &str) {
        info!(step = index + 1, label, "step started");
    }

    fn on_step_end(&mut self, record: &StepRecord) {
        let duration_ms = u64::try_from(record.duration.as_millis()).unwrap_or(u64::MAX);
        match record.outcome {
            StepOutcome::Passed => {
                info!(step = record.index + 1, label = %record.label, duration_ms, "step passed");
            }
            StepOutcome::Failed => {
                let reason = record
                    .diagnostics
                    .as_ref()
                    .map_or("", |d| d.error.as_str());
                error!(step = record.index + 1, label = %record.label, duration_ms, reason, "step failed");
            }
            StepOutcome::Skipped => {
                warn!(step = record.index + 1, label = %record.label, "step skipped");
            }
            StepOutcome::Pending => {}
        }
    }

    fn on_scenario_end(&mut self, report: &ScenarioReport) {
        if report.passed {
            info!(scenario = %report.name, "scenario completed");
        } else {
            error!(scenario = %report.name, state = %report.state, "scenario aborted");
        }
    }
}

/// A recorded reporter event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterEvent {
    /// Scenario start
    ScenarioStarted {
        /// Scenario name
        name: String,
        /// Step count
        steps: usize,
    },
    /// Step start
    StepStarted {
        /// Zero-based index
        index: usize,
        /// Step label
        label: String,
    },
    /// Step end
    StepEnded {
        /// Zero-based index
        index: usize,
        /// Terminal outcome
        outcome: StepOutcome,
    },
    /// Scenario end
    ScenarioEnded {
        /// Whether every step passed
        passed: bool,
    },
}

/// Reporter that keeps every event in order
#[derive(Debug, Clone, Default)]
pub struct CollectingReporter {
    events: Vec<ReporterEvent>,
}

impl CollectingReporter {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events
    #[must_use]
    pub fn events(&self) -> &[ReporterEvent] {
        &self.events
    }

    /// Outcomes of ended steps in order
    #[must_use]
    pub fn outcomes(&self) -> Vec<StepOutcome> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReporterEvent::StepEnded { outcome, .. } => Some(*outcome),
                _ => None,
            })
            .collect()
    }

    /// Labels of started steps in order
    #[must_use]
    pub fn started_labels(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReporterEvent::StepStarted { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl StepReporter for CollectingReporter {
    fn on_scenario_start(&mut self, name: &str, steps: usize) {
        self.events.push(ReporterEvent::ScenarioStarted {
            name: name.to_string(),
            steps,
        });
    }

    fn on_step_start(&mut self, index: usize, label: &str) {
        self.events.push(ReporterEvent::StepStarted {
            index,
            label: label.to_string(),
        });
    }

    fn on_step_end(&mut self, record: &StepRecord) {
        self.events.push(ReporterEvent::StepEnded {
            index: record.index,
            outcome: record.outcome,
        });
    }

    fn on_scenario_end(&mut self, report: &ScenarioReport) {
        self.events.push(ReporterEvent::ScenarioEnded {
            passed: report.passed,
        });
    }
}

/// Plain-text step table with failure diagnostics
#[must_use]
pub fn render_summary(report: &ScenarioReport) -> String {
    let mut out = String::new();
    let verdict = if report.passed { "PASSED" } else { "FAILED" };
    let _ = writeln!(out, "Scenario: {} [{verdict}]", report.name);
    let width = report
        .steps
        .iter()
        .map(|s| s.label.chars().count())
        .max()
        .unwrap_or(0);

    for step in &report.steps {
        let pad = width.saturating_sub(step.label.chars().count());
        let _ = writeln!(
            out,
            "  {:>2}. {}{}  {:<7} {:>6}ms",
            step.index + 1,
            step.label,
            " ".repeat(pad),
            step.outcome,
            step.duration.as_millis()
        );
    }

    for step in report.steps.iter().filter(|s| s.outcome == StepOutcome::Failed) {
        if let Some(diag) = &step.diagnostics {
            let _ = writeln!(out, "\nStep {} failed: {}", step.index + 1, diag.error);
            if let Some(url) = &diag.url {
                let _ = writeln!(out, "  url: {url}");
            }
            if !diag.page_excerpt.is_empty() {
                let _ = writeln!(out, "  page: ...{}", diag.page_excerpt);
            }
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::scenario::{Diagnostics, ScenarioState};
    use std::time::Duration;

    fn report(passed: bool) -> ScenarioReport {
        let mut steps = vec![StepRecord {
            index: 0,
            label: "login".to_string(),
            outcome: StepOutcome::Passed,
            duration: Duration::from_millis(12),
            diagnostics: None,
        }];
        if !passed {
            steps.push(StepRecord {
                index: 1,
                label: "verify tenant".to_string(),
                outcome: StepOutcome::Failed,
                duration: Duration::from_millis(3),
                diagnostics: Some(Diagnostics {
                    error: "tenant missing".to_string(),
                    url: Some("https://boh/home".to_string()),
                    page_excerpt: "welcome".to_string(),
                }),
            });
        }
        ScenarioReport {
            name: "demo".to_string(),
            passed,
            state: if passed {
                ScenarioState::Completed
            } else {
                ScenarioState::Aborted {
                    step: 1,
                    reason: "tenant missing".to_string(),
                }
            },
            steps,
        }
    }

    mod summary_tests {
        use super::*;

        #[test]
        fn test_passing_summary() {
            let text = render_summary(&report(true));
            assert!(text.starts_with("Scenario: demo [PASSED]"));
            assert!(text.contains("1. login"));
            assert!(!text.contains("failed:"));
        }

        #[test]
        fn test_failing_summary_has_diagnostics() {
            let text = render_summary(&report(false));
            assert!(text.contains("[FAILED]"));
            assert!(text.contains("Step 2 failed: tenant missing"));
            assert!(text.contains("url: https://boh/home"));
            assert!(text.contains("page: ...welcome"));
        }
    }

    mod collecting_tests {
        use super::*;

        #[test]
        fn test_records_in_order() {
            let report = report(false);
            let mut collector = CollectingReporter::new();
            collector.on_scenario_start("demo", 2);
            for step in &report.steps {
                collector.on_step_start(step.index, &step.label);
                collector.on_step_end(step);
            }
            collector.on_scenario_end(&report);

            assert_eq!(collector.started_labels(), vec!["login", "verify tenant"]);
            assert_eq!(
                collector.outcomes(),
                vec![StepOutcome::Passed, StepOutcome::Failed]
            );
            assert_eq!(
                collector.events().last(),
                Some(&ReporterEvent::ScenarioEnded { passed: false })
            );
        }

        #[test]
        fn test_tracing_reporter_accepts_all_events() {
            let report = report(false);
            let mut reporter = TracingReporter;
            reporter.on_scenario_start("demo", 2);
            for step in &report.steps {
                reporter.on_step_end(step);
            }
            reporter.on_scenario_end(&report);
        }
    }
}
