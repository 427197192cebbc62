//! Scenario orchestration.
//!
//! A [`Scenario`] is an ordered list of named async steps sharing one page.
//! [`ScenarioRunner::run`] executes them strictly in sequence; the first
//! failing step aborts the scenario and every later step is reported as
//! skipped. Retries belong to the steps, never to the runner.
//!
//! ```
//! use comprobar::config::RunnerConfig;
//! use comprobar::mock::{MockPage, MockScreen};
//! use comprobar::reporter::NullReporter;
//! use comprobar::scenario::{Scenario, ScenarioRunner};
//! use comprobar::PageDriver;
//!
//! # tokio_test_block_on(async {
//! let scenario = Scenario::<MockPage>::new("smoke")
//!     .step("open", |page, _config| Box::pin(async move {
//!         page.navigate("https://boh/home").await
//!     }));
//! let mut page = MockPage::new().with_screen(MockScreen::new("about:blank"));
//! let report = ScenarioRunner::run(scenario, &mut page, &RunnerConfig::default(), &mut NullReporter).await;
//! assert!(report.passed);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

use crate::config::RunnerConfig;
use crate::driver::PageDriver;
use crate::reporter::StepReporter;
use crate::result::{ComprobarError, ComprobarResult};
use crate::verify::excerpt_tail;
use futures::future::BoxFuture;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info_span, Instrument};

/// Trailing page characters kept in failure diagnostics
pub const DIAGNOSTIC_EXCERPT_CHARS: usize = 500;

/// Upper bound on collecting diagnostics after a failure
pub const DIAGNOSTIC_TIMEOUT_MS: u64 = 5000;

/// Future returned by a step body
pub type StepFuture<'a> = BoxFuture<'a, ComprobarResult<()>>;

type StepBody<D> =
    Box<dyn for<'a> FnOnce(&'a mut D, &'a RunnerConfig) -> StepFuture<'a> + Send>;

// ============================================================================
// Step records
// ============================================================================

/// Terminal (or initial) state of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    /// Not run yet
    Pending,
    /// Body completed
    Passed,
    /// Body returned an error
    Failed,
    /// Not run because an earlier step failed
    Skipped,
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::Pending => "pending",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        })
    }
}

/// Page state captured when a step fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Error message of the failed step
    pub error: String,
    /// URL at failure time, when readable
    pub url: Option<String>,
    /// Trailing excerpt of the rendered text
    pub page_excerpt: String,
}

/// Result of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// Zero-based position
    pub index: usize,
    /// Human-readable label
    pub label: String,
    /// Outcome
    pub outcome: StepOutcome,
    /// Wall time spent in the body
    pub duration: Duration,
    /// Failure diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

/// Lifecycle of a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ScenarioState {
    /// No step has run
    NotStarted,
    /// Step `n` is executing
    Running {
        /// Zero-based index of the current step
        step: usize,
    },
    /// Every step passed
    Completed,
    /// A step failed
    Aborted {
        /// Zero-based index of the failed step
        step: usize,
        /// Error message
        reason: String,
    },
}

impl std::fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => f.write_str("not started"),
            Self::Running { step } => write!(f, "running step {}", step + 1),
            Self::Completed => f.write_str("completed"),
            Self::Aborted { step, reason } => write!(f, "aborted at step {}: {reason}", step + 1),
        }
    }
}

/// Final report of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// True iff every step passed
    pub passed: bool,
    /// Final state
    pub state: ScenarioState,
    /// One record per declared step
    pub steps: Vec<StepRecord>,
}

impl ScenarioReport {
    /// The failed step, if any
    #[must_use]
    pub fn failed_step(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.outcome == StepOutcome::Failed)
    }

    /// `Ok` when passed, otherwise [`ComprobarError::StepAborted`]
    pub fn into_result(self) -> ComprobarResult<Self> {
        match self.failed_step() {
            None => Ok(self),
            Some(step) => Err(ComprobarError::StepAborted {
                step: step.label.clone(),
                reason: step
                    .diagnostics
                    .as_ref()
                    .map(|d| d.error.clone())
                    .unwrap_or_default(),
            }),
        }
    }
}

// ============================================================================
// Scenario definition
// ============================================================================

/// Named, ordered list of steps over a page of type `D`
pub struct Scenario<D: ?Sized> {
    name: String,
    steps: Vec<(String, StepBody<D>)>,
}

impl<D: ?Sized> std::fmt::Debug for Scenario<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("steps", &self.labels())
            .finish()
    }
}

impl<D: PageDriver + ?Sized> Scenario<D> {
    /// Empty scenario
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    #[must_use]
    pub fn step<F>(mut self, label: impl Into<String>, body: F) -> Self
    where
        F: for<'a> FnOnce(&'a mut D, &'a RunnerConfig) -> StepFuture<'a> + Send + 'static,
    {
        self.steps.push((label.into(), Box::new(body)));
        self
    }
}

impl<D: ?Sized> Scenario<D> {
    /// Scenario name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Step labels in order
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.steps.iter().map(|(label, _)| label.as_str()).collect()
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when no step is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Sequential executor of scenarios
#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioRunner;

impl ScenarioRunner {
    /// Run every step in order against `page`
    ///
    /// The page is borrowed exclusively for the whole run.
    pub async fn run<D: PageDriver + ?Sized>(
        scenario: Scenario<D>,
        page: &mut D,
        config: &RunnerConfig,
        reporter: &mut dyn StepReporter,
    ) -> ScenarioReport {
        let Scenario { name, steps } = scenario;
        reporter.on_scenario_start(&name, steps.len());

        let mut state = ScenarioState::NotStarted;
        let mut records = Vec::with_capacity(steps.len());

        for (index, (label, body)) in steps.into_iter().enumerate() {
            if matches!(state, ScenarioState::Aborted { .. }) {
                let record = StepRecord {
                    index,
                    label,
                    outcome: StepOutcome::Skipped,
                    duration: Duration::ZERO,
                    diagnostics: None,
                };
                reporter.on_step_end(&record);
                records.push(record);
                continue;
            }

            state = ScenarioState::Running { step: index };
            reporter.on_step_start(index, &label);

            let span = info_span!("step", index = index + 1, label = %label);
            let started = Instant::now();
            let result = body(&mut *page, config).instrument(span).await;
            let duration = started.elapsed();

            let record = match result {
                Ok(()) => StepRecord {
                    index,
                    label,
                    outcome: StepOutcome::Passed,
                    duration,
                    diagnostics: None,
                },
                Err(err) => {
                    let diagnostics = capture_diagnostics(&*page, &err).await;
                    state = ScenarioState::Aborted {
                        step: index,
                        reason: err.to_string(),
                    };
                    StepRecord {
                        index,
                        label,
                        outcome: StepOutcome::Failed,
                        duration,
                        diagnostics: Some(diagnostics),
                    }
                }
            };
            reporter.on_step_end(&record);
            records.push(record);
        }

        if !matches!(state, ScenarioState::Aborted { .. }) {
            state = ScenarioState::Completed;
        }
        let report = ScenarioReport {
            name,
            passed: state == ScenarioState::Completed,
            state,
            steps: records,
        };
        reporter.on_scenario_end(&report);
        report
    }
}

async fn capture_diagnostics<D: PageDriver + ?Sized>(
    page: &D,
    error: &ComprobarError,
) -> Diagnostics {
    let budget = Duration::from_millis(DIAGNOSTIC_TIMEOUT_MS);
    let url = tokio::time::timeout(budget, page.current_url())
        .await
        .ok()
        .and_then(Result::ok);
    let page_excerpt = tokio::time::timeout(budget, page.body_text())
        .await
        .ok()
        .and_then(Result::ok)
        .map(|text| excerpt_tail(&text, DIAGNOSTIC_EXCERPT_CHARS))
        .unwrap_or_default();
    Diagnostics {
        error: error.to_string(),
        url,
        page_excerpt,
    }
}
