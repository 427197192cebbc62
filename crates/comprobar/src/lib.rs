//! Comprobar: resilient interaction and verification engine for back-office UIs
//!
//! Comprobar (Spanish: "to check/verify") drives a real page through the
//! [`PageDriver`] trait and verifies business data against pages whose DOM
//! shifts, whose content loads late and whose fields render placeholders
//! before their values.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   COMPROBAR Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Scenario   │    │ Business   │    │ Selector   │            │
//! │   │ Runner     │───►│ Flows      │───►│ Resolver   │──┐         │
//! │   └────────────┘    └────────────┘    └────────────┘  │         │
//! │                           │           ┌────────────┐  │         │
//! │                           ├──────────►│ Action     │◄─┤         │
//! │                           │           │ Executor   │  │         │
//! │                           │           └────────────┘  ▼         │
//! │                           │           ┌────────────┐ ┌────────┐ │
//! │                           ├──────────►│ Converge.  │►│ Page   │ │
//! │                           │           │ Poller     │ │ Driver │ │
//! │                           │           └────────────┘ └────────┘ │
//! │                           │           ┌────────────┐  ▲         │
//! │                           └──────────►│ Evidence   │──┘         │
//! │                                       │ Verifier   │            │
//! │                                       └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

/// Element actions with retries, fallback keys and navigation confirmation
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod action;

/// Chromium over CDP
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod browser;

/// Environments, credentials, module paths and timing budgets
pub mod config;

/// The drivable page abstraction
#[allow(clippy::missing_errors_doc)]
pub mod driver;

/// Back-office login and daily-demand order flows
pub mod flows;

/// Multi-strategy element resolution
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn
)]
pub mod locator;

/// Scriptable in-memory page for tests
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod mock;

/// URL patterns
pub mod network;

/// Step boundary reporting
pub mod reporter;

mod result;

/// Ordered scenarios with abort-on-failure and diagnostics
pub mod scenario;

/// Evidence-based verification
#[allow(clippy::missing_errors_doc)]
pub mod verify;

/// Convergence polling
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod wait;

pub use action::{
    fill_verified, mask_value, perform, press_with_navigation, Action, ActionOptions,
    ActionOutcome, NavigationExpectation,
};
pub use browser::BrowserOptions;
#[cfg(feature = "browser")]
pub use browser::{ChromiumPage, ChromiumSession};
pub use config::{
    Credentials, Environment, EnvironmentProfile, ModulePaths, RunnerConfig, Timeouts,
};
pub use driver::{scroll_nudge, settle_load_state, ElementHandle, PageDriver};
pub use flows::{daily_demand_scenario, DailyDemandExpectations};
pub use locator::{Resolution, Selector, SelectorResolver, Strategy, TargetDescriptor};
pub use network::UrlPattern;
pub use reporter::{
    render_summary, CollectingReporter, NullReporter, ReporterEvent, StepReporter,
    TracingReporter,
};
pub use result::{ComprobarError, ComprobarResult};
pub use scenario::{
    Diagnostics, Scenario, ScenarioReport, ScenarioRunner, ScenarioState, StepOutcome,
    StepRecord,
};
pub use verify::{
    match_identifier, verify_field, verify_identifier, verify_row_presence, EvidenceBundle,
    EvidenceSource, IdentifierMatch, Sentinel, Verdict,
};
pub use wait::{
    ChecklistEntry, ConvergencePoller, Escalation, FieldChecklist, LoadState, Observation,
    PollOutcome, Probe, TextProbe, UrlProbe, WaitPolicy,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        daily_demand_scenario, perform, verify_field, Action, ActionOptions, ComprobarError,
        ComprobarResult, ConvergencePoller, DailyDemandExpectations, EvidenceBundle,
        FieldChecklist, LoadState, PageDriver, RunnerConfig, Scenario, ScenarioReport,
        ScenarioRunner, Selector, SelectorResolver, StepReporter, TargetDescriptor,
        TracingReporter, Verdict, WaitPolicy,
    };
}
