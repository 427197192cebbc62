//! Convergence polling for asynchronously loading page state.
//!
//! Every wait in the engine goes through [`ConvergencePoller`]: sleep, probe
//! fresh page state, repeat until the probe is satisfied or the
//! [`WaitPolicy`] budget is spent. Nothing here blocks without a bound.

use crate::driver::{scroll_nudge, settle_load_state, PageDriver};
use crate::network::UrlPattern;
use crate::result::{ComprobarError, ComprobarResult};
use crate::verify::{excerpt_tail, Sentinel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Scheduling overhead allowed on top of `interval * max_attempts` (250ms)
pub const DEFAULT_SLACK_MS: u64 = 250;

/// Budget for the page to settle after a reload escalation (10 seconds)
pub const RELOAD_SETTLE_TIMEOUT_MS: u64 = 10_000;

/// Characters of page text kept in probe snapshots
const SNAPSHOT_CHARS: usize = 200;

// =============================================================================
// LOAD STATE
// =============================================================================

/// Page load states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoadState {
    /// Wait for the `load` event to fire
    #[default]
    Load,
    /// Wait for `DOMContentLoaded` event
    DomContentLoaded,
    /// Wait for network to be idle (no new requests for 500ms)
    NetworkIdle,
}

impl LoadState {
    /// Get the JavaScript event name for this load state
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "DOMContentLoaded",
            Self::NetworkIdle => "networkidle",
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.event_name())
    }
}

// =============================================================================
// WAIT POLICY
// =============================================================================

/// Bounded polling budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    /// Sleep before each probe
    pub interval: Duration,
    /// Maximum number of probes
    pub max_attempts: u32,
    /// Scroll-nudge the page before every Nth probe
    pub nudge_every: Option<u32>,
    /// Overhead tolerated beyond `interval * max_attempts`
    pub slack: Duration,
}

impl WaitPolicy {
    /// Create a policy with no nudging and the default slack
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            nudge_every: None,
            slack: Duration::from_millis(DEFAULT_SLACK_MS),
        }
    }

    /// 500ms x 10
    #[must_use]
    pub const fn quick() -> Self {
        Self::new(Duration::from_millis(500), 10)
    }

    /// 1s x 15
    #[must_use]
    pub const fn standard() -> Self {
        Self::new(Duration::from_secs(1), 15)
    }

    /// 1s x 30
    #[must_use]
    pub const fn patient() -> Self {
        Self::new(Duration::from_secs(1), 30)
    }

    /// Scroll-nudge before every `n`th probe
    #[must_use]
    pub const fn with_nudge_every(mut self, n: u32) -> Self {
        self.nudge_every = Some(n);
        self
    }

    /// Set the overhead allowance
    #[must_use]
    pub const fn with_slack(mut self, slack: Duration) -> Self {
        self.slack = slack;
        self
    }

    /// `interval * max_attempts`
    #[must_use]
    pub fn max_duration(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }

    /// Hard upper bound on a poll: `max_duration + slack`
    #[must_use]
    pub fn hard_limit(&self) -> Duration {
        self.max_duration().saturating_add(self.slack)
    }

    fn nudges_on(&self, attempt: u32) -> bool {
        matches!(self.nudge_every, Some(n) if n > 0 && attempt % n == 0)
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

// =============================================================================
// PROBES
// =============================================================================

/// One fresh reading of page state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Whether the termination predicate holds
    pub satisfied: bool,
    /// Diagnostic description of what was seen
    pub snapshot: String,
}

impl Observation {
    /// A reading that satisfies the predicate
    #[must_use]
    pub fn satisfied(snapshot: impl Into<String>) -> Self {
        Self {
            satisfied: true,
            snapshot: snapshot.into(),
        }
    }

    /// A reading that does not (yet) satisfy the predicate
    #[must_use]
    pub fn pending(snapshot: impl Into<String>) -> Self {
        Self {
            satisfied: false,
            snapshot: snapshot.into(),
        }
    }
}

/// Termination predicate re-evaluated against live page state
///
/// Implementations must read the page on every call; caching across calls
/// defeats the poller.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Take one reading
    async fn observe(&self, page: &dyn PageDriver) -> Observation;

    /// What the probe waits for, used in timeouts and logs
    fn describe(&self) -> String;
}

/// Predicate over the rendered body text
pub struct TextProbe<F> {
    label: String,
    predicate: F,
}

impl<F> TextProbe<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    /// Create a probe from a label and a text predicate
    pub fn new(label: impl Into<String>, predicate: F) -> Self {
        Self {
            label: label.into(),
            predicate,
        }
    }
}

impl<F> std::fmt::Debug for TextProbe<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextProbe")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Probe for TextProbe<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    async fn observe(&self, page: &dyn PageDriver) -> Observation {
        match page.body_text().await {
            Ok(text) => Observation {
                satisfied: (self.predicate)(&text),
                snapshot: excerpt_tail(&text, SNAPSHOT_CHARS),
            },
            Err(e) => Observation::pending(format!("body text unavailable: {e}")),
        }
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Predicate over the current URL
#[derive(Debug, Clone)]
pub enum UrlProbe {
    /// URL matches the pattern
    Matching(UrlPattern),
    /// URL no longer contains the fragment
    Leaving(String),
}

impl UrlProbe {
    /// Wait for the URL to stop containing `fragment`
    #[must_use]
    pub fn leaving(fragment: impl Into<String>) -> Self {
        Self::Leaving(fragment.into())
    }
}

#[async_trait]
impl Probe for UrlProbe {
    async fn observe(&self, page: &dyn PageDriver) -> Observation {
        let url = match page.current_url().await {
            Ok(url) => url,
            Err(e) => return Observation::pending(format!("url unavailable: {e}")),
        };
        let satisfied = match self {
            Self::Matching(pattern) => pattern.matches(&url),
            Self::Leaving(fragment) => !url.contains(fragment.as_str()),
        };
        Observation { satisfied, snapshot: url }
    }

    fn describe(&self) -> String {
        match self {
            Self::Matching(pattern) => format!("url matching {pattern}"),
            Self::Leaving(fragment) => format!("url leaving {fragment}"),
        }
    }
}

// =============================================================================
// FIELD CHECKLIST
// =============================================================================

/// One tracked field of a [`FieldChecklist`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    /// Field label as rendered
    pub label: String,
    /// Value that must be present
    pub expected: String,
    /// Placeholder that must be absent
    pub sentinel: Option<Sentinel>,
}

/// AND-combination over independently loading fields
///
/// Loaded only when every expected value is present and every sentinel is
/// absent in the same reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChecklist {
    entries: Vec<ChecklistEntry>,
}

impl FieldChecklist {
    /// Empty checklist
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a field whose label renders `"{label}：-"` until loaded
    #[must_use]
    pub fn field(mut self, label: impl Into<String>, expected: impl Into<String>) -> Self {
        let label = label.into();
        self.entries.push(ChecklistEntry {
            sentinel: Some(Sentinel::new(label.clone())),
            label,
            expected: expected.into(),
        });
        self
    }

    /// Track a value without a sentinel
    #[must_use]
    pub fn value(mut self, label: impl Into<String>, expected: impl Into<String>) -> Self {
        self.entries.push(ChecklistEntry {
            label: label.into(),
            expected: expected.into(),
            sentinel: None,
        });
        self
    }

    /// Tracked entries
    #[must_use]
    pub fn entries(&self) -> &[ChecklistEntry] {
        &self.entries
    }

    /// Labels not yet loaded in `text`
    #[must_use]
    pub fn pending(&self, text: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| {
                !text.contains(e.expected.as_str())
                    || e.sentinel.as_ref().is_some_and(|s| s.is_present(text))
            })
            .map(|e| e.label.as_str())
            .collect()
    }

    /// Whether every field is loaded in `text`
    #[must_use]
    pub fn is_loaded(&self, text: &str) -> bool {
        self.pending(text).is_empty()
    }

    /// Sentinels among `labels` that are still rendered in `text`
    #[must_use]
    pub fn sentinels_present(&self, text: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.sentinel.as_ref().is_some_and(|s| s.is_present(text)))
            .map(|e| e.label.as_str())
            .collect()
    }
}

#[async_trait]
impl Probe for FieldChecklist {
    async fn observe(&self, page: &dyn PageDriver) -> Observation {
        let text = match page.body_text().await {
            Ok(text) => text,
            Err(e) => return Observation::pending(format!("body text unavailable: {e}")),
        };
        let pending = self.pending(&text);
        if pending.is_empty() {
            Observation::satisfied(excerpt_tail(&text, SNAPSHOT_CHARS))
        } else {
            Observation::pending(format!(
                "pending: {} | {}",
                pending.join(", "),
                excerpt_tail(&text, SNAPSHOT_CHARS)
            ))
        }
    }

    fn describe(&self) -> String {
        let labels: Vec<_> = self.entries.iter().map(|e| e.label.as_str()).collect();
        format!("fields loaded: {}", labels.join(", "))
    }
}

// =============================================================================
// POLLER
// =============================================================================

/// Result of a bounded poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The probe was satisfied
    Converged {
        /// Probes taken
        attempts: u32,
        /// Time spent
        elapsed: Duration,
        /// Snapshot of the satisfying reading
        snapshot: String,
    },
    /// The budget ran out
    TimedOut {
        /// Probes taken
        attempts: u32,
        /// Time spent
        elapsed: Duration,
        /// Snapshot of the last reading
        last_observed: String,
    },
}

impl PollOutcome {
    /// Whether the probe was satisfied
    #[must_use]
    pub const fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    /// Probes taken
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Converged { attempts, .. } | Self::TimedOut { attempts, .. } => *attempts,
        }
    }

    /// Time spent
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Converged { elapsed, .. } | Self::TimedOut { elapsed, .. } => *elapsed,
        }
    }

    /// Convert a timeout into [`ComprobarError::TimedOut`]
    pub fn into_result(self, waited_for: &str) -> ComprobarResult<String> {
        match self {
            Self::Converged { snapshot, .. } => Ok(snapshot),
            Self::TimedOut {
                elapsed,
                last_observed,
                ..
            } => Err(ComprobarError::TimedOut {
                waited_for: waited_for.to_string(),
                elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                last_observed,
            }),
        }
    }

    fn extend(self, earlier_attempts: u32, earlier_elapsed: Duration) -> Self {
        match self {
            Self::Converged {
                attempts,
                elapsed,
                snapshot,
            } => Self::Converged {
                attempts: attempts + earlier_attempts,
                elapsed: elapsed + earlier_elapsed,
                snapshot,
            },
            Self::TimedOut {
                attempts,
                elapsed,
                last_observed,
            } => Self::TimedOut {
                attempts: attempts + earlier_attempts,
                elapsed: elapsed + earlier_elapsed,
                last_observed,
            },
        }
    }
}

/// Corrective action taken once between two polling phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Escalation {
    /// Reload the document
    Reload,
    /// Scroll to the bottom and back to trigger lazy loaders
    ScrollToTriggerLazyLoad,
}

impl Escalation {
    /// Perform the corrective action
    pub async fn apply(self, page: &mut dyn PageDriver) -> ComprobarResult<()> {
        match self {
            Self::Reload => {
                page.reload().await?;
                settle_load_state(
                    &*page,
                    LoadState::NetworkIdle,
                    Duration::from_millis(RELOAD_SETTLE_TIMEOUT_MS),
                )
                .await;
                Ok(())
            }
            Self::ScrollToTriggerLazyLoad => {
                scroll_nudge(&*page).await;
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for Escalation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reload => write!(f, "reload"),
            Self::ScrollToTriggerLazyLoad => write!(f, "scroll"),
        }
    }
}

/// Sleep, probe, repeat
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvergencePoller;

impl ConvergencePoller {
    /// Poll until the probe holds or the policy is exhausted
    ///
    /// Never runs longer than [`WaitPolicy::hard_limit`].
    pub async fn poll_until(
        page: &dyn PageDriver,
        policy: &WaitPolicy,
        probe: &dyn Probe,
    ) -> PollOutcome {
        let start = Instant::now();
        let mut attempts = 0u32;
        let mut last_observed = String::new();

        let converged = {
            let attempts = &mut attempts;
            let last_observed = &mut last_observed;
            let run = async move {
                for attempt in 1..=policy.max_attempts {
                    tokio::time::sleep(policy.interval).await;
                    *attempts = attempt;
                    if policy.nudges_on(attempt) {
                        debug!(attempt, "nudging page");
                        scroll_nudge(page).await;
                    }
                    let observation = probe.observe(page).await;
                    debug!(
                        waiting_for = %probe.describe(),
                        attempt,
                        max_attempts = policy.max_attempts,
                        satisfied = observation.satisfied,
                        "probe"
                    );
                    *last_observed = observation.snapshot;
                    if observation.satisfied {
                        return true;
                    }
                }
                false
            };
            tokio::time::timeout(policy.hard_limit(), run)
                .await
                .unwrap_or(false)
        };

        let elapsed = start.elapsed();
        if converged {
            PollOutcome::Converged {
                attempts,
                elapsed,
                snapshot: last_observed,
            }
        } else {
            debug!(waiting_for = %probe.describe(), attempts, ?elapsed, "poll timed out");
            PollOutcome::TimedOut {
                attempts,
                elapsed,
                last_observed,
            }
        }
    }

    /// Poll, escalate once on timeout, then poll a second phase
    ///
    /// A failed escalation is logged and the second phase still runs.
    pub async fn poll_with_escalation(
        page: &mut dyn PageDriver,
        primary: &WaitPolicy,
        escalation: Escalation,
        secondary: &WaitPolicy,
        probe: &dyn Probe,
    ) -> PollOutcome {
        let first = Self::poll_until(&*page, primary, probe).await;
        if first.is_converged() {
            return first;
        }
        warn!(
            waiting_for = %probe.describe(),
            %escalation,
            "not converged within primary budget, escalating"
        );
        let escalation_start = Instant::now();
        if let Err(e) = escalation.apply(page).await {
            warn!(%escalation, error = %e, "escalation failed, polling anyway");
        }
        let spent = first.elapsed() + escalation_start.elapsed();
        Self::poll_until(&*page, secondary, probe)
            .await
            .extend(first.attempts(), spent)
    }
}
