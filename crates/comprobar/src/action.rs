//! Action execution with stabilization, retries and fallbacks.
//!
//! Every action goes through the same sequence: scroll the element into
//! view, settle briefly, act. Clicks expected to navigate are raced against
//! URL and load-state waiters, which a failed click abandons at once. The
//! waiters only ever log, because many transitions are same-URL single-page
//! updates.

use crate::driver::{ElementHandle, PageDriver};
use crate::network::UrlPattern;
use crate::result::{ComprobarError, ComprobarResult};
use crate::wait::LoadState;
use futures::future::{select, select_ok, Either};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default attempts per action
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Default backoff between attempts (1 second)
pub const DEFAULT_BACKOFF_MS: u64 = 1000;

/// Default pause between scrolling and acting (500ms)
pub const DEFAULT_SETTLE_MS: u64 = 500;

/// Default navigation confirmation budget (15 seconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 15_000;

/// UI action to perform on an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Click the element
    Click,
    /// Replace the element's value
    Fill(String),
    /// Choose an option of a `<select>`
    SelectOption(String),
    /// Tick a checkbox
    Check,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Click => write!(f, "click"),
            Self::Fill(_) => write!(f, "fill"),
            Self::SelectOption(v) => write!(f, "select {v:?}"),
            Self::Check => write!(f, "check"),
        }
    }
}

/// What a navigating click should lead to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationExpectation {
    /// Any of these URLs confirms the navigation
    pub url_patterns: Vec<UrlPattern>,
    /// Load state to wait for afterwards
    pub load_state: Option<LoadState>,
    /// Budget for each waiter
    pub timeout: Duration,
}

impl NavigationExpectation {
    /// Expectation with no waiters yet
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            url_patterns: Vec::new(),
            load_state: None,
            timeout,
        }
    }

    /// Accept a URL pattern
    #[must_use]
    pub fn url(mut self, pattern: UrlPattern) -> Self {
        self.url_patterns.push(pattern);
        self
    }

    /// Wait for a load state
    #[must_use]
    pub const fn load_state(mut self, state: LoadState) -> Self {
        self.load_state = Some(state);
        self
    }
}

impl Default for NavigationExpectation {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_NAVIGATION_TIMEOUT_MS))
    }
}

/// Retry and confirmation settings for one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOptions {
    /// Attempts before giving up
    pub attempts: u32,
    /// Pause between attempts
    pub backoff: Duration,
    /// Pause between scrolling into view and acting
    pub settle: Duration,
    /// Navigation the action should cause
    pub expect_navigation: Option<NavigationExpectation>,
    /// Key pressed when every attempt failed
    pub fallback_key: Option<String>,
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            expect_navigation: None,
            fallback_key: None,
        }
    }
}

impl ActionOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attempt count
    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the backoff
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the settle pause
    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Expect navigation
    #[must_use]
    pub fn expecting(mut self, navigation: NavigationExpectation) -> Self {
        self.expect_navigation = Some(navigation);
        self
    }

    /// Press `key` if the action cannot be performed
    #[must_use]
    pub fn with_fallback_key(mut self, key: impl Into<String>) -> Self {
        self.fallback_key = Some(key.into());
        self
    }
}

/// Result of performing an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action was performed
    Ack {
        /// Attempts used
        attempts: u32,
        /// Whether navigation was observed
        navigated: bool,
    },
    /// Every attempt failed and the fallback key was pressed
    FellBack {
        /// Key pressed
        key: String,
    },
    /// Every attempt and the fallback failed
    Failed {
        /// Attempts made
        attempts: u32,
        /// Last error seen
        last_error: String,
    },
}

impl ActionOutcome {
    /// Whether the action or its fallback went through
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Convert a failure into [`ComprobarError::ActionFailed`]
    pub fn into_result(self, action: &str) -> ComprobarResult<Self> {
        match self {
            Self::Failed {
                attempts,
                last_error,
            } => Err(ComprobarError::ActionFailed {
                action: action.to_string(),
                attempts,
                message: last_error,
            }),
            other => Ok(other),
        }
    }
}

/// Perform an action with retries, then the fallback key
pub async fn perform<D: PageDriver + ?Sized>(
    page: &D,
    action: &Action,
    element: &ElementHandle,
    options: &ActionOptions,
) -> ActionOutcome {
    let attempts = options.attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match attempt_once(page, action, element, options).await {
            Ok(navigated) => {
                debug!(%action, element = %element.id, attempt, navigated, "action performed");
                return ActionOutcome::Ack {
                    attempts: attempt,
                    navigated,
                };
            }
            Err(e) => {
                warn!(%action, element = %element.id, attempt, attempts, error = %e, "action attempt failed");
                last_error = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(options.backoff).await;
                }
            }
        }
    }

    if let Some(key) = &options.fallback_key {
        info!(%action, key = %key, "falling back to key press");
        match press_with_navigation(page, key, options.expect_navigation.as_ref()).await {
            Ok(_) => return ActionOutcome::FellBack { key: key.clone() },
            Err(e) => {
                warn!(key = %key, error = %e, "fallback key press failed");
                last_error = e.to_string();
            }
        }
    }

    ActionOutcome::Failed {
        attempts,
        last_error,
    }
}

/// Press a key without an element, optionally confirming navigation
pub async fn press_with_navigation<D: PageDriver + ?Sized>(
    page: &D,
    key: &str,
    navigation: Option<&NavigationExpectation>,
) -> ComprobarResult<bool> {
    match navigation {
        Some(navigation) => confirming(page, page.press_key(key), navigation).await,
        None => page.press_key(key).await.map(|()| false),
    }
}

/// Fill, then read the value back
///
/// Returns the read-back value; a read-back failure is logged, not fatal.
pub async fn fill_verified<D: PageDriver + ?Sized>(
    page: &D,
    element: &ElementHandle,
    value: &str,
    options: &ActionOptions,
) -> ComprobarResult<String> {
    perform(page, &Action::Fill(value.to_string()), element, options)
        .await
        .into_result("fill")?;
    match page.input_value(element).await {
        Ok(read_back) => {
            if read_back != value {
                warn!(element = %element.id, "read-back differs from filled value");
            }
            Ok(read_back)
        }
        Err(e) => {
            warn!(element = %element.id, error = %e, "could not read back filled value");
            Ok(String::new())
        }
    }
}

/// Mask a value for logs, keeping the first `reveal` characters
#[must_use]
pub fn mask_value(value: &str, reveal: usize) -> String {
    if value.is_empty() {
        return "<empty>".to_string();
    }
    let shown: String = value.chars().take(reveal).collect();
    format!("{shown}***")
}

async fn attempt_once<D: PageDriver + ?Sized>(
    page: &D,
    action: &Action,
    element: &ElementHandle,
    options: &ActionOptions,
) -> ComprobarResult<bool> {
    page.scroll_into_view(element).await?;
    tokio::time::sleep(options.settle).await;

    match action {
        Action::Click => match &options.expect_navigation {
            Some(navigation) => confirming(page, page.click(element), navigation).await,
            None => page.click(element).await.map(|()| false),
        },
        Action::Fill(value) => page.fill(element, value).await.map(|()| false),
        Action::SelectOption(value) => page.select_option(element, value).await.map(|()| false),
        Action::Check => page.check(element).await.map(|()| false),
    }
}

/// Race an action against navigation confirmation
///
/// A failed action drops the waiters at once. Navigation observed before the
/// action returns still waits for the action's result.
async fn confirming<D, F>(
    page: &D,
    act: F,
    navigation: &NavigationExpectation,
) -> ComprobarResult<bool>
where
    D: PageDriver + ?Sized,
    F: Future<Output = ComprobarResult<()>>,
{
    let act = Box::pin(act);
    let confirm = Box::pin(confirm_navigation(page, navigation));
    match select(act, confirm).await {
        Either::Left((Ok(()), confirm)) => Ok(confirm.await),
        Either::Left((Err(e), _)) => Err(e),
        Either::Right((navigated, act)) => act.await.map(|()| navigated),
    }
}

/// Wait for any expected URL and the load state; never fails
async fn confirm_navigation<D: PageDriver + ?Sized>(
    page: &D,
    navigation: &NavigationExpectation,
) -> bool {
    let url_wait = async {
        if navigation.url_patterns.is_empty() {
            return None;
        }
        let waiters = navigation
            .url_patterns
            .iter()
            .map(|pattern| Box::pin(page.wait_for_url(pattern, navigation.timeout)));
        match select_ok(waiters).await {
            Ok(((), _)) => Some(true),
            Err(e) => {
                warn!(error = %e, "navigation not confirmed by url, continuing");
                Some(false)
            }
        }
    };
    let load_wait = async {
        match navigation.load_state {
            Some(state) => match page.wait_for_load_state(state, navigation.timeout).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(%state, error = %e, "load state not reached after action, continuing");
                    false
                }
            },
            None => false,
        }
    };
    let (url_ok, load_ok) = tokio::join!(url_wait, load_wait);
    url_ok.unwrap_or(load_ok)
}
