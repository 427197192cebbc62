//! Result and error types for Comprobar.

use thiserror::Error;

/// Result type for Comprobar operations
pub type ComprobarResult<T> = Result<T, ComprobarError>;

/// Errors that can occur while driving and verifying a page
#[derive(Debug, Error)]
pub enum ComprobarError {
    /// No locating strategy produced a visible element
    #[error("Element not found: {target} (tried {tried} strategies)")]
    NotFound {
        /// Semantic role of the target
        target: String,
        /// Number of strategies attempted
        tried: usize,
    },

    /// A convergence wait exhausted its budget
    #[error("Timed out after {elapsed_ms}ms waiting for {waited_for}; last observed: {last_observed}")]
    TimedOut {
        /// What was being waited for
        waited_for: String,
        /// Time spent waiting
        elapsed_ms: u64,
        /// Diagnostic snapshot of the last observation
        last_observed: String,
    },

    /// An action could not be performed after retries
    #[error("Action {action} failed after {attempts} attempts: {message}")]
    ActionFailed {
        /// Action description
        action: String,
        /// Attempts made
        attempts: u32,
        /// Last error message
        message: String,
    },

    /// Expected value absent from every evidence source
    #[error("Verification of {field} failed: expected {expected:?}, observed {observed:?} (checked: {sources})")]
    VerificationFailed {
        /// Field name
        field: String,
        /// Expected value
        expected: String,
        /// Excerpt of what was observed
        observed: String,
        /// Evidence sources that were consulted
        sources: String,
    },

    /// No evidence source could be obtained at all
    #[error("Verification of {field} inconclusive: no evidence source was obtainable")]
    Inconclusive {
        /// Field name
        field: String,
    },

    /// A scenario step failed and ended the scenario
    #[error("Step {step:?} aborted: {reason}")]
    StepAborted {
        /// Step label
        step: String,
        /// Underlying failure
        reason: String,
    },

    /// Page error reported by the driver
    #[error("Page error: {message}")]
    PageError {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Script evaluation error
    #[error("Script evaluation failed: {message}")]
    ScriptError {
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ComprobarError {
    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::PageError {
            message: message.into(),
        }
    }

    /// Create a script error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Whether the error came from an assertion rather than page plumbing
    #[must_use]
    pub const fn is_verification(&self) -> bool {
        matches!(
            self,
            Self::VerificationFailed { .. } | Self::Inconclusive { .. }
        )
    }
}
