//! PageDriver - the drivable page abstraction
//!
//! Every engine component receives the page as a handle per call and never
//! stores it. Implementations:
//!
//! - `ChromiumPage` (feature `browser`) drives Chromium over CDP
//! - `MockPage` is a scriptable in-memory page for tests

use crate::locator::Selector;
use crate::network::UrlPattern;
use crate::result::ComprobarResult;
use crate::wait::LoadState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Script that scrolls to the bottom and back to the top, nudging lazy loaders
pub const SCROLL_NUDGE_SCRIPT: &str =
    "(() => { window.scrollTo(0, document.body.scrollHeight); window.scrollTo(0, 0); return true; })()";

/// Opaque reference to an element issued by the page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Page-issued identifier
    pub id: String,
    /// Element tag name (lowercase)
    pub tag_name: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
        }
    }
}

/// Abstract page trait for browser automation
///
/// Queries take `&self`; operations that replace the document take `&mut self`.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to URL
    async fn navigate(&mut self, url: &str) -> ComprobarResult<()>;

    /// Reload the current document
    async fn reload(&mut self) -> ComprobarResult<()>;

    /// Get current URL
    async fn current_url(&self) -> ComprobarResult<String>;

    /// Get document title
    async fn title(&self) -> ComprobarResult<String>;

    /// Rendered text of the whole document body
    async fn body_text(&self) -> ComprobarResult<String>;

    /// Query all elements matching a selector, optionally within a scope element
    async fn query_all(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> ComprobarResult<Vec<ElementHandle>>;

    /// Whether the element is rendered and visible
    async fn is_visible(&self, element: &ElementHandle) -> ComprobarResult<bool>;

    /// Rendered text of the element
    async fn text_content(&self, element: &ElementHandle) -> ComprobarResult<String>;

    /// Current value of an input element
    async fn input_value(&self, element: &ElementHandle) -> ComprobarResult<String>;

    /// Attribute value, if present
    async fn attribute(&self, element: &ElementHandle, name: &str)
        -> ComprobarResult<Option<String>>;

    /// Whether a checkbox/radio is checked
    async fn is_checked(&self, element: &ElementHandle) -> ComprobarResult<bool>;

    /// Nearest ancestor (or self) matching the selector
    async fn closest(
        &self,
        element: &ElementHandle,
        ancestor: &Selector,
    ) -> ComprobarResult<Option<ElementHandle>>;

    /// Scroll the element into the viewport
    async fn scroll_into_view(&self, element: &ElementHandle) -> ComprobarResult<()>;

    /// Click the element
    async fn click(&self, element: &ElementHandle) -> ComprobarResult<()>;

    /// Replace the element's value
    async fn fill(&self, element: &ElementHandle, value: &str) -> ComprobarResult<()>;

    /// Select an option of a `<select>` by value or label
    async fn select_option(&self, element: &ElementHandle, value: &str) -> ComprobarResult<()>;

    /// Check a checkbox
    async fn check(&self, element: &ElementHandle) -> ComprobarResult<()>;

    /// Press a key on the focused element (e.g. "Enter")
    async fn press_key(&self, key: &str) -> ComprobarResult<()>;

    /// Wait until the document reaches a load state
    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration)
        -> ComprobarResult<()>;

    /// Wait until the URL matches a pattern
    async fn wait_for_url(&self, pattern: &UrlPattern, timeout: Duration) -> ComprobarResult<()>;

    /// Execute JavaScript in page context
    async fn evaluate(&self, script: &str) -> ComprobarResult<serde_json::Value>;
}

/// Best-effort load-state wait: a timeout is logged, never returned
pub async fn settle_load_state<D: PageDriver + ?Sized>(
    page: &D,
    state: LoadState,
    timeout: Duration,
) {
    if let Err(e) = page.wait_for_load_state(state, timeout).await {
        tracing::warn!(%state, error = %e, "load state not reached, continuing");
    }
}

/// Scroll to the bottom and back to the top; failures are logged only
pub async fn scroll_nudge<D: PageDriver + ?Sized>(page: &D) {
    if let Err(e) = page.evaluate(SCROLL_NUDGE_SCRIPT).await {
        tracing::debug!(error = %e, "scroll nudge failed");
    }
}
