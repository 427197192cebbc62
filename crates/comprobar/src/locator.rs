//! Selector resolution under uncertainty.
//!
//! A [`TargetDescriptor`] names *what* to find (a semantic role such as
//! "password field") and carries an ordered list of locating strategies.
//! The [`SelectorResolver`] tries them in order and returns the first
//! visible match.
//!
//! # Design Philosophy
//!
//! - **Data, not conditionals**: fallback chains are declared as lists, new
//!   strategies are added by extending the list
//! - **Never abort the search**: a strategy that errors (malformed selector,
//!   detached node) is skipped
//! - **NotFound is a value**: callers decide whether it is fatal

use crate::driver::{ElementHandle, PageDriver};
use crate::result::{ComprobarError, ComprobarResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default visibility timeout per strategy (2 seconds)
pub const DEFAULT_STRATEGY_TIMEOUT_MS: u64 = 2000;

/// Default polling interval while waiting for visibility (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Render a Rust string as a JavaScript string literal
pub(crate) fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// CSS selector (e.g., `input[name="account"]`)
    Css(String),
    /// XPath selector
    XPath(String),
    /// Innermost elements whose text matches
    Text {
        /// Text to match
        text: String,
        /// Whole trimmed text must equal `text`
        exact: bool,
    },
    /// CSS selector filtered to elements containing text (`:has-text`)
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
    /// CSS selector filtered to elements NOT containing text
    CssWithoutText {
        /// Base CSS selector
        css: String,
        /// Text content to exclude
        text: String,
    },
    /// Test ID selector (data-testid attribute)
    TestId(String),
    /// Input whose placeholder contains the text
    Placeholder(String),
    /// ARIA role with optional accessible name
    Role {
        /// Role name (e.g. "button")
        role: String,
        /// Accessible name substring
        name: Option<String>,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::XPath(selector.into())
    }

    /// Create a substring text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: false,
        }
    }

    /// Create an exact text selector
    #[must_use]
    pub fn exact_text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: true,
        }
    }

    /// Create a CSS selector with a text filter
    #[must_use]
    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Create a CSS selector excluding elements with the text
    #[must_use]
    pub fn css_without_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithoutText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Create a placeholder selector
    #[must_use]
    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::Placeholder(text.into())
    }

    /// Create a role selector
    #[must_use]
    pub fn role(role: impl Into<String>, name: Option<&str>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.map(str::to_string),
        }
    }

    /// JavaScript expression yielding an array of matches under `root`
    ///
    /// The expression expects a variable named `root` (a `Document` or
    /// `Element`) to be in scope.
    #[must_use]
    pub fn to_query_all(&self) -> String {
        match self {
            Self::Css(s) => format!("Array.from(root.querySelectorAll({}))", js_str(s)),
            Self::XPath(s) => format!(
                "(() => {{ const r = document.evaluate({}, root, null, \
                 XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; \
                 for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); \
                 return out; }})()",
                js_str(s)
            ),
            Self::Text { text, exact } => {
                let test = if *exact {
                    "(el.textContent || '').trim() === t"
                } else {
                    "(el.textContent || '').includes(t)"
                };
                format!(
                    "(() => {{ const t = {}; const hit = el => {test}; \
                     return Array.from(root.querySelectorAll('*')).filter(el => hit(el) \
                     && !Array.from(el.children).some(hit)); }})()",
                    js_str(text)
                )
            }
            Self::CssWithText { css, text } => format!(
                "Array.from(root.querySelectorAll({})).filter(el => (el.textContent || '').includes({}))",
                js_str(css),
                js_str(text)
            ),
            Self::CssWithoutText { css, text } => format!(
                "Array.from(root.querySelectorAll({})).filter(el => !(el.textContent || '').includes({}))",
                js_str(css),
                js_str(text)
            ),
            Self::TestId(id) => format!(
                "Array.from(root.querySelectorAll({}))",
                js_str(&format!("[data-testid=\"{id}\"]"))
            ),
            Self::Placeholder(p) => format!(
                "Array.from(root.querySelectorAll('input, textarea')).filter(el => (el.getAttribute('placeholder') || '').includes({}))",
                js_str(p)
            ),
            Self::Role { role, name } => {
                let implicit = match role.as_str() {
                    "button" => ", button, input[type=\"submit\"]",
                    "link" => ", a[href]",
                    "checkbox" => ", input[type=\"checkbox\"]",
                    "textbox" => ", input:not([type]), input[type=\"text\"], textarea",
                    _ => "",
                };
                let css = format!("[role=\"{role}\"]{implicit}");
                match name {
                    Some(n) => format!(
                        "Array.from(root.querySelectorAll({})).filter(el => ((el.getAttribute('aria-label') || '') + (el.textContent || '')).includes({}))",
                        js_str(&css),
                        js_str(n)
                    ),
                    None => format!("Array.from(root.querySelectorAll({}))", js_str(&css)),
                }
            }
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css(s) => write!(f, "{s}"),
            Self::XPath(s) => write!(f, "xpath={s}"),
            Self::Text { text, exact: true } => write!(f, "text=\"{text}\""),
            Self::Text { text, exact: false } => write!(f, "text={text}"),
            Self::CssWithText { css, text } => write!(f, "{css}:has-text(\"{text}\")"),
            Self::CssWithoutText { css, text } => {
                write!(f, "{css}:not(:has-text(\"{text}\"))")
            }
            Self::TestId(id) => write!(f, "[data-testid=\"{id}\"]"),
            Self::Placeholder(p) => write!(f, "[placeholder*=\"{p}\"]"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Role {
                role,
                name: Some(n),
            } => write!(f, "role={role}[name=\"{n}\"]"),
        }
    }
}

/// One concrete way of locating a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// Short label used in logs
    pub name: String,
    /// Selector to query
    pub selector: Selector,
}

impl Strategy {
    /// Create a strategy; its name defaults to the selector's display form
    #[must_use]
    pub fn new(selector: Selector) -> Self {
        Self {
            name: selector.to_string(),
            selector,
        }
    }
}

/// What to find plus the ordered ways of finding it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    role: String,
    strategies: Vec<Strategy>,
}

impl TargetDescriptor {
    /// Create an empty descriptor for a semantic role
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            strategies: Vec::new(),
        }
    }

    /// Append a strategy
    #[must_use]
    pub fn strategy(mut self, selector: Selector) -> Self {
        self.strategies.push(Strategy::new(selector));
        self
    }

    /// Append a CSS strategy
    #[must_use]
    pub fn css(self, css: impl Into<String>) -> Self {
        self.strategy(Selector::css(css))
    }

    /// Append several CSS strategies in order
    #[must_use]
    pub fn css_all<I, S>(self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        selectors
            .into_iter()
            .fold(self, |descriptor, css| descriptor.css(css))
    }

    /// Append a substring text strategy
    #[must_use]
    pub fn text(self, text: impl Into<String>) -> Self {
        self.strategy(Selector::text(text))
    }

    /// Append an exact text strategy
    #[must_use]
    pub fn exact_text(self, text: impl Into<String>) -> Self {
        self.strategy(Selector::exact_text(text))
    }

    /// Append a `css:has-text(text)` strategy
    #[must_use]
    pub fn css_with_text(self, css: impl Into<String>, text: impl Into<String>) -> Self {
        self.strategy(Selector::css_with_text(css, text))
    }

    /// Semantic role
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Strategies in priority order
    #[must_use]
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Number of strategies
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether the descriptor has no strategies
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Outcome of resolving a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A strategy produced a visible element
    Found {
        /// The element
        element: ElementHandle,
        /// Position of the winning strategy
        strategy_index: usize,
        /// Name of the winning strategy
        strategy_name: String,
    },
    /// Every strategy was exhausted
    NotFound {
        /// Semantic role of the target
        role: String,
        /// Strategies attempted
        tried: usize,
    },
}

impl Resolution {
    /// The found element, if any
    #[must_use]
    pub fn element(&self) -> Option<&ElementHandle> {
        match self {
            Self::Found { element, .. } => Some(element),
            Self::NotFound { .. } => None,
        }
    }

    /// Whether an element was found
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// Convert into the element, treating NotFound as an error
    pub fn into_result(self) -> ComprobarResult<ElementHandle> {
        match self {
            Self::Found { element, .. } => Ok(element),
            Self::NotFound { role, tried } => Err(ComprobarError::NotFound {
                target: role,
                tried,
            }),
        }
    }

    /// Convert into an optional element
    #[must_use]
    pub fn into_element(self) -> Option<ElementHandle> {
        match self {
            Self::Found { element, .. } => Some(element),
            Self::NotFound { .. } => None,
        }
    }
}

/// Tries a descriptor's strategies in order until one yields a visible element
#[derive(Debug, Clone, Copy)]
pub struct SelectorResolver {
    per_strategy_timeout: Duration,
    poll_interval: Duration,
}

impl Default for SelectorResolver {
    fn default() -> Self {
        Self {
            per_strategy_timeout: Duration::from_millis(DEFAULT_STRATEGY_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl SelectorResolver {
    /// Create a resolver with default timings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-strategy visibility timeout
    #[must_use]
    pub const fn with_strategy_timeout(mut self, timeout: Duration) -> Self {
        self.per_strategy_timeout = timeout;
        self
    }

    /// Set the visibility polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Per-strategy visibility timeout
    #[must_use]
    pub const fn strategy_timeout(&self) -> Duration {
        self.per_strategy_timeout
    }

    /// Resolve the descriptor to the first visible element
    pub async fn resolve<D: PageDriver + ?Sized>(
        &self,
        page: &D,
        descriptor: &TargetDescriptor,
        scope: Option<&ElementHandle>,
    ) -> Resolution {
        for (index, strategy) in descriptor.strategies().iter().enumerate() {
            match self.try_strategy(page, strategy, scope).await {
                Ok(Some(element)) => {
                    debug!(
                        target_role = descriptor.role(),
                        strategy = %strategy.name,
                        index,
                        "resolved"
                    );
                    return Resolution::Found {
                        element,
                        strategy_index: index,
                        strategy_name: strategy.name.clone(),
                    };
                }
                Ok(None) => {
                    debug!(target_role = descriptor.role(), strategy = %strategy.name, "no visible match");
                }
                Err(e) => {
                    debug!(target_role = descriptor.role(), strategy = %strategy.name, error = %e, "strategy failed, skipping");
                }
            }
        }
        Resolution::NotFound {
            role: descriptor.role().to_string(),
            tried: descriptor.len(),
        }
    }

    /// Every match of the first strategy that matches anything
    ///
    /// Visibility is not required; used to enumerate rows.
    pub async fn resolve_all<D: PageDriver + ?Sized>(
        &self,
        page: &D,
        descriptor: &TargetDescriptor,
        scope: Option<&ElementHandle>,
    ) -> Vec<ElementHandle> {
        for strategy in descriptor.strategies() {
            match page.query_all(&strategy.selector, scope).await {
                Ok(found) if !found.is_empty() => {
                    debug!(target_role = descriptor.role(), strategy = %strategy.name, count = found.len(), "matched");
                    return found;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(target_role = descriptor.role(), strategy = %strategy.name, error = %e, "strategy failed, skipping");
                }
            }
        }
        Vec::new()
    }

    async fn try_strategy<D: PageDriver + ?Sized>(
        &self,
        page: &D,
        strategy: &Strategy,
        scope: Option<&ElementHandle>,
    ) -> ComprobarResult<Option<ElementHandle>> {
        let deadline = Instant::now() + self.per_strategy_timeout;
        loop {
            let first = page
                .query_all(&strategy.selector, scope)
                .await?
                .into_iter()
                .next();
            if let Some(element) = first {
                if page.is_visible(&element).await? {
                    return Ok(Some(element));
                }
            }
            if Instant::now() + self.poll_interval > deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
