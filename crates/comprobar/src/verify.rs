//! Evidence-based field verification.
//!
//! A field passes when any independent evidence source corroborates the
//! expected value. A rendered placeholder (`单据状态：-`) means the field is
//! still loading, which is never a mismatch.
//!
//! ## Decision rule
//!
//! 1. Sentinel present in the page text: [`Verdict::StillLoading`]
//! 2. Expected value found in any source: [`Verdict::Pass`]
//! 3. Sources obtained but none corroborates: [`Verdict::Fail`]
//! 4. No source obtainable: [`Verdict::Inconclusive`]

use crate::driver::{ElementHandle, PageDriver};
use crate::result::{ComprobarError, ComprobarResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Placeholder rendered for fields whose data has not arrived
pub const DEFAULT_PLACEHOLDER: &str = "-";

/// Characters of observed text quoted in failures
pub const FAILURE_EXCERPT_CHARS: usize = 200;

/// Extracts the rendered store code from the detail header
pub const STORE_CODE_PATTERN: &str = r"订货门店编号[：:]\s*(\d+)";

// =============================================================================
// EXCERPTS
// =============================================================================

/// Leading `max` characters of `text`
#[must_use]
pub fn excerpt_head(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Trailing `max` characters of `text`
#[must_use]
pub fn excerpt_tail(text: &str, max: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max)).collect()
}

// =============================================================================
// SENTINEL
// =============================================================================

/// Placeholder shown in a `label：value` pair before data loads
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sentinel {
    /// Field label (e.g. `单据状态`)
    pub label: String,
    /// Placeholder value
    pub placeholder: String,
}

impl Sentinel {
    /// Sentinel with the default `-` placeholder
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }

    /// Use a different placeholder
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// Full-width colon form, as the back office renders it
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}：{}", self.label, self.placeholder)
    }

    /// ASCII colon form
    #[must_use]
    pub fn render_ascii(&self) -> String {
        format!("{}:{}", self.label, self.placeholder)
    }

    /// Whether either form appears in `text`
    #[must_use]
    pub fn is_present(&self, text: &str) -> bool {
        text.contains(&self.render()) || text.contains(&self.render_ascii())
    }
}

impl std::fmt::Display for Sentinel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

// =============================================================================
// EVIDENCE
// =============================================================================

/// Where corroboration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvidenceSource {
    /// Text of an isolated element (row, card, header)
    ScopedElement,
    /// Rendered text of the whole document
    Document,
    /// Current URL
    Url,
    /// Value extracted by pattern from the document
    ExtractedIdentifier,
}

impl std::fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ScopedElement => "scoped element",
            Self::Document => "document",
            Self::Url => "url",
            Self::ExtractedIdentifier => "extracted identifier",
        };
        f.write_str(name)
    }
}

/// Observations gathered to verify one field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// Text of the scope element, if one was isolated
    pub scoped_text: Option<String>,
    /// Whole-document rendered text
    pub document_text: Option<String>,
    /// Current URL
    pub url: Option<String>,
}

impl EvidenceBundle {
    /// Bundle from document text only
    #[must_use]
    pub fn from_document(text: impl Into<String>) -> Self {
        Self {
            document_text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Add scoped element text
    #[must_use]
    pub fn with_scoped(mut self, text: impl Into<String>) -> Self {
        self.scoped_text = Some(text.into());
        self
    }

    /// Add the URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Gather every obtainable source; failures leave the source empty
    pub async fn collect<D: PageDriver + ?Sized>(page: &D, scope: Option<&ElementHandle>) -> Self {
        let scoped_text = match scope {
            Some(element) => match page.text_content(element).await {
                Ok(text) => Some(text),
                Err(e) => {
                    debug!(error = %e, "scoped text unavailable");
                    None
                }
            },
            None => None,
        };
        let document_text = match page.body_text().await {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(error = %e, "document text unavailable");
                None
            }
        };
        let url = page.current_url().await.ok();
        Self {
            scoped_text,
            document_text,
            url,
        }
    }

    /// Whether no source was obtained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scoped_text.is_none() && self.document_text.is_none() && self.url.is_none()
    }

    /// Sources that were obtained, in checking order
    #[must_use]
    pub fn sources(&self) -> Vec<EvidenceSource> {
        self.entries().map(|(source, _)| source).collect()
    }

    fn entries(&self) -> impl Iterator<Item = (EvidenceSource, &str)> {
        [
            (EvidenceSource::ScopedElement, self.scoped_text.as_deref()),
            (EvidenceSource::Document, self.document_text.as_deref()),
            (EvidenceSource::Url, self.url.as_deref()),
        ]
        .into_iter()
        .filter_map(|(source, text)| text.map(|t| (source, t)))
    }

    fn observed_excerpt(&self) -> String {
        self.scoped_text
            .as_deref()
            .or(self.document_text.as_deref())
            .or(self.url.as_deref())
            .map(|t| excerpt_head(t, FAILURE_EXCERPT_CHARS))
            .unwrap_or_default()
    }

    fn fail(&self, reason: String) -> Verdict {
        Verdict::Fail {
            reason,
            checked: self.sources(),
            observed: self.observed_excerpt(),
        }
    }
}

// =============================================================================
// VERDICT
// =============================================================================

/// Result of checking one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// A source corroborated the value
    Pass {
        /// The corroborating source
        source: EvidenceSource,
    },
    /// The field's sentinel is still rendered; poll again
    StillLoading {
        /// The rendered sentinel
        sentinel: String,
    },
    /// No source corroborated the value
    Fail {
        /// What did not match
        reason: String,
        /// Sources consulted
        checked: Vec<EvidenceSource>,
        /// Excerpt of what was observed
        observed: String,
    },
    /// No source could be obtained
    Inconclusive,
}

impl Verdict {
    /// Whether the field passed
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass { .. })
    }

    /// Escalate anything but a pass to an error
    ///
    /// A sentinel still present at this point means the wait budget ran out.
    pub fn into_result(self, field: &str, expected: &str) -> ComprobarResult<EvidenceSource> {
        match self {
            Self::Pass { source } => Ok(source),
            Self::StillLoading { sentinel } => Err(ComprobarError::TimedOut {
                waited_for: format!("{field} to load"),
                elapsed_ms: 0,
                last_observed: sentinel,
            }),
            Self::Fail {
                reason,
                checked,
                observed,
            } => Err(ComprobarError::VerificationFailed {
                field: field.to_string(),
                expected: expected.to_string(),
                observed: format!("{observed} ({reason})"),
                sources: checked
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
            Self::Inconclusive => Err(ComprobarError::Inconclusive {
                field: field.to_string(),
            }),
        }
    }
}

/// Check a field against every source in the bundle
pub fn verify_field(
    name: &str,
    expected: &str,
    bundle: &EvidenceBundle,
    sentinel: Option<&Sentinel>,
) -> Verdict {
    if bundle.is_empty() {
        return Verdict::Inconclusive;
    }
    if let Some(sentinel) = sentinel {
        let loading = [bundle.document_text.as_deref(), bundle.scoped_text.as_deref()]
            .into_iter()
            .flatten()
            .any(|text| sentinel.is_present(text));
        if loading {
            debug!(field = name, %sentinel, "still loading");
            return Verdict::StillLoading {
                sentinel: sentinel.render(),
            };
        }
    }
    if let Some((source, _)) = bundle.entries().find(|(_, text)| text.contains(expected)) {
        info!(field = name, expected, %source, "field verified");
        return Verdict::Pass { source };
    }
    bundle.fail(format!("{expected:?} not found"))
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Relation under which an identifier was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentifierMatch {
    /// Identical
    Exact,
    /// Rendered value contains the expected one
    Contains,
    /// Expected value contains the rendered one
    ContainedBy,
    /// Rendered value ends with the expected one
    EndsWith,
    /// Rendered value starts with the expected one
    StartsWith,
    /// Rendered value widens one run of zeros (`10010` as `100000010`)
    ZeroPadded,
}

/// Tolerant identifier comparison
///
/// Accepts when any of the substring relations holds, or when the rendered
/// value only widens one internal run of zeros, since the same code is
/// rendered with different padding upstream. This also accepts unrelated
/// values that happen to overlap (`10010` inside `100100010`, or `1001` as
/// `10000001`).
#[must_use]
pub fn match_identifier(expected: &str, actual: &str) -> Option<IdentifierMatch> {
    let expected = expected.trim();
    let actual = actual.trim();
    if expected.is_empty() || actual.is_empty() {
        return None;
    }
    if actual == expected {
        Some(IdentifierMatch::Exact)
    } else if actual.starts_with(expected) {
        Some(IdentifierMatch::StartsWith)
    } else if actual.ends_with(expected) {
        Some(IdentifierMatch::EndsWith)
    } else if actual.contains(expected) {
        Some(IdentifierMatch::Contains)
    } else if expected.contains(actual) {
        Some(IdentifierMatch::ContainedBy)
    } else if widens_zero_run(expected, actual) {
        Some(IdentifierMatch::ZeroPadded)
    } else {
        None
    }
}

/// `actual` is `expected` with one of its zero runs lengthened
fn widens_zero_run(expected: &str, actual: &str) -> bool {
    if actual.len() <= expected.len() {
        return false;
    }
    zero_runs(expected).into_iter().any(|(start, end)| {
        let (head, tail) = (&expected[..start], &expected[end..]);
        actual.starts_with(head)
            && actual.ends_with(tail)
            && actual[head.len()..actual.len() - tail.len()]
                .bytes()
                .all(|b| b == b'0')
    })
}

/// Byte ranges of maximal `0` runs
fn zero_runs(text: &str) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut open: Option<usize> = None;
    for (i, b) in text.bytes().enumerate() {
        match (b == b'0', open) {
            (true, None) => open = Some(i),
            (false, Some(start)) => {
                runs.push((start, i));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        runs.push((start, text.len()));
    }
    runs
}

/// Compile [`STORE_CODE_PATTERN`]
pub fn store_code_pattern() -> ComprobarResult<Regex> {
    Regex::new(STORE_CODE_PATTERN).map_err(|e| ComprobarError::config(e.to_string()))
}

/// Verify an identifier extracted by `pattern` from the document text
///
/// When the pattern does not match at all, falls back to plain containment
/// across the bundle.
pub fn verify_identifier(
    name: &str,
    expected: &str,
    bundle: &EvidenceBundle,
    pattern: &Regex,
) -> Verdict {
    let extracted = bundle
        .document_text
        .as_deref()
        .and_then(|text| pattern.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let Some(actual) = extracted else {
        debug!(field = name, "identifier pattern not found, falling back to containment");
        return verify_field(name, expected, bundle, None);
    };

    match match_identifier(expected, &actual) {
        Some(IdentifierMatch::Exact) => {
            info!(field = name, expected, actual = %actual, "identifier verified");
            Verdict::Pass {
                source: EvidenceSource::ExtractedIdentifier,
            }
        }
        Some(relation) => {
            warn!(
                field = name,
                expected,
                actual = %actual,
                ?relation,
                "identifier accepted by loose match"
            );
            Verdict::Pass {
                source: EvidenceSource::ExtractedIdentifier,
            }
        }
        None => bundle.fail(format!(
            "rendered {actual:?} does not match {expected:?} under any relation"
        )),
    }
}

/// Presence of a record, from isolated rows or, failing that, the document
pub fn verify_row_presence(key: &str, rows: &[String], bundle: &EvidenceBundle) -> Verdict {
    if rows.iter().any(|row| row.contains(key)) {
        info!(key, rows = rows.len(), "record present in isolated row");
        return Verdict::Pass {
            source: EvidenceSource::ScopedElement,
        };
    }
    match bundle.document_text.as_deref() {
        Some(text) if text.contains(key) => {
            info!(key, "record present in document text, rows not isolated");
            Verdict::Pass {
                source: EvidenceSource::Document,
            }
        }
        Some(_) => bundle.fail(format!("{key:?} not found in rows or document")),
        None if rows.is_empty() => Verdict::Inconclusive,
        None => bundle.fail(format!("{key:?} not found in {} rows", rows.len())),
    }
}
