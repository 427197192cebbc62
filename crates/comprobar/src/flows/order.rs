//! Daily-demand orders: listing, date filter, detail header and line items.

use crate::action::{
    fill_verified, perform, press_with_navigation, Action, ActionOptions, NavigationExpectation,
};
use crate::config::RunnerConfig;
use crate::driver::{scroll_nudge, settle_load_state, ElementHandle, PageDriver};
use crate::locator::{Selector, SelectorResolver, TargetDescriptor};
use crate::network::UrlPattern;
use crate::result::{ComprobarError, ComprobarResult};
use crate::verify::{
    excerpt_tail, store_code_pattern, verify_field, verify_identifier, verify_row_presence,
    EvidenceBundle,
};
use crate::wait::{ConvergencePoller, Escalation, FieldChecklist, LoadState, TextProbe};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// URL fragment identifying the listing
pub const LISTING_FRAGMENT: &str = "demand-daily";

/// Attempts at the date picker before typing the date
pub const DATE_PICK_ATTEMPTS: u32 = 3;

/// Detail labels whose sentinel triggers the reload escalation
pub const CRITICAL_DETAIL_FIELDS: &[&str] = &["订货单号", "单据状态"];

const DATE_FORMAT: &str = "%Y-%m-%d";

const DAY_CELL_SCAN: &str =
    "[class*=\"day\"], [class*=\"date\"], [role=\"gridcell\"], td, [class*=\"calendar-day\"]";

const ROW_ANCESTOR: &str = "tr, [class*=\"row\"], [class*=\"item\"]";

const TABLE_ROWS: &str = "tr, [class*=\"row\"], [role=\"row\"]";

const HEADER_LABELS: &[&str] = &["商品编号", "商品名称"];

const FAILURE_EXCERPT_CHARS: usize = 500;

// ============================================================================
// Expectations
// ============================================================================

/// Inclusive date filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day
    pub start: NaiveDate,
    /// Last day
    pub end: NaiveDate,
}

impl DateRange {
    /// Range from two dates; `start` must not be after `end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> ComprobarResult<Self> {
        if start > end {
            return Err(ComprobarError::config(format!(
                "date range starts after it ends: {start} > {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` dates
    pub fn parse(start: &str, end: &str) -> ComprobarResult<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }
}

impl Default for DateRange {
    fn default() -> Self {
        let day = |d| NaiveDate::from_ymd_opt(2025, 12, d).unwrap_or(NaiveDate::MIN);
        Self {
            start: day(1),
            end: day(31),
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

fn parse_date(s: &str) -> ComprobarResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|e| ComprobarError::config(format!("invalid date {s:?}: {e}")))
}

/// Values asserted for one order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExpectation {
    /// Order number (订货单号)
    pub order_number: String,
    /// Document status (单据状态)
    pub status: String,
    /// Ordering store (订货门店)
    pub store: String,
    /// Source (来源)
    pub source: String,
    /// Order date (订货日期)
    pub order_date: String,
    /// Store code (订货门店编号)
    pub store_code: String,
}

impl Default for OrderExpectation {
    fn default() -> Self {
        Self {
            order_number: "342512080002".to_string(),
            status: "已审核".to_string(),
            store: "WEN测试直营门店01".to_string(),
            source: "总部分配".to_string(),
            order_date: "2025-12-08".to_string(),
            store_code: "10010".to_string(),
        }
    }
}

impl OrderExpectation {
    /// Fields shown in the listing row
    #[must_use]
    pub fn summary_fields(&self) -> [(&'static str, &str); 4] {
        [
            ("status", self.status.as_str()),
            ("store", self.store.as_str()),
            ("source", self.source.as_str()),
            ("order date", self.order_date.as_str()),
        ]
    }

    /// Header fields of the detail page, by their rendered label
    #[must_use]
    pub fn detail_checklist(&self) -> FieldChecklist {
        FieldChecklist::new()
            .field("订货单号", self.order_number.as_str())
            .field("单据状态", self.status.as_str())
            .field("来源", self.source.as_str())
            .field("订货日期", self.order_date.as_str())
            .field("订货门店", self.store.as_str())
    }
}

/// Values asserted for the order's line items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemExpectation {
    /// Product code (商品编号)
    pub product_code: String,
    /// Product name (商品名称)
    pub product_name: String,
    /// Minimum number of rows carrying the code
    pub expected_count: usize,
}

impl Default for LineItemExpectation {
    fn default() -> Self {
        Self {
            product_code: "T20251128012".to_string(),
            product_name: "测试20251128012".to_string(),
            expected_count: 1,
        }
    }
}

// ============================================================================
// Target descriptors
// ============================================================================

/// Which end of the date range an input holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInput {
    /// Range start
    Start,
    /// Range end
    End,
}

impl DateInput {
    /// Descriptor of the input
    #[must_use]
    pub fn descriptor(self) -> TargetDescriptor {
        match self {
            Self::Start => TargetDescriptor::new("start date input").css_all([
                "input[aria-label*=\"Start Time\"]",
                "input[aria-label*=\"Start\"]",
                "input[placeholder*=\"Start\"]",
                "input[placeholder*=\"开始\"]",
            ]),
            Self::End => TargetDescriptor::new("end date input").css_all([
                "input[aria-label*=\"End Time\"]",
                "input[aria-label*=\"End\"]",
                "input[placeholder*=\"End\"]",
                "input[placeholder*=\"结束\"]",
            ]),
        }
    }
}

impl std::fmt::Display for DateInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::End => "end",
        })
    }
}

/// Open calendar panel
#[must_use]
pub fn date_picker_panel() -> TargetDescriptor {
    TargetDescriptor::new("date picker panel").css_all([
        "[class*=\"calendar\"]",
        "[class*=\"date-picker\"]",
        "[class*=\"picker\"]",
        "[class*=\"DatePicker\"]",
        "[role=\"dialog\"]",
        "[class*=\"ant-picker-dropdown\"]",
        "[class*=\"rc-calendar\"]",
        ".ant-picker-dropdown",
        ".rc-calendar-picker",
    ])
}

/// Day cell of `date`, by the attributes calendars put on cells
#[must_use]
pub fn day_cell(date: NaiveDate) -> TargetDescriptor {
    let iso = date.format(DATE_FORMAT).to_string();
    let (y, m, d) = (date.year(), date.month(), date.day());
    TargetDescriptor::new("day cell").css_all([
        format!("[aria-label*=\"{iso}\"]"),
        format!("[data-date=\"{iso}\"]"),
        format!("[data-value=\"{iso}\"]"),
        format!("[title*=\"{iso}\"]"),
        format!("[aria-label*=\"{y}年{m}月{d}日\"]"),
        format!("[aria-label*=\"{y}-{m}-{d}\"]"),
    ])
}

/// Button submitting the listing filter
#[must_use]
pub fn query_button() -> TargetDescriptor {
    TargetDescriptor::new("query button")
        .css_with_text("button", "查询")
        .css_with_text("button", "Search")
        .css("button[type=\"submit\"]")
        .css_with_text("button.btn-primary", "查询")
        .css_all([
            "button.ant-btn-primary",
            "[class*=\"query-button\"]",
            "[class*=\"search-button\"]",
            "button:has([class*=\"search\"])",
            "button:has([class*=\"query\"])",
        ])
}

/// Listing table, recognised by its column headers
#[must_use]
pub fn order_table() -> TargetDescriptor {
    TargetDescriptor::new("order table")
        .css_with_text("table", "订货单号")
        .css_with_text("table", "状态")
        .css_with_text("[class*=\"table\"]", "订货单号")
        .css_with_text("[class*=\"table\"]", "状态")
        .css_with_text("[role=\"table\"]", "订货单号")
        .css_with_text("[role=\"grid\"]", "订货单号")
}

/// Link from the listing to the order detail
#[must_use]
pub fn order_link(order_number: &str) -> TargetDescriptor {
    TargetDescriptor::new("order detail link")
        .exact_text(order_number)
        .css_with_text("a", order_number)
        .css(format!("a[href*=\"{order_number}\"]"))
        .css(format!("[href*=\"{order_number}\"]"))
}

/// Product table on the detail page
#[must_use]
pub fn product_table() -> TargetDescriptor {
    TargetDescriptor::new("product table")
        .css_with_text("table", "商品编号")
        .css_with_text("[class*=\"table\"]", "商品编号")
        .css_with_text("[role=\"table\"]", "商品编号")
}

/// Line item rows, most specific first
#[must_use]
pub fn line_item_rows(product_code: &str) -> TargetDescriptor {
    TargetDescriptor::new("line item rows")
        .css_with_text("tr", product_code)
        .strategy(Selector::css_without_text("tr", "商品编号"))
        .css_all([
            "[class*=\"product-row\"]",
            "[class*=\"item-row\"]",
            "tr:has([class*=\"product-code\"])",
            "tbody tr",
            "table tr",
        ])
}

// ============================================================================
// Listing
// ============================================================================

/// Open the daily-demand listing
///
/// A navigation error is tolerated when the listing URL was reached anyway.
pub async fn navigate_to_daily_demand(
    page: &mut dyn PageDriver,
    config: &RunnerConfig,
) -> ComprobarResult<()> {
    let timeouts = &config.timeouts;
    let url = config.boh_url("storeOperations", "order")?;
    info!(%url, "opening daily demand listing");

    let navigated = match tokio::time::timeout(timeouts.navigation, page.navigate(&url)).await {
        Ok(result) => result,
        Err(_) => Err(ComprobarError::NavigationError {
            url: url.clone(),
            message: format!("no response within {}ms", millis(timeouts.navigation)),
        }),
    };
    if let Err(e) = navigated {
        let current = page.current_url().await.unwrap_or_default();
        if !current.contains(LISTING_FRAGMENT) {
            return Err(e);
        }
        warn!(error = %e, %current, "navigation reported an error but the listing is loaded");
    }

    settle_load_state(&*page, LoadState::DomContentLoaded, timeouts.page_load).await;
    settle_load_state(&*page, LoadState::NetworkIdle, timeouts.network_idle).await;
    tokio::time::sleep(timeouts.post_navigation).await;
    Ok(())
}

/// Apply the date filter and submit the query
pub async fn select_date_range_and_query(
    page: &mut dyn PageDriver,
    config: &RunnerConfig,
    range: &DateRange,
) -> ComprobarResult<()> {
    if !on_listing(&*page).await {
        info!("not on the listing, navigating there first");
        navigate_to_daily_demand(page, config).await?;
    }

    pick_date(&*page, config, DateInput::Start, range.start).await?;
    pick_date(&*page, config, DateInput::End, range.end).await?;
    trigger_query(&*page, config).await?;
    info!(%range, "date filter applied");

    if !on_listing(&*page).await {
        warn!("query left the listing, navigating back");
        navigate_to_daily_demand(page, config).await?;
    }
    Ok(())
}

/// Locate the order in the listing and check its summary fields
///
/// Evidence comes from the isolated row when possible, otherwise from the
/// document text.
pub async fn find_order_in_list(
    page: &dyn PageDriver,
    config: &RunnerConfig,
    expectation: &OrderExpectation,
) -> ComprobarResult<()> {
    let number = expectation.order_number.as_str();
    scroll_nudge(page).await;

    let rows = isolate_order_rows(page, config, number).await;
    let document = EvidenceBundle::collect(page, None).await;
    verify_row_presence(number, &rows, &document).into_result("order number", number)?;

    let bundle = if rows.is_empty() {
        document
    } else {
        document.with_scoped(rows.join("\n"))
    };
    for (field, expected) in expectation.summary_fields() {
        verify_field(field, expected, &bundle, None).into_result(field, expected)?;
    }
    info!(order = number, rows = rows.len(), "order summary verified");
    Ok(())
}

/// Click through to the order detail
///
/// Failing to click is logged only; the detail verification decides.
pub async fn open_order_detail(
    page: &dyn PageDriver,
    config: &RunnerConfig,
    order_number: &str,
) -> ComprobarResult<()> {
    let timeouts = &config.timeouts;
    match config
        .resolver()
        .resolve(page, &order_link(order_number), None)
        .await
        .into_element()
    {
        Some(link) => {
            let options = config.action_options().expecting(
                NavigationExpectation::new(timeouts.navigation_confirm)
                    .url(UrlPattern::glob("**/detail**"))
                    .url(UrlPattern::glob("**/order/**"))
                    .load_state(LoadState::DomContentLoaded),
            );
            let outcome = perform(page, &Action::Click, &link, &options).await;
            if outcome.succeeded() {
                info!(order = order_number, ?outcome, "order detail opened");
            } else {
                warn!(order = order_number, ?outcome, "could not open order detail, verifying the current page");
            }
        }
        None => warn!(order = order_number, "order link not found"),
    }

    settle_load_state(page, LoadState::NetworkIdle, timeouts.network_idle).await;
    tokio::time::sleep(timeouts.post_navigation).await;
    Ok(())
}

// ============================================================================
// Detail
// ============================================================================

/// Wait for the detail header to load, then verify every field
///
/// A header still showing `订货单号：-` or `单据状态：-` after the field
/// budget is reloaded once; any sentinel left after that is a timeout.
pub async fn verify_order_detail(
    page: &mut dyn PageDriver,
    config: &RunnerConfig,
    expectation: &OrderExpectation,
) -> ComprobarResult<()> {
    let timeouts = &config.timeouts;
    let started = Instant::now();
    let number = expectation.order_number.as_str();

    let number_probe = TextProbe::new(format!("order number {number}"), move |text: &str| {
        text.contains(number)
    });
    let found =
        ConvergencePoller::poll_until(&*page, &timeouts.detail_order_number, &number_probe).await;
    if !found.is_converged() {
        warn!(order = number, attempts = found.attempts(), "order number not rendered yet, nudging");
        scroll_nudge(&*page).await;
    }

    let checklist = expectation.detail_checklist();
    let mut fields = ConvergencePoller::poll_until(&*page, &timeouts.detail_fields, &checklist).await;
    if !fields.is_converged() {
        let text = page.body_text().await.unwrap_or_default();
        let stuck = critical_sentinels(&checklist, &text);
        if stuck.is_empty() {
            debug!(pending = ?checklist.pending(&text), "fields pending without sentinels, verifying as rendered");
        } else {
            warn!(?stuck, "detail header still loading, reloading once");
            if let Err(e) = Escalation::Reload.apply(page).await {
                warn!(error = %e, "reload failed, polling anyway");
            }
            fields =
                ConvergencePoller::poll_until(&*page, &timeouts.detail_after_reload, &checklist).await;
        }
    }
    debug!(converged = fields.is_converged(), attempts = fields.attempts(), "detail wait finished");

    let bundle = EvidenceBundle::collect(&*page, None).await;
    let text = bundle.document_text.as_deref().unwrap_or_default();
    let loading = checklist.sentinels_present(text);
    if !loading.is_empty() {
        return Err(ComprobarError::TimedOut {
            waited_for: format!("order detail fields {}", loading.join(", ")),
            elapsed_ms: millis(started.elapsed()),
            last_observed: excerpt_tail(text, FAILURE_EXCERPT_CHARS),
        });
    }

    for entry in checklist.entries() {
        verify_field(&entry.label, &entry.expected, &bundle, entry.sentinel.as_ref())
            .into_result(&entry.label, &entry.expected)?;
    }
    verify_identifier(
        "store code",
        &expectation.store_code,
        &bundle,
        &store_code_pattern()?,
    )
    .into_result("store code", &expectation.store_code)?;

    info!(order = number, elapsed_ms = millis(started.elapsed()), "order detail verified");
    Ok(())
}

/// Verify the line item rows of the detail page
///
/// With rows isolated the count is checked as a minimum; otherwise the
/// document text corroborates presence only.
pub async fn verify_line_items(
    page: &dyn PageDriver,
    config: &RunnerConfig,
    expectation: &LineItemExpectation,
) -> ComprobarResult<()> {
    let code = expectation.product_code.as_str();
    let resolver = config.resolver();

    let table = resolver.resolve(page, &product_table(), None).await.into_element();
    if table.is_none() {
        debug!("product table not found, searching rows across the page");
    }
    let candidates = resolver
        .resolve_all(page, &line_item_rows(code), table.as_ref())
        .await;
    let mut rows = Vec::new();
    for row in &candidates {
        match page.text_content(row).await {
            Ok(text) if is_data_row(&text, code) => rows.push(text),
            Ok(_) => {}
            Err(e) => debug!(row = %row.id, error = %e, "row text unavailable"),
        }
    }

    let document = EvidenceBundle::collect(page, None).await;
    verify_row_presence(code, &rows, &document).into_result("product code", code)?;
    if rows.is_empty() {
        warn!(code, "line item rows not isolated, corroborated by the document text");
    }

    let bundle = if rows.is_empty() {
        document
    } else {
        document.with_scoped(rows.join("\n"))
    };
    verify_field("product name", &expectation.product_name, &bundle, None)
        .into_result("product name", &expectation.product_name)?;

    if !rows.is_empty() && rows.len() < expectation.expected_count {
        return Err(ComprobarError::VerificationFailed {
            field: "line item count".to_string(),
            expected: format!("at least {}", expectation.expected_count),
            observed: rows.len().to_string(),
            sources: "scoped element".to_string(),
        });
    }
    info!(code, rows = rows.len(), "line items verified");
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

async fn on_listing(page: &dyn PageDriver) -> bool {
    page.current_url()
        .await
        .map(|url| url.contains(LISTING_FRAGMENT))
        .unwrap_or(false)
}

async fn pick_date(
    page: &dyn PageDriver,
    config: &RunnerConfig,
    input: DateInput,
    date: NaiveDate,
) -> ComprobarResult<()> {
    let resolver = config.resolver();
    let options = config.action_options();
    let field = resolver
        .resolve(page, &input.descriptor(), None)
        .await
        .into_result()?;

    for attempt in 1..=DATE_PICK_ATTEMPTS {
        match click_day(page, &resolver, &options, &field, date).await {
            Ok(true) => {
                info!(%input, %date, attempt, "date picked");
                return Ok(());
            }
            Ok(false) => debug!(%input, %date, attempt, "day cell not reachable"),
            Err(e) => warn!(%input, %date, attempt, error = %e, "date picker attempt failed"),
        }
        tokio::time::sleep(options.backoff).await;
    }

    warn!(%input, %date, "date picker unusable, typing the date");
    let typed = fill_verified(page, &field, &date.format(DATE_FORMAT).to_string(), &options).await?;
    debug!(%input, typed, "date typed");
    Ok(())
}

async fn click_day(
    page: &dyn PageDriver,
    resolver: &SelectorResolver,
    options: &ActionOptions,
    field: &ElementHandle,
    date: NaiveDate,
) -> ComprobarResult<bool> {
    perform(page, &Action::Click, field, options)
        .await
        .into_result("open date picker")?;
    let Some(panel) = resolver
        .resolve(page, &date_picker_panel(), None)
        .await
        .into_element()
    else {
        return Ok(false);
    };

    let cell = match resolver
        .resolve(page, &day_cell(date), Some(&panel))
        .await
        .into_element()
    {
        Some(cell) => Some(cell),
        None => scan_day_cells(page, &panel, date.day()).await,
    };
    match cell {
        Some(cell) => {
            perform(page, &Action::Click, &cell, options)
                .await
                .into_result("click day cell")?;
            Ok(true)
        }
        None => Ok(false),
    }
}

async fn scan_day_cells(
    page: &dyn PageDriver,
    panel: &ElementHandle,
    day: u32,
) -> Option<ElementHandle> {
    let cells = page
        .query_all(&Selector::css(DAY_CELL_SCAN), Some(panel))
        .await
        .ok()?;
    let day = day.to_string();
    for cell in cells {
        let Ok(text) = page.text_content(&cell).await else {
            continue;
        };
        if text.trim() != day || is_disabled(page, &cell).await {
            continue;
        }
        if page.is_visible(&cell).await.unwrap_or(false) {
            return Some(cell);
        }
    }
    None
}

async fn is_disabled(page: &dyn PageDriver, cell: &ElementHandle) -> bool {
    let class = page
        .attribute(cell, "class")
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    let aria = page.attribute(cell, "aria-disabled").await.ok().flatten();
    class.contains("disabled") || aria.as_deref() == Some("true")
}

async fn trigger_query(page: &dyn PageDriver, config: &RunnerConfig) -> ComprobarResult<()> {
    let timeouts = &config.timeouts;
    let resolver = config.resolver();
    let mut button = resolver.resolve(page, &query_button(), None).await.into_element();
    if button.is_none() {
        debug!("query button not visible, scrolling");
        scroll_nudge(page).await;
        button = resolver.resolve(page, &query_button(), None).await.into_element();
    }

    let navigation = NavigationExpectation::new(timeouts.navigation_confirm)
        .url(UrlPattern::glob("**/demand-daily**"))
        .load_state(LoadState::NetworkIdle);
    match button {
        Some(button) => {
            let options = config
                .action_options()
                .expecting(navigation)
                .with_fallback_key("Enter");
            let outcome = perform(page, &Action::Click, &button, &options)
                .await
                .into_result("click query button")?;
            debug!(?outcome, "query submitted");
        }
        None => {
            warn!("query button not found, pressing Enter");
            press_with_navigation(page, "Enter", Some(&navigation)).await?;
        }
    }
    tokio::time::sleep(timeouts.post_navigation).await;
    Ok(())
}

async fn isolate_order_rows(page: &dyn PageDriver, config: &RunnerConfig, number: &str) -> Vec<String> {
    let cell_resolver = config.resolver().with_strategy_timeout(config.timeouts.list_row);
    let cell = TargetDescriptor::new("order number cell").exact_text(number);
    if let Some(cell) = cell_resolver.resolve(page, &cell, None).await.into_element() {
        match page.closest(&cell, &Selector::css(ROW_ANCESTOR)).await {
            Ok(Some(row)) => match page.text_content(&row).await {
                Ok(text) => return vec![text],
                Err(e) => debug!(error = %e, "row text unavailable"),
            },
            Ok(None) => debug!("order number is not inside a row"),
            Err(e) => debug!(error = %e, "row lookup failed"),
        }
    }

    if let Some(table) = config
        .resolver()
        .resolve(page, &order_table(), None)
        .await
        .into_element()
    {
        let found = page
            .query_all(&Selector::css(TABLE_ROWS), Some(&table))
            .await
            .unwrap_or_default();
        let mut texts = Vec::new();
        for row in &found {
            if let Ok(text) = page.text_content(row).await {
                if text.contains(number) {
                    texts.push(text);
                }
            }
        }
        if !texts.is_empty() {
            debug!(rows = texts.len(), "order rows found by table scan");
            return texts;
        }
    }

    warn!(order = number, "order row not isolated, falling back to the document text");
    Vec::new()
}

fn critical_sentinels<'a>(checklist: &'a FieldChecklist, text: &str) -> Vec<&'a str> {
    checklist
        .sentinels_present(text)
        .into_iter()
        .filter(|label| CRITICAL_DETAIL_FIELDS.contains(label))
        .collect()
}

fn is_data_row(text: &str, code: &str) -> bool {
    text.contains(code) && !HEADER_LABELS.iter().any(|label| text.contains(label))
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Timeouts;
    use crate::mock::{ClickEffect, MockElement, MockPage, MockScreen};

    const LISTING: &str = "https://saas-boh-qa.hexcloud.cn/store-supply/demand-daily";
    const DETAIL: &str = "https://saas-boh-qa.hexcloud.cn/store-supply/demand-daily/detail/342512080002";

    const LOADED_DETAIL: &str = "订货单号：342512080002 单据状态：已审核 来源：总部分配 \
        订货日期：2025-12-08 订货门店：WEN测试直营门店01 订货门店编号：100000010";

    fn config() -> RunnerConfig {
        RunnerConfig::default().with_timeouts(Timeouts::fast())
    }

    fn listing_row() -> Vec<MockElement> {
        let cell = |id: &str, text: &str| MockElement::new(id, "td").parent("row").text(text);
        vec![
            MockElement::new("row", "tr").parent("tbl"),
            cell("c-no", ""),
            MockElement::new("link", "a")
                .parent("c-no")
                .text("342512080002")
                .navigates_to(DETAIL),
            cell("c-status", "已审核"),
            cell("c-store", "WEN测试直营门店01"),
            cell("c-source", "总部分配"),
            cell("c-date", "2025-12-08"),
        ]
    }

    fn listing_screen() -> MockScreen {
        let screen = MockScreen::new(LISTING)
            .element(MockElement::new("tbl", "table"))
            .element(MockElement::new("head", "tr").parent("tbl").text("订货单号 状态"));
        listing_row().into_iter().fold(screen, MockScreen::element)
    }

    mod expectation_tests {
        use super::*;

        #[test]
        fn test_date_range_validation() {
            let range = DateRange::parse("2025-12-01", "2025-12-31").unwrap();
            assert_eq!(range, DateRange::default());
            assert_eq!(range.to_string(), "2025-12-01..2025-12-31");
            assert!(DateRange::parse("2025-12-31", "2025-12-01").is_err());
            assert!(DateRange::parse("2025/12/01", "2025-12-31").is_err());
        }

        #[test]
        fn test_detail_checklist_tracks_five_sentinels() {
            let checklist = OrderExpectation::default().detail_checklist();
            assert_eq!(checklist.entries().len(), 5);
            assert!(checklist.is_loaded(LOADED_DETAIL));
            let loading = "订货单号：342512080002 单据状态：- 来源：- 订货日期：- 订货门店：-";
            assert_eq!(critical_sentinels(&checklist, loading), vec!["单据状态"]);
        }

        #[test]
        fn test_descriptor_sizes() {
            let date = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
            assert_eq!(day_cell(date).len(), 6);
            assert_eq!(
                day_cell(date).strategies()[4].name,
                "[aria-label*=\"2025年12月1日\"]"
            );
            assert_eq!(date_picker_panel().len(), 9);
            assert_eq!(query_button().len(), 9);
            assert_eq!(order_table().len(), 6);
            assert_eq!(line_item_rows("T1").len(), 7);
        }

        #[test]
        fn test_data_row_filter() {
            assert!(is_data_row("T1 测试 1", "T1"));
            assert!(!is_data_row("商品编号 商品名称", "T1"));
            assert!(!is_data_row("T2 测试", "T1"));
        }
    }

    mod listing_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_navigation_error_tolerated_on_listing() {
            let mut page = MockPage::new()
                .with_screen(MockScreen::new("https://saas-boh-qa.hexcloud.cn/home"))
                .with_navigation_error(LISTING);
            navigate_to_daily_demand(&mut page, &config()).await.unwrap();
            assert_eq!(page.current_url().await.unwrap(), LISTING);
        }

        #[tokio::test(start_paused = true)]
        async fn test_boh_override_is_used() {
            let mut page = MockPage::new().with_screen(MockScreen::new("about:blank"));
            let config = config().with_boh_base_url("https://boh.internal");
            navigate_to_daily_demand(&mut page, &config).await.unwrap();
            assert!(page.was_called("navigate:https://boh.internal/store-supply/demand-daily"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_row_isolated_by_exact_text() {
            let page = MockPage::new().with_screen(listing_screen());
            find_order_in_list(&page, &config(), &OrderExpectation::default())
                .await
                .unwrap();
            assert!(page.was_called("query_all:text=\"342512080002\""));
        }

        #[tokio::test(start_paused = true)]
        async fn test_degrades_to_document_text() {
            let page = MockPage::new().with_screen(MockScreen::new(LISTING).body_frames([
                "342512080002 已审核 WEN测试直营门店01 总部分配 2025-12-08",
            ]));
            find_order_in_list(&page, &config(), &OrderExpectation::default())
                .await
                .unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_wrong_status_fails() {
            let page = MockPage::new().with_screen(listing_screen());
            let expectation = OrderExpectation {
                status: "已作废".to_string(),
                ..OrderExpectation::default()
            };
            let err = find_order_in_list(&page, &config(), &expectation)
                .await
                .unwrap_err();
            match err {
                ComprobarError::VerificationFailed { field, .. } => assert_eq!(field, "status"),
                other => panic!("expected VerificationFailed, got {other:?}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_order_fails() {
            let page = MockPage::new().with_screen(listing_screen());
            let expectation = OrderExpectation::default();
            let other = OrderExpectation {
                order_number: "999999999999".to_string(),
                ..expectation
            };
            assert!(find_order_in_list(&page, &config(), &other).await.is_err());
        }
    }

    mod date_picker_tests {
        use super::*;

        fn picker_screen(cells: Vec<MockElement>) -> MockScreen {
            let screen = MockScreen::new(LISTING)
                .element(
                    MockElement::new("start", "input")
                        .matches(Selector::css("input[placeholder*=\"开始\"]"))
                        .reveals(["panel"]),
                )
                .element(
                    MockElement::new("end", "input")
                        .matches(Selector::css("input[placeholder*=\"结束\"]"))
                        .reveals(["panel"]),
                )
                .element(
                    MockElement::new("panel", "div")
                        .matches(Selector::css("[class*=\"calendar\"]"))
                        .hidden(),
                )
                .element(
                    MockElement::new("query", "button")
                        .text("查询")
                        .reveals(["row", "link", "c-no"]),
                );
            cells.into_iter().fold(screen, MockScreen::element)
        }

        fn hides_panel(e: MockElement) -> MockElement {
            e.parent("panel")
                .on_click(ClickEffect::Hide(vec!["panel".to_string()]))
        }

        #[tokio::test(start_paused = true)]
        async fn test_cells_clicked_by_title() {
            let mut page = MockPage::new().with_screen(picker_screen(vec![
                hides_panel(
                    MockElement::new("d1", "td")
                        .text("1")
                        .matches(Selector::css("[title*=\"2025-12-01\"]")),
                ),
                hides_panel(
                    MockElement::new("d31", "td")
                        .text("31")
                        .matches(Selector::css("[title*=\"2025-12-31\"]")),
                ),
            ]));
            select_date_range_and_query(&mut page, &config(), &DateRange::default())
                .await
                .unwrap();
            assert!(page.was_called("click:d1"));
            assert!(page.was_called("click:d31"));
            assert!(page.was_called("click:query"));
            assert!(!page.was_called("fill:start"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_cell_scan_skips_disabled() {
            let mut page = MockPage::new().with_screen(picker_screen(vec![
                hides_panel(MockElement::new("d1-prev", "td").text("1").attr("class", "cell-disabled")),
                hides_panel(MockElement::new("d1", "td").text("1")),
                hides_panel(MockElement::new("d31", "td").text("31")),
            ]));
            select_date_range_and_query(&mut page, &config(), &DateRange::default())
                .await
                .unwrap();
            assert!(!page.was_called("click:d1-prev"));
            assert!(page.was_called("click:d1"));
            assert!(page.was_called("click:d31"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_falls_back_to_typing() {
            let mut page = MockPage::new().with_screen(picker_screen(Vec::new()));
            select_date_range_and_query(&mut page, &config(), &DateRange::default())
                .await
                .unwrap();
            assert_eq!(page.value_of("start").as_deref(), Some("2025-12-01"));
            assert_eq!(page.value_of("end").as_deref(), Some("2025-12-31"));
            assert_eq!(page.call_count("click:start"), DATE_PICK_ATTEMPTS as usize);
        }

        #[tokio::test(start_paused = true)]
        async fn test_enter_when_no_query_button() {
            let mut page = MockPage::new().with_screen(
                MockScreen::new(LISTING)
                    .element(
                        MockElement::new("start", "input")
                            .matches(Selector::css("input[placeholder*=\"开始\"]")),
                    )
                    .element(
                        MockElement::new("end", "input")
                            .matches(Selector::css("input[placeholder*=\"结束\"]")),
                    ),
            );
            select_date_range_and_query(&mut page, &config(), &DateRange::default())
                .await
                .unwrap();
            assert!(page.was_called("press_key:Enter"));
        }
    }

    mod detail_tests {
        use super::*;

        fn detail_page(frames: &[&str], reload_frames: &[&str]) -> MockPage {
            MockPage::new().with_screen(
                MockScreen::new(DETAIL)
                    .body_frames(frames.iter().copied())
                    .reload_frames(reload_frames.iter().copied()),
            )
        }

        #[tokio::test(start_paused = true)]
        async fn test_loaded_after_sentinels_clear() {
            let loading = "订货单号：342512080002 单据状态：- 来源：- 订货日期：- 订货门店：-";
            let mut page = detail_page(&[loading, loading, LOADED_DETAIL], &[]);
            verify_order_detail(&mut page, &config(), &OrderExpectation::default())
                .await
                .unwrap();
            assert!(!page.was_called("reload"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_reload_recovers_stuck_header() {
            let stuck = "订货单号：342512080002 单据状态：- 来源：总部分配";
            let mut page = detail_page(&[stuck], &[LOADED_DETAIL]);
            verify_order_detail(&mut page, &config(), &OrderExpectation::default())
                .await
                .unwrap();
            assert_eq!(page.call_count("reload"), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_perpetual_sentinel_times_out() {
            let stuck = "订货单号：342512080002 单据状态：- 来源：总部分配";
            let mut page = detail_page(&[stuck], &[stuck]);
            let err = verify_order_detail(&mut page, &config(), &OrderExpectation::default())
                .await
                .unwrap_err();
            match err {
                ComprobarError::TimedOut { waited_for, .. } => {
                    assert!(waited_for.contains("单据状态"));
                }
                other => panic!("expected TimedOut, got {other:?}"),
            }
            assert_eq!(page.call_count("reload"), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_zero_padded_store_code_passes() {
            assert!(LOADED_DETAIL.contains("订货门店编号：100000010"));
            let mut page = detail_page(&[LOADED_DETAIL], &[]);
            verify_order_detail(&mut page, &config(), &OrderExpectation::default())
                .await
                .unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_unpadded_store_code_passes() {
            let exact = LOADED_DETAIL.replace("100000010", "10010");
            let mut page = detail_page(&[exact.as_str()], &[]);
            verify_order_detail(&mut page, &config(), &OrderExpectation::default())
                .await
                .unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_store_code_mismatch_fails() {
            let wrong = LOADED_DETAIL.replace("100000010", "200000020");
            let mut page = detail_page(&[wrong.as_str()], &[]);
            let err = verify_order_detail(&mut page, &config(), &OrderExpectation::default())
                .await
                .unwrap_err();
            match err {
                ComprobarError::VerificationFailed { field, .. } => assert_eq!(field, "store code"),
                other => panic!("expected VerificationFailed, got {other:?}"),
            }
        }
    }

    mod line_item_tests {
        use super::*;

        fn product_screen() -> MockScreen {
            MockScreen::new(DETAIL)
                .element(MockElement::new("ptbl", "table"))
                .element(MockElement::new("phead", "tr").parent("ptbl"))
                .element(MockElement::new("h1", "th").parent("phead").text("商品编号"))
                .element(MockElement::new("h2", "th").parent("phead").text("商品名称"))
                .element(MockElement::new("prow", "tr").parent("ptbl"))
                .element(MockElement::new("p1", "td").parent("prow").text("T20251128012"))
                .element(MockElement::new("p2", "td").parent("prow").text("测试20251128012"))
        }

        #[tokio::test(start_paused = true)]
        async fn test_rows_isolated_in_product_table() {
            let page = MockPage::new().with_screen(product_screen());
            verify_line_items(&page, &config(), &LineItemExpectation::default())
                .await
                .unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_count_is_a_minimum() {
            let page = MockPage::new().with_screen(product_screen());
            let expectation = LineItemExpectation {
                expected_count: 2,
                ..LineItemExpectation::default()
            };
            let err = verify_line_items(&page, &config(), &expectation)
                .await
                .unwrap_err();
            assert!(err.is_verification());
        }

        #[tokio::test(start_paused = true)]
        async fn test_document_corroboration_without_rows() {
            let page = MockPage::new().with_screen(
                MockScreen::new(DETAIL).body_frames(["商品编号 商品名称 T20251128012 测试20251128012"]),
            );
            verify_line_items(&page, &config(), &LineItemExpectation::default())
                .await
                .unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_wrong_name_fails() {
            let page = MockPage::new().with_screen(product_screen());
            let expectation = LineItemExpectation {
                product_name: "别的商品".to_string(),
                ..LineItemExpectation::default()
            };
            let err = verify_line_items(&page, &config(), &expectation)
                .await
                .unwrap_err();
            match err {
                ComprobarError::VerificationFailed { field, .. } => assert_eq!(field, "product name"),
                other => panic!("expected VerificationFailed, got {other:?}"),
            }
        }
    }
}
