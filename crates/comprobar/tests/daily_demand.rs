//! End-to-end daily-demand scenario against a scripted back office
//!
//! Each test builds the login page, the home page, the daily-demand listing
//! and the order detail as mock screens, then runs the full scenario.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use comprobar::config::{RunnerConfig, Timeouts};
use comprobar::flows::{daily_demand_scenario, DailyDemandExpectations};
use comprobar::mock::{ClickEffect, MockElement, MockPage, MockScreen};
use comprobar::reporter::{render_summary, CollectingReporter};
use comprobar::scenario::{ScenarioRunner, ScenarioState, StepOutcome};
use comprobar::{ComprobarError, PageDriver, Selector};

const LOGIN: &str = "https://saas-auth-qa.hexcloud.cn/page/login";
const HOME: &str = "https://saas-boh-qa.hexcloud.cn/home";
const LISTING: &str = "https://saas-boh-qa.hexcloud.cn/store-supply/demand-daily";
const DETAIL: &str = "https://saas-boh-qa.hexcloud.cn/store-supply/demand-daily/detail/342512080002";

const HEADER_BLANK: &str = "订货单号：- 单据状态：- 来源：- 订货日期：- 订货门店：-";
const HEADER_PARTIAL: &str = "订货单号：342512080002 单据状态：- 来源：- 订货日期：- 订货门店：-";
const HEADER_LOADED: &str = "订货单号：342512080002 单据状态：已审核 来源：总部分配 \
    订货日期：2025-12-08 订货门店：WEN测试直营门店01 订货门店编号：100000010 \
    商品编号 商品名称 T20251128012 测试20251128012";

fn config() -> RunnerConfig {
    RunnerConfig::default().with_timeouts(Timeouts::fast())
}

fn login_screen() -> MockScreen {
    MockScreen::new(LOGIN)
        .title("登录")
        .element(MockElement::new("form", "form"))
        .element(
            MockElement::new("acct", "input")
                .parent("form")
                .matches(Selector::css("input[placeholder*=\"账号\"]")),
        )
        .element(
            MockElement::new("pwd", "input")
                .parent("form")
                .matches(Selector::css("input[type=\"password\"]")),
        )
        .element(
            MockElement::new("brand", "input")
                .parent("form")
                .matches(Selector::css("input[placeholder*=\"品牌\"]")),
        )
        .element(
            MockElement::new("agree", "input")
                .parent("form")
                .matches(Selector::css("input[type=\"checkbox\"]")),
        )
        .element(
            MockElement::new("login", "button")
                .parent("form")
                .text("登录")
                .navigates_to(HOME),
        )
}

fn home_screen() -> MockScreen {
    MockScreen::new(HOME)
        .title("首页")
        .element(MockElement::new("hdr", "header"))
        .element(MockElement::new("tenant", "span").parent("hdr").text("合阔x"))
}

fn date_inputs(screen: MockScreen) -> MockScreen {
    screen
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
}

fn day(id: &str, text: &str, iso: &str) -> MockElement {
    MockElement::new(id, "td")
        .parent("panel")
        .text(text)
        .matches(Selector::css(format!("[title*=\"{iso}\"]")))
        .on_click(ClickEffect::Hide(vec!["panel".to_string()]))
}

/// Listing whose result rows appear only after the query button is pressed
fn listing_screen() -> MockScreen {
    let rows = ["row", "c-no", "link", "c-status", "c-store", "c-source", "c-date"];
    let cell = |id: &str, text: &str| {
        MockElement::new(id, "td")
            .parent("row")
            .text(text)
            .hidden()
    };
    date_inputs(MockScreen::new(LISTING).title("门店订货"))
        .element(
            MockElement::new("panel", "div")
                .matches(Selector::css("[class*=\"calendar\"]"))
                .hidden(),
        )
        .element(day("d1", "1", "2025-12-01"))
        .element(day("d31", "31", "2025-12-31"))
        .element(
            MockElement::new("query", "button")
                .text("查询")
                .reveals(rows),
        )
        .element(MockElement::new("tbl", "table"))
        .element(MockElement::new("head", "tr").parent("tbl").text("订货单号 状态"))
        .element(MockElement::new("row", "tr").parent("tbl").hidden())
        .element(cell("c-no", ""))
        .element(
            MockElement::new("link", "a")
                .parent("c-no")
                .text("342512080002")
                .hidden()
                .navigates_to(DETAIL),
        )
        .element(cell("c-status", "已审核"))
        .element(cell("c-store", "WEN测试直营门店01"))
        .element(cell("c-source", "总部分配"))
        .element(cell("c-date", "2025-12-08"))
}

fn detail_screen(frames: &[&str], reload_frames: &[&str]) -> MockScreen {
    MockScreen::new(DETAIL)
        .title("订货单详情")
        .body_frames(frames.iter().copied())
        .reload_frames(reload_frames.iter().copied())
        .element(MockElement::new("ptbl", "table"))
        .element(MockElement::new("phead", "tr").parent("ptbl"))
        .element(MockElement::new("h1", "th").parent("phead").text("商品编号"))
        .element(MockElement::new("h2", "th").parent("phead").text("商品名称"))
        .element(MockElement::new("prow", "tr").parent("ptbl"))
        .element(MockElement::new("p1", "td").parent("prow").text("T20251128012"))
        .element(MockElement::new("p2", "td").parent("prow").text("测试20251128012"))
}

fn back_office(listing: MockScreen, detail: MockScreen) -> MockPage {
    MockPage::new()
        .with_screen(MockScreen::new("about:blank"))
        .with_screen(login_screen())
        .with_screen(home_screen())
        .with_screen(listing)
        .with_screen(detail)
}

#[tokio::test(start_paused = true)]
async fn test_full_scenario_passes() {
    let mut page = back_office(
        listing_screen(),
        detail_screen(&[HEADER_BLANK, HEADER_PARTIAL, HEADER_LOADED], &[]),
    );
    let mut reporter = CollectingReporter::new();

    let report = ScenarioRunner::run(
        daily_demand_scenario(DailyDemandExpectations::default()),
        &mut page,
        &config(),
        &mut reporter,
    )
    .await;

    assert!(report.passed, "{}", render_summary(&report));
    assert_eq!(report.state, ScenarioState::Completed);
    assert_eq!(reporter.outcomes(), vec![StepOutcome::Passed; 8]);
    assert!(page.was_called("click:d1"));
    assert!(page.was_called("click:d31"));
    assert!(page.was_called("click:link"));
    assert!(!page.was_called("reload"));
    assert_eq!(page.current_url().await.unwrap(), DETAIL);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_status_aborts_after_one_reload() {
    let stuck = "订货单号：342512080002 单据状态：- 来源：总部分配 订货日期：2025-12-08";
    let mut page = back_office(listing_screen(), detail_screen(&[stuck], &[stuck]));
    let mut reporter = CollectingReporter::new();

    let report = ScenarioRunner::run(
        daily_demand_scenario(DailyDemandExpectations::default()),
        &mut page,
        &config(),
        &mut reporter,
    )
    .await;

    assert!(!report.passed);
    let failed = report.failed_step().expect("a failed step");
    assert_eq!(failed.label, "verify order detail");
    let diagnostics = failed.diagnostics.as_ref().expect("diagnostics");
    assert_eq!(diagnostics.url.as_deref(), Some(DETAIL));
    assert!(diagnostics.page_excerpt.contains("单据状态：-"));
    assert!(diagnostics.error.contains("Timed out"));
    assert_eq!(
        reporter.outcomes().last(),
        Some(&StepOutcome::Skipped),
        "line items must not run after an abort"
    );
    assert_eq!(page.call_count("reload"), 1);

    match report.into_result() {
        Err(ComprobarError::StepAborted { step, .. }) => assert_eq!(step, "verify order detail"),
        other => panic!("expected StepAborted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_listing_without_rows_or_picker_is_corroborated_by_document() {
    let listing = date_inputs(MockScreen::new(LISTING)).body_frames([
        "门店订货 342512080002 已审核 WEN测试直营门店01 总部分配 2025-12-08",
    ]);
    let mut page = back_office(listing, detail_screen(&[HEADER_LOADED], &[]));
    let mut reporter = CollectingReporter::new();

    let report = ScenarioRunner::run(
        daily_demand_scenario(DailyDemandExpectations::default()),
        &mut page,
        &config(),
        &mut reporter,
    )
    .await;

    // The order link is missing too, so the detail is checked where the page stands.
    assert_eq!(
        report.failed_step().map(|s| s.label.as_str()),
        Some("verify order detail"),
        "{}",
        render_summary(&report)
    );
    assert_eq!(page.value_of("start").as_deref(), Some("2025-12-01"));
    assert_eq!(page.value_of("end").as_deref(), Some("2025-12-31"));
    assert!(page.was_called("press_key:Enter"));
    assert_eq!(
        reporter.outcomes()[..5],
        [StepOutcome::Passed; 5],
        "list verification degrades to document text"
    );
}

#[tokio::test(start_paused = true)]
async fn test_wrong_tenant_stops_at_second_step() {
    let mut page = back_office(listing_screen(), detail_screen(&[HEADER_LOADED], &[]));
    let expectations = DailyDemandExpectations {
        tenant: "别的租户".to_string(),
        ..DailyDemandExpectations::default()
    };

    let report = ScenarioRunner::run(
        daily_demand_scenario(expectations),
        &mut page,
        &config(),
        &mut CollectingReporter::new(),
    )
    .await;

    assert_eq!(
        report.state,
        ScenarioState::Aborted {
            step: 1,
            reason: report.steps[1]
                .diagnostics
                .as_ref()
                .map(|d| d.error.clone())
                .unwrap_or_default(),
        }
    );
    assert!(report.steps[2..]
        .iter()
        .all(|s| s.outcome == StepOutcome::Skipped));
    assert!(!page.was_called(&format!("navigate:{LISTING}")));
}

#[tokio::test(start_paused = true)]
async fn test_report_serializes_to_disk() {
    let mut page = back_office(
        listing_screen(),
        detail_screen(&[HEADER_PARTIAL, HEADER_LOADED], &[]),
    );
    let report = ScenarioRunner::run(
        daily_demand_scenario(DailyDemandExpectations::default()),
        &mut page,
        &config(),
        &mut CollectingReporter::new(),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&report).unwrap()).unwrap();

    let value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(value["passed"], true);
    assert_eq!(value["state"]["state"], "completed");
    assert_eq!(value["steps"].as_array().unwrap().len(), 8);
    assert_eq!(value["steps"][7]["outcome"], "passed");
}
