//! Login and tenant identity.

use crate::action::{
    fill_verified, mask_value, perform, Action, ActionOptions, NavigationExpectation,
};
use crate::config::{Credentials, RunnerConfig, LOGIN_PATH};
use crate::driver::{settle_load_state, PageDriver};
use crate::locator::{Selector, SelectorResolver, TargetDescriptor};
use crate::result::{ComprobarError, ComprobarResult};
use crate::verify::{excerpt_tail, verify_field, EvidenceBundle};
use crate::wait::{ConvergencePoller, LoadState, UrlProbe};
use tracing::{debug, info, warn};

/// Texts that indicate a rejected login
pub const ERROR_KEYWORDS: &[&str] = &[
    "错误", "失败", "error", "Error", "用户名或密码", "账号", "验证码", "captcha",
];

const ERROR_SELECTORS: &[&str] = &[
    "[class*=\"error\"]",
    "[class*=\"alert\"]",
    "[class*=\"message\"]",
    ".ant-message",
    ".ant-notification",
    "[role=\"alert\"]",
];

const HEADER_SCOPES: &[&str] = &["header", "nav", "[class*=\"header\"]", "[class*=\"navbar\"]"];

const FAILURE_EXCERPT_CHARS: usize = 500;

/// Account input
#[must_use]
pub fn account_field() -> TargetDescriptor {
    TargetDescriptor::new("account input").css_all([
        "input[name=\"account\"]",
        "input[name=\"username\"]",
        "input[id=\"account\"]",
        "input[id=\"username\"]",
        "input[placeholder*=\"账号\"]",
        "input[placeholder*=\"用户名\"]",
        "input[type=\"text\"]",
    ])
}

/// Password input
#[must_use]
pub fn password_field() -> TargetDescriptor {
    TargetDescriptor::new("password input").css_all([
        "input[name=\"password\"]",
        "input[id=\"password\"]",
        "input[type=\"password\"]",
    ])
}

/// Brand alias input, absent on some tenants
#[must_use]
pub fn brand_alias_field() -> TargetDescriptor {
    TargetDescriptor::new("brand alias input").css_all([
        "input[name*=\"brand\"]",
        "input[name*=\"alias\"]",
        "input[id*=\"brand\"]",
        "input[id*=\"alias\"]",
        "input[placeholder*=\"品牌\"]",
        "input[placeholder*=\"别名\"]",
    ])
}

/// Terms-of-service checkbox
#[must_use]
pub fn agreement_checkbox() -> TargetDescriptor {
    TargetDescriptor::new("agreement checkbox").css_all([
        "input[type=\"checkbox\"]",
        "[class*=\"agreement\"] input",
        "[class*=\"protocol\"] input",
        "input[name*=\"agreement\"]",
        "input[name*=\"protocol\"]",
    ])
}

/// Submit button
#[must_use]
pub fn login_button() -> TargetDescriptor {
    TargetDescriptor::new("login button")
        .css_with_text("button", "登录")
        .css_with_text("button", "登陆")
        .css_all([
            "button[type=\"submit\"]",
            "input[type=\"submit\"]",
            "button.login",
            ".login-button",
            "[class*=\"login\"] button",
        ])
        .css_with_text("button", "Login")
        .css_with_text("button", "Sign in")
        .css_all(["[class*=\"login-btn\"]", "[class*=\"submit\"]"])
}

/// Tenant label, by text then inside header regions
#[must_use]
pub fn tenant_label(tenant: &str) -> TargetDescriptor {
    HEADER_SCOPES.iter().fold(
        TargetDescriptor::new("tenant label").text(tenant),
        |descriptor, scope| descriptor.css_with_text(*scope, tenant),
    )
}

/// Log in and wait until the browser leaves the login page
pub async fn authenticate(
    page: &mut dyn PageDriver,
    config: &RunnerConfig,
    credentials: &Credentials,
) -> ComprobarResult<()> {
    let timeouts = &config.timeouts;
    let login_url = &config.profile.login_url;
    info!(url = %login_url, account = %credentials.account, "opening login page");
    page.navigate(login_url).await?;
    settle_load_state(&*page, LoadState::DomContentLoaded, timeouts.page_load).await;

    let page: &dyn PageDriver = page;
    let resolver = config.resolver();
    let options = config.action_options();

    let account = resolver
        .resolve(page, &account_field(), None)
        .await
        .into_result()?;
    let account_read = fill_verified(page, &account, &credentials.account, &options).await?;

    let password = resolver
        .resolve(page, &password_field(), None)
        .await
        .into_result()?;
    let password_read = fill_verified(page, &password, &credentials.password, &options).await?;

    let brand_read = match resolver.resolve(page, &brand_alias_field(), None).await.into_element() {
        Some(brand) => fill_verified(page, &brand, &credentials.brand_alias, &options).await?,
        None => {
            warn!("brand alias field not found, continuing without it");
            String::new()
        }
    };

    accept_agreement(page, &resolver, &options).await;

    info!(
        account = %mask_value(&account_read, 3),
        password = %mask_value(&password_read, 0),
        brand_alias = %mask_value(&brand_read, 3),
        "login form filled"
    );

    let button = resolver
        .resolve(page, &login_button(), None)
        .await
        .into_result()?;
    let submit = options
        .clone()
        .expecting(
            NavigationExpectation::new(timeouts.navigation_confirm)
                .load_state(LoadState::NetworkIdle),
        )
        .with_fallback_key("Enter");
    perform(page, &Action::Click, &button, &submit)
        .await
        .into_result("submit login")?;

    settle_load_state(page, LoadState::NetworkIdle, timeouts.network_idle).await;
    log_error_messages(page).await;

    let outcome =
        ConvergencePoller::poll_until(page, &timeouts.login_redirect, &UrlProbe::leaving(LOGIN_PATH))
            .await;
    if outcome.is_converged() {
        let url = page.current_url().await.unwrap_or_default();
        info!(%url, attempts = outcome.attempts(), "logged in");
        return Ok(());
    }

    let text = page.body_text().await.unwrap_or_default();
    let keywords = error_keywords_in(&text);
    warn!(?keywords, "still on the login page");
    Err(ComprobarError::TimedOut {
        waited_for: "redirect away from the login page".to_string(),
        elapsed_ms: u64::try_from(outcome.elapsed().as_millis()).unwrap_or(u64::MAX),
        last_observed: format!(
            "keywords {keywords:?}; page: {}",
            excerpt_tail(&text, FAILURE_EXCERPT_CHARS)
        ),
    })
}

/// Check the tenant label is rendered after login
///
/// The element must be found by some strategy or the document text must
/// carry the label; in both cases the document text is checked again.
pub async fn verify_tenant(
    page: &dyn PageDriver,
    config: &RunnerConfig,
    expected: &str,
) -> ComprobarResult<()> {
    let resolution = config
        .resolver()
        .resolve(page, &tenant_label(expected), None)
        .await;
    if let Some(name) = resolution_strategy(&resolution) {
        info!(tenant = expected, strategy = %name, "tenant label located");
    }

    let bundle = EvidenceBundle::collect(page, resolution.element()).await;
    verify_field("tenant", expected, &bundle, None).into_result("tenant", expected)?;

    match bundle.document_text.as_deref() {
        Some(text) if !text.contains(expected) => Err(ComprobarError::VerificationFailed {
            field: "tenant".to_string(),
            expected: expected.to_string(),
            observed: excerpt_tail(text, FAILURE_EXCERPT_CHARS),
            sources: "document".to_string(),
        }),
        _ => Ok(()),
    }
}

fn resolution_strategy(resolution: &crate::locator::Resolution) -> Option<&str> {
    match resolution {
        crate::locator::Resolution::Found { strategy_name, .. } => Some(strategy_name),
        crate::locator::Resolution::NotFound { .. } => None,
    }
}

/// Keywords from [`ERROR_KEYWORDS`] present in `text`
#[must_use]
pub fn error_keywords_in(text: &str) -> Vec<&'static str> {
    ERROR_KEYWORDS
        .iter()
        .copied()
        .filter(|k| text.contains(k))
        .collect()
}

async fn accept_agreement(page: &dyn PageDriver, resolver: &SelectorResolver, options: &ActionOptions) {
    let Some(checkbox) = resolver
        .resolve(page, &agreement_checkbox(), None)
        .await
        .into_element()
    else {
        debug!("no agreement checkbox");
        return;
    };
    match page.is_checked(&checkbox).await {
        Ok(true) => debug!("agreement already accepted"),
        Ok(false) => {
            let outcome = perform(page, &Action::Check, &checkbox, options).await;
            if !outcome.succeeded() {
                warn!(?outcome, "could not tick agreement checkbox");
            }
        }
        Err(e) => warn!(error = %e, "agreement checkbox state unreadable"),
    }
}

async fn log_error_messages(page: &dyn PageDriver) {
    for css in ERROR_SELECTORS {
        let Ok(found) = page.query_all(&Selector::css(*css), None).await else {
            continue;
        };
        for element in found {
            if !page.is_visible(&element).await.unwrap_or(false) {
                continue;
            }
            if let Ok(text) = page.text_content(&element).await {
                let text = text.trim();
                if !text.is_empty() {
                    warn!(selector = css, message = text, "page shows a message after login");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Timeouts;
    use crate::mock::{ClickEffect, MockElement, MockPage, MockScreen};

    const LOGIN: &str = "https://saas-auth-qa.hexcloud.cn/page/login";
    const HOME: &str = "https://saas-boh-qa.hexcloud.cn/home";

    fn config() -> RunnerConfig {
        RunnerConfig::default().with_timeouts(Timeouts::fast())
    }

    fn login_screen(button: MockElement) -> MockScreen {
        MockScreen::new(LOGIN)
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
            .element(button.parent("form"))
    }

    fn home_screen() -> MockScreen {
        MockScreen::new(HOME)
            .element(MockElement::new("hdr", "header"))
            .element(MockElement::new("tenant", "span").parent("hdr").text("合阔x"))
            .element(MockElement::new("menu", "div").text("订货管理"))
    }

    mod descriptor_tests {
        use super::*;

        #[test]
        fn test_strategy_counts() {
            assert_eq!(account_field().len(), 7);
            assert_eq!(password_field().len(), 3);
            assert_eq!(brand_alias_field().len(), 6);
            assert_eq!(agreement_checkbox().len(), 5);
            assert_eq!(login_button().len(), 11);
            assert_eq!(tenant_label("x").len(), 5);
        }

        #[test]
        fn test_login_button_prefers_text() {
            let button = login_button();
            assert_eq!(button.strategies()[0].name, "button:has-text(\"登录\")");
        }

        #[test]
        fn test_error_keywords() {
            assert_eq!(error_keywords_in("用户名或密码错误"), vec!["错误", "用户名或密码"]);
            assert!(error_keywords_in("welcome").is_empty());
        }
    }

    mod authenticate_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_login_fills_form_and_leaves_login_page() {
            let button = MockElement::new("btn", "button").text("登录").navigates_to(HOME);
            let mut page = MockPage::new()
                .with_screen(login_screen(button))
                .with_screen(home_screen());
            let config = config();

            authenticate(&mut page, &config, &Credentials::default())
                .await
                .unwrap();

            assert_eq!(page.value_of("acct").as_deref(), Some("admin"));
            assert_eq!(page.value_of("pwd").as_deref(), Some("admin@123"));
            assert_eq!(page.value_of("brand").as_deref(), Some("hex"));
            assert_eq!(page.is_element_checked("agree"), Some(true));
            assert_eq!(page.current_url().await.unwrap(), HOME);
        }

        #[tokio::test(start_paused = true)]
        async fn test_enter_fallback_when_button_unclickable() {
            let button = MockElement::new("btn", "button").text("登录").fail_clicks(10);
            let mut page = MockPage::new()
                .with_screen(
                    login_screen(button).on_key("Enter", ClickEffect::Navigate(HOME.to_string())),
                )
                .with_screen(home_screen());

            authenticate(&mut page, &config(), &Credentials::default())
                .await
                .unwrap();

            assert!(page.was_called("press_key:Enter"));
            assert_eq!(page.current_url().await.unwrap(), HOME);
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_brand_field_is_not_fatal() {
            let screen = MockScreen::new(LOGIN)
                .element(
                    MockElement::new("acct", "input").matches(Selector::css("input[name=\"account\"]")),
                )
                .element(
                    MockElement::new("pwd", "input").matches(Selector::css("input[name=\"password\"]")),
                )
                .element(MockElement::new("btn", "button").text("登录").navigates_to(HOME));
            let mut page = MockPage::new().with_screen(screen).with_screen(home_screen());

            authenticate(&mut page, &config(), &Credentials::default())
                .await
                .unwrap();
            assert_eq!(page.value_of("acct").as_deref(), Some("admin"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_rejected_login_times_out_with_keywords() {
            let button = MockElement::new("btn", "button").text("登录");
            let mut page = MockPage::new().with_screen(
                login_screen(button).body_frames(["账号 密码 登录 用户名或密码错误"]),
            );

            let err = authenticate(&mut page, &config(), &Credentials::default())
                .await
                .unwrap_err();
            match err {
                ComprobarError::TimedOut {
                    waited_for,
                    last_observed,
                    ..
                } => {
                    assert!(waited_for.contains("login page"));
                    assert!(last_observed.contains("用户名或密码"));
                }
                other => panic!("expected TimedOut, got {other:?}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_account_field_fails() {
            let mut page = MockPage::new().with_screen(MockScreen::new(LOGIN));
            let err = authenticate(&mut page, &config(), &Credentials::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ComprobarError::NotFound { tried: 7, .. }));
        }
    }

    mod tenant_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_tenant_found_by_text() {
            let page = MockPage::new().with_screen(home_screen());
            verify_tenant(&page, &config(), "合阔x").await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_tenant_missing_fails() {
            let page = MockPage::new().with_screen(home_screen());
            let err = verify_tenant(&page, &config(), "其他租户").await.unwrap_err();
            assert!(err.is_verification());
        }
    }
}
