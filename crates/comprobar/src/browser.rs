//! Chromium control over CDP.
//!
//! With the `browser` feature, [`ChromiumSession`] launches Chromium through
//! chromiumoxide and hands out [`ChromiumPage`]s implementing
//! [`crate::PageDriver`]. Element handles are ids the page stamps onto the
//! DOM as a `data-comprobar-id` attribute; a handle whose node was replaced
//! reads as detached.

use crate::locator::{js_str, Selector};

/// DOM attribute carrying the element handle id
pub const HANDLE_ATTRIBUTE: &str = "data-comprobar-id";

/// Quiet period after which the network counts as idle
pub const NETWORK_IDLE_QUIET_MS: u64 = 500;

/// Interval between readiness checks
pub const READINESS_POLL_MS: u64 = 100;

/// Browser launch options
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Run without a window
    pub headless: bool,
    /// Disable the sandbox (containers, CI)
    pub no_sandbox: bool,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Window size
    pub window: (u32, u32),
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            no_sandbox: false,
            chromium_path: None,
            window: (1920, 1080),
        }
    }
}

impl BrowserOptions {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Disable the sandbox
    #[must_use]
    pub const fn with_no_sandbox(mut self, no_sandbox: bool) -> Self {
        self.no_sandbox = no_sandbox;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }
}

// ============================================================================
// Scripts
// ============================================================================

/// Describe an element as `{id, tag}`, stamping an id on first sight
const DESCRIBE_FN: &str = "const describe = el => { \
    if (!el.getAttribute('data-comprobar-id')) { \
        window.__comprobarSeq = (window.__comprobarSeq || 0) + 1; \
        el.setAttribute('data-comprobar-id', 'c' + Date.now().toString(36) + '-' + window.__comprobarSeq); \
    } \
    return { id: el.getAttribute('data-comprobar-id'), tag: el.tagName.toLowerCase() }; };";

fn handle_lookup(id: &str) -> String {
    format!(
        "document.querySelector({})",
        js_str(&format!("[{HANDLE_ATTRIBUTE}=\"{id}\"]"))
    )
}

/// Script returning the handles matching `selector` under `scope`
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn query_script(selector: &Selector, scope: Option<&str>) -> String {
    let root = scope.map_or_else(|| "document".to_string(), handle_lookup);
    format!(
        "(() => {{ {DESCRIBE_FN} const root = {root}; if (!root) return []; \
         return {}.map(describe); }})()",
        selector.to_query_all()
    )
}

/// Script evaluating `body` with `el` bound to the element, throwing when detached
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn element_script(id: &str, body: &str) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) throw new Error({}); return ({body}); }})()",
        handle_lookup(id),
        js_str(&format!("element {id} is detached"))
    )
}

/// Script returning the nearest ancestor-or-self of `id` matching `ancestor`
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn closest_script(id: &str, ancestor: &Selector) -> String {
    element_script(
        id,
        &format!(
            "(() => {{ {DESCRIBE_FN} const root = document; const hits = new Set({}); \
             for (let cur = el; cur; cur = cur.parentElement) {{ if (hits.has(cur)) return describe(cur); }} \
             return null; }})()",
            ancestor.to_query_all()
        ),
    )
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
const VISIBLE_BODY: &str = "(() => { const s = getComputedStyle(el); \
    return s.visibility !== 'hidden' && s.display !== 'none' \
    && !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length); })()";

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn fill_body(value: &str) -> String {
    format!(
        "(() => {{ el.focus(); const proto = Object.getPrototypeOf(el); \
         const desc = Object.getOwnPropertyDescriptor(proto, 'value'); \
         if (desc && desc.set) {{ desc.set.call(el, {v}); }} else {{ el.value = {v}; }} \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()",
        v = js_str(value)
    )
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn select_body(value: &str) -> String {
    format!(
        "(() => {{ const want = {}; const opt = Array.from(el.options || []) \
         .find(o => o.value === want || (o.textContent || '').trim() === want); \
         if (!opt) throw new Error('no option ' + want); el.value = opt.value; \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()",
        js_str(value)
    )
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
const READINESS_SCRIPT: &str = "(() => ({ ready: document.readyState, \
    resources: performance.getEntriesByType('resource').length }))()";

/// Virtual key code and inserted text for the keys the flows press
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn key_definition(key: &str) -> (i64, Option<&'static str>) {
    match key {
        "Enter" => (13, Some("\r")),
        "Tab" => (9, None),
        "Escape" => (27, None),
        "Backspace" => (8, None),
        "ArrowDown" => (40, None),
        "ArrowUp" => (38, None),
        _ => (0, None),
    }
}

// ============================================================================
// CDP implementation (feature `browser`)
// ============================================================================

#[cfg(feature = "browser")]
mod cdp {
    use super::{
        closest_script, element_script, fill_body, key_definition, query_script, select_body,
        BrowserOptions, NETWORK_IDLE_QUIET_MS, READINESS_POLL_MS, READINESS_SCRIPT, VISIBLE_BODY,
    };
    use crate::driver::{ElementHandle, PageDriver};
    use crate::locator::Selector;
    use crate::network::UrlPattern;
    use crate::result::{ComprobarError, ComprobarResult};
    use crate::wait::LoadState;
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
    use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde::Deserialize;
    use std::time::Duration;
    use tokio::time::Instant;
    use tracing::{debug, info, warn};

    fn page_error(e: impl std::fmt::Display) -> ComprobarError {
        ComprobarError::page(e.to_string())
    }

    #[derive(Debug, Deserialize)]
    struct Described {
        id: String,
        tag: String,
    }

    impl From<Described> for ElementHandle {
        fn from(d: Described) -> Self {
            Self::new(d.id, d.tag)
        }
    }

    #[derive(Debug, Deserialize)]
    struct Readiness {
        ready: String,
        resources: u64,
    }

    /// Running Chromium with its CDP event loop
    #[derive(Debug)]
    pub struct ChromiumSession {
        browser: CdpBrowser,
        handler: tokio::task::JoinHandle<()>,
    }

    impl ChromiumSession {
        /// Launch Chromium
        pub async fn launch(options: BrowserOptions) -> ComprobarResult<Self> {
            let mut builder = CdpConfig::builder().window_size(options.window.0, options.window.1);
            if !options.headless {
                builder = builder.with_head();
            }
            if options.no_sandbox {
                builder = builder.no_sandbox();
            }
            if let Some(ref path) = options.chromium_path {
                builder = builder.chrome_executable(path);
            }
            let config = builder
                .build()
                .map_err(|message| ComprobarError::BrowserLaunchError { message })?;

            let (browser, mut handler) =
                CdpBrowser::launch(config)
                    .await
                    .map_err(|e| ComprobarError::BrowserLaunchError {
                        message: e.to_string(),
                    })?;
            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });
            info!(headless = options.headless, "chromium launched");
            Ok(Self { browser, handler })
        }

        /// Open a blank page
        pub async fn new_page(&self) -> ComprobarResult<ChromiumPage> {
            let page = self.browser.new_page("about:blank").await.map_err(page_error)?;
            Ok(ChromiumPage { page })
        }

        /// Close the browser and stop the event loop
        pub async fn close(mut self) -> ComprobarResult<()> {
            let closed = self.browser.close().await;
            self.handler.abort();
            closed.map(|_| ()).map_err(page_error)
        }
    }

    /// A Chromium tab
    #[derive(Debug)]
    pub struct ChromiumPage {
        page: CdpPage,
    }

    impl ChromiumPage {
        async fn eval<T: for<'de> Deserialize<'de>>(&self, script: &str) -> ComprobarResult<T> {
            let value = self.evaluate(script).await?;
            serde_json::from_value(value).map_err(ComprobarError::from)
        }

        async fn on_element<T: for<'de> Deserialize<'de>>(
            &self,
            element: &ElementHandle,
            body: &str,
        ) -> ComprobarResult<T> {
            self.eval(&element_script(&element.id, body)).await
        }

        async fn dispatch_key(&self, kind: DispatchKeyEventType, key: &str) -> ComprobarResult<()> {
            let (code, text) = key_definition(key);
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind.clone())
                .key(key)
                .code(key)
                .windows_virtual_key_code(code);
            if let (DispatchKeyEventType::KeyDown, Some(text)) = (kind, text) {
                builder = builder.text(text);
            }
            let params = builder.build().map_err(ComprobarError::page)?;
            self.page.execute(params).await.map_err(page_error)?;
            Ok(())
        }
    }

    #[async_trait]
    impl PageDriver for ChromiumPage {
        async fn navigate(&mut self, url: &str) -> ComprobarResult<()> {
            debug!(url, "navigate");
            self.page
                .goto(url)
                .await
                .map_err(|e| ComprobarError::NavigationError {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            Ok(())
        }

        async fn reload(&mut self) -> ComprobarResult<()> {
            self.page.reload().await.map_err(page_error)?;
            Ok(())
        }

        async fn current_url(&self) -> ComprobarResult<String> {
            Ok(self.page.url().await.map_err(page_error)?.unwrap_or_default())
        }

        async fn title(&self) -> ComprobarResult<String> {
            Ok(self
                .page
                .get_title()
                .await
                .map_err(page_error)?
                .unwrap_or_default())
        }

        async fn body_text(&self) -> ComprobarResult<String> {
            self.eval("(() => document.body ? document.body.innerText : '')()")
                .await
        }

        async fn query_all(
            &self,
            selector: &Selector,
            scope: Option<&ElementHandle>,
        ) -> ComprobarResult<Vec<ElementHandle>> {
            let script = query_script(selector, scope.map(|s| s.id.as_str()));
            let found: Vec<Described> = self.eval(&script).await.map_err(|e| match e {
                ComprobarError::PageError { message } => ComprobarError::script(format!(
                    "'{selector}' could not be queried: {message}"
                )),
                other => other,
            })?;
            Ok(found.into_iter().map(ElementHandle::from).collect())
        }

        async fn is_visible(&self, element: &ElementHandle) -> ComprobarResult<bool> {
            self.on_element(element, VISIBLE_BODY).await
        }

        async fn text_content(&self, element: &ElementHandle) -> ComprobarResult<String> {
            self.on_element(element, "el.innerText || el.textContent || ''")
                .await
        }

        async fn input_value(&self, element: &ElementHandle) -> ComprobarResult<String> {
            self.on_element(element, "el.value || ''").await
        }

        async fn attribute(
            &self,
            element: &ElementHandle,
            name: &str,
        ) -> ComprobarResult<Option<String>> {
            self.on_element(
                element,
                &format!("el.getAttribute({})", crate::locator::js_str(name)),
            )
            .await
        }

        async fn is_checked(&self, element: &ElementHandle) -> ComprobarResult<bool> {
            self.on_element(element, "!!el.checked").await
        }

        async fn closest(
            &self,
            element: &ElementHandle,
            ancestor: &Selector,
        ) -> ComprobarResult<Option<ElementHandle>> {
            let found: Option<Described> = self.eval(&closest_script(&element.id, ancestor)).await?;
            Ok(found.map(ElementHandle::from))
        }

        async fn scroll_into_view(&self, element: &ElementHandle) -> ComprobarResult<()> {
            let _: bool = self
                .on_element(
                    element,
                    "(() => { el.scrollIntoView({ block: 'center', inline: 'center' }); return true; })()",
                )
                .await?;
            Ok(())
        }

        async fn click(&self, element: &ElementHandle) -> ComprobarResult<()> {
            let node = self
                .page
                .find_element(format!("[{}=\"{}\"]", super::HANDLE_ATTRIBUTE, element.id))
                .await
                .map_err(|e| ComprobarError::page(format!("element {} is detached: {e}", element.id)))?;
            node.click().await.map_err(page_error)?;
            Ok(())
        }

        async fn fill(&self, element: &ElementHandle, value: &str) -> ComprobarResult<()> {
            let _: bool = self.on_element(element, &fill_body(value)).await?;
            Ok(())
        }

        async fn select_option(&self, element: &ElementHandle, value: &str) -> ComprobarResult<()> {
            let _: bool = self.on_element(element, &select_body(value)).await?;
            Ok(())
        }

        async fn check(&self, element: &ElementHandle) -> ComprobarResult<()> {
            if !self.is_checked(element).await? {
                self.click(element).await?;
            }
            Ok(())
        }

        async fn press_key(&self, key: &str) -> ComprobarResult<()> {
            self.dispatch_key(DispatchKeyEventType::KeyDown, key).await?;
            self.dispatch_key(DispatchKeyEventType::KeyUp, key).await
        }

        async fn wait_for_load_state(
            &self,
            state: LoadState,
            timeout: Duration,
        ) -> ComprobarResult<()> {
            let start = Instant::now();
            let quiet = Duration::from_millis(NETWORK_IDLE_QUIET_MS);
            let mut last_count = None;
            let mut stable_since = start;
            let mut last_ready = String::new();

            loop {
                match self.eval::<Readiness>(READINESS_SCRIPT).await {
                    Ok(now) => {
                        let reached = match state {
                            LoadState::DomContentLoaded => now.ready != "loading",
                            LoadState::Load => now.ready == "complete",
                            LoadState::NetworkIdle => {
                                if last_count != Some(now.resources) {
                                    last_count = Some(now.resources);
                                    stable_since = Instant::now();
                                }
                                now.ready == "complete" && stable_since.elapsed() >= quiet
                            }
                        };
                        if reached {
                            return Ok(());
                        }
                        last_ready = now.ready;
                    }
                    Err(e) => debug!(error = %e, "readiness check failed, document may be swapping"),
                }
                if start.elapsed() >= timeout {
                    return Err(ComprobarError::TimedOut {
                        waited_for: state.to_string(),
                        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                        last_observed: format!("readyState {last_ready}"),
                    });
                }
                tokio::time::sleep(Duration::from_millis(READINESS_POLL_MS)).await;
            }
        }

        async fn wait_for_url(&self, pattern: &UrlPattern, timeout: Duration) -> ComprobarResult<()> {
            let start = Instant::now();
            loop {
                let url = self.current_url().await.unwrap_or_default();
                if pattern.matches(&url) {
                    return Ok(());
                }
                if start.elapsed() >= timeout {
                    return Err(ComprobarError::TimedOut {
                        waited_for: format!("url {pattern}"),
                        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                        last_observed: url,
                    });
                }
                tokio::time::sleep(Duration::from_millis(READINESS_POLL_MS)).await;
            }
        }

        async fn evaluate(&self, script: &str) -> ComprobarResult<serde_json::Value> {
            let params = EvaluateParams::builder()
                .expression(script)
                .return_by_value(true)
                .await_promise(true)
                .build()
                .map_err(ComprobarError::script)?;
            match self.page.evaluate_expression(params).await {
                Ok(result) => Ok(result.value().cloned().unwrap_or(serde_json::Value::Null)),
                Err(e) => {
                    warn!(error = %e, "script evaluation failed");
                    Err(ComprobarError::page(e.to_string()))
                }
            }
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{ChromiumPage, ChromiumSession};
