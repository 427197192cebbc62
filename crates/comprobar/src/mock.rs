//! Scriptable in-memory page for testing without a browser.
//!
//! A [`MockPage`] holds a set of [`MockScreen`]s keyed by URL. Each screen is
//! a flat list of [`MockElement`]s forming a small tree through parent ids.
//! Elements match a selector when it was registered on them with
//! [`MockElement::matches`]; CSS selectors naming the element's tag match
//! implicitly, and text selectors are evaluated against rendered text.
//!
//! ```
//! use comprobar::mock::{MockElement, MockPage, MockScreen};
//! use comprobar::locator::Selector;
//!
//! let page = MockPage::new().with_screen(
//!     MockScreen::new("https://auth.example/page/login").element(
//!         MockElement::new("login", "button")
//!             .text("登录")
//!             .navigates_to("https://boh.example/home"),
//!     ),
//! );
//! assert!(page.history().is_empty());
//! let _ = Selector::css_with_text("button", "登录");
//! ```

use crate::driver::{ElementHandle, PageDriver};
use crate::locator::Selector;
use crate::network::UrlPattern;
use crate::result::{ComprobarError, ComprobarResult};
use crate::wait::LoadState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// How often `wait_for_url` re-checks the current URL
const URL_POLL_INTERVAL_MS: u64 = 50;

/// State change triggered by a click or a key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickEffect {
    /// Switch to the screen registered for the URL
    Navigate(String),
    /// Make elements visible
    Reveal(Vec<String>),
    /// Make elements invisible
    Hide(Vec<String>),
}

/// One element of a mock screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    id: String,
    tag: String,
    text: String,
    visible: bool,
    visible_after: u32,
    selectors: Vec<Selector>,
    parent: Option<String>,
    value: String,
    checked: bool,
    attributes: HashMap<String, String>,
    on_click: Vec<ClickEffect>,
    failing_clicks: u32,
}

impl MockElement {
    /// Visible element with no text
    #[must_use]
    pub fn new(id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            text: String::new(),
            visible: true,
            visible_after: 0,
            selectors: Vec::new(),
            parent: None,
            value: String::new(),
            checked: false,
            attributes: HashMap::new(),
            on_click: Vec::new(),
            failing_clicks: 0,
        }
    }

    /// Set the element's own text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Register a selector that matches this element
    #[must_use]
    pub fn matches(mut self, selector: Selector) -> Self {
        self.selectors.push(selector);
        self
    }

    /// Start invisible
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Report invisible for the first `checks` visibility checks
    #[must_use]
    pub fn visible_after(mut self, checks: u32) -> Self {
        self.visible_after = checks;
        self
    }

    /// Nest under another element
    #[must_use]
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Initial input value
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Initial checked state
    #[must_use]
    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Add a click effect
    #[must_use]
    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click.push(effect);
        self
    }

    /// Clicking navigates to `url`
    #[must_use]
    pub fn navigates_to(self, url: impl Into<String>) -> Self {
        self.on_click(ClickEffect::Navigate(url.into()))
    }

    /// Clicking reveals the given elements
    #[must_use]
    pub fn reveals<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_click(ClickEffect::Reveal(ids.into_iter().map(Into::into).collect()))
    }

    /// The first `n` clicks fail
    #[must_use]
    pub fn fail_clicks(mut self, n: u32) -> Self {
        self.failing_clicks = n;
        self
    }

    fn handle(&self) -> ElementHandle {
        ElementHandle::new(self.id.clone(), self.tag.clone())
    }

    fn matches_css(&self, css: &str) -> bool {
        self.selectors.iter().any(|s| matches!(s, Selector::Css(c) if c == css))
            || css.split(',').any(|part| part.trim() == self.tag)
    }
}

/// One document, reachable at a URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockScreen {
    url: String,
    title: String,
    elements: Vec<MockElement>,
    body_frames: Vec<String>,
    reload_frames: Vec<String>,
    key_effects: Vec<(String, ClickEffect)>,
}

impl MockScreen {
    /// Empty screen at `url`
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Document title
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Append an element in document order
    #[must_use]
    pub fn element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Successive body texts; the last one repeats
    ///
    /// Without frames the body text is derived from visible elements.
    #[must_use]
    pub fn body_frames<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body_frames = frames.into_iter().map(Into::into).collect();
        self
    }

    /// Body frames used after the first reload
    #[must_use]
    pub fn reload_frames<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reload_frames = frames.into_iter().map(Into::into).collect();
        self
    }

    /// Effect of pressing `key` on this screen
    #[must_use]
    pub fn on_key(mut self, key: impl Into<String>, effect: ClickEffect) -> Self {
        self.key_effects.push((key.into(), effect));
        self
    }

    fn find(&self, id: &str) -> Option<&MockElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut MockElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    fn children<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a MockElement> + 'a {
        self.elements
            .iter()
            .filter(move |e| e.parent.as_deref() == Some(id))
    }

    fn text_of(&self, element: &MockElement) -> String {
        let mut parts = Vec::new();
        if !element.text.is_empty() {
            parts.push(element.text.clone());
        }
        for child in self.children(&element.id) {
            let text = self.text_of(child);
            if !text.is_empty() {
                parts.push(text);
            }
        }
        parts.join(" ")
    }

    fn is_descendant(&self, element: &MockElement, ancestor: &str) -> bool {
        let mut current = element.parent.as_deref();
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.find(id).and_then(|e| e.parent.as_deref());
        }
        false
    }

    fn text_hit(&self, element: &MockElement, text: &str, exact: bool) -> bool {
        let rendered = self.text_of(element);
        if exact {
            rendered.trim() == text
        } else {
            rendered.contains(text)
        }
    }

    fn matches(&self, element: &MockElement, selector: &Selector) -> bool {
        if element.selectors.contains(selector) {
            return true;
        }
        match selector {
            Selector::Css(css) => element.matches_css(css),
            Selector::Text { text, exact } => {
                self.text_hit(element, text, *exact)
                    && !self
                        .children(&element.id)
                        .any(|c| self.text_hit(c, text, *exact))
            }
            Selector::CssWithText { css, text } => {
                element.matches_css(css) && self.text_of(element).contains(text.as_str())
            }
            Selector::CssWithoutText { css, text } => {
                element.matches_css(css) && !self.text_of(element).contains(text.as_str())
            }
            Selector::TestId(id) => element.attributes.get("data-testid") == Some(id),
            Selector::Placeholder(p) => element
                .attributes
                .get("placeholder")
                .is_some_and(|v| v.contains(p.as_str())),
            Selector::XPath(_) | Selector::Role { .. } => false,
        }
    }

    fn body_text(&self) -> String {
        self.elements
            .iter()
            .filter(|e| e.visible && !e.text.is_empty())
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Default)]
struct ScreenState {
    screen: MockScreen,
    frame: usize,
    reloaded: bool,
}

#[derive(Debug, Default)]
struct MockState {
    current: String,
    screens: HashMap<String, ScreenState>,
    history: Vec<String>,
    visibility_checks: HashMap<String, u32>,
    clicks: HashMap<String, u32>,
}

impl MockState {
    fn screen(&self) -> ComprobarResult<&ScreenState> {
        self.screens
            .get(&self.current)
            .ok_or_else(|| ComprobarError::page(format!("no document loaded at {}", self.current)))
    }

    fn screen_mut(&mut self) -> ComprobarResult<&mut ScreenState> {
        let current = self.current.clone();
        self.screens
            .get_mut(&current)
            .ok_or_else(|| ComprobarError::page(format!("no document loaded at {current}")))
    }

    fn element(&self, handle: &ElementHandle) -> ComprobarResult<&MockElement> {
        self.screen()?
            .screen
            .find(&handle.id)
            .ok_or_else(|| ComprobarError::page(format!("element {} is detached", handle.id)))
    }

    fn element_mut(&mut self, handle: &ElementHandle) -> ComprobarResult<&mut MockElement> {
        self.screen_mut()?
            .screen
            .find_mut(&handle.id)
            .ok_or_else(|| ComprobarError::page(format!("element {} is detached", handle.id)))
    }

    fn go_to(&mut self, url: &str) {
        self.current = url.to_string();
        self.screens
            .entry(url.to_string())
            .or_insert_with(|| ScreenState {
                screen: MockScreen::new(url),
                ..ScreenState::default()
            });
    }

    fn apply(&mut self, effect: &ClickEffect) -> ComprobarResult<()> {
        match effect {
            ClickEffect::Navigate(url) => {
                self.go_to(url);
                Ok(())
            }
            ClickEffect::Reveal(ids) | ClickEffect::Hide(ids) => {
                let visible = matches!(effect, ClickEffect::Reveal(_));
                let screen = &mut self.screen_mut()?.screen;
                for id in ids {
                    if let Some(element) = screen.find_mut(id) {
                        element.visible = visible;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Scriptable page implementing [`PageDriver`]
#[derive(Debug, Default)]
pub struct MockPage {
    state: Mutex<MockState>,
    load_state_failure: bool,
    reload_failure: bool,
    failing_selectors: Vec<Selector>,
    navigation_errors: Vec<String>,
    body_text_delay: Option<Duration>,
}

impl MockPage {
    /// Create a page with no screens
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a screen; the first registered screen is the current one
    #[must_use]
    pub fn with_screen(self, screen: MockScreen) -> Self {
        {
            let mut state = self.lock();
            if state.current.is_empty() {
                state.current.clone_from(&screen.url);
            }
            state.screens.insert(
                screen.url.clone(),
                ScreenState {
                    screen,
                    ..ScreenState::default()
                },
            );
        }
        self
    }

    /// Every load-state wait fails
    #[must_use]
    pub fn with_load_state_failure(mut self) -> Self {
        self.load_state_failure = true;
        self
    }

    /// Every reload fails
    #[must_use]
    pub fn with_reload_failure(mut self) -> Self {
        self.reload_failure = true;
        self
    }

    /// Queries with this selector fail
    #[must_use]
    pub fn with_failing_selector(mut self, selector: Selector) -> Self {
        self.failing_selectors.push(selector);
        self
    }

    /// Navigating to `url` lands on it but reports an error
    #[must_use]
    pub fn with_navigation_error(mut self, url: impl Into<String>) -> Self {
        self.navigation_errors.push(url.into());
        self
    }

    /// Delay every body text read
    #[must_use]
    pub fn with_body_text_delay(mut self, delay: Duration) -> Self {
        self.body_text_delay = Some(delay);
        self
    }

    /// Recorded calls, formatted `method` or `method:arg`
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    /// Number of recorded calls whose entry starts with `method`
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.lock()
            .history
            .iter()
            .filter(|c| c.starts_with(method))
            .count()
    }

    /// Value of an element, looked up on the current screen first
    #[must_use]
    pub fn value_of(&self, id: &str) -> Option<String> {
        self.inspect(id, |e| e.value.clone())
    }

    /// Checked state of an element, looked up on the current screen first
    #[must_use]
    pub fn is_element_checked(&self, id: &str) -> Option<bool> {
        self.inspect(id, |e| e.checked)
    }

    fn inspect<T>(&self, id: &str, read: impl Fn(&MockElement) -> T) -> Option<T> {
        let state = self.lock();
        state
            .screens
            .get(&state.current)
            .and_then(|s| s.screen.find(id))
            .or_else(|| state.screens.values().find_map(|s| s.screen.find(id)))
            .map(read)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: impl Into<String>) {
        self.lock().history.push(call.into());
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&mut self, url: &str) -> ComprobarResult<()> {
        let mut state = self.lock();
        state.history.push(format!("navigate:{url}"));
        state.go_to(url);
        if self.navigation_errors.iter().any(|u| u == url) {
            return Err(ComprobarError::NavigationError {
                url: url.to_string(),
                message: "net::ERR_ABORTED".to_string(),
            });
        }
        Ok(())
    }

    async fn reload(&mut self) -> ComprobarResult<()> {
        let mut state = self.lock();
        state.history.push("reload".to_string());
        if self.reload_failure {
            return Err(ComprobarError::page("reload failed"));
        }
        let screen = state.screen_mut()?;
        if !screen.screen.reload_frames.is_empty() && !screen.reloaded {
            screen.screen.body_frames = std::mem::take(&mut screen.screen.reload_frames);
        }
        screen.reloaded = true;
        screen.frame = 0;
        Ok(())
    }

    async fn current_url(&self) -> ComprobarResult<String> {
        Ok(self.lock().current.clone())
    }

    async fn title(&self) -> ComprobarResult<String> {
        let state = self.lock();
        Ok(state.screen()?.screen.title.clone())
    }

    async fn body_text(&self) -> ComprobarResult<String> {
        if let Some(delay) = self.body_text_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.lock();
        state.history.push("body_text".to_string());
        let screen = state.screen_mut()?;
        if screen.screen.body_frames.is_empty() {
            return Ok(screen.screen.body_text());
        }
        let last = screen.screen.body_frames.len() - 1;
        let text = screen.screen.body_frames[screen.frame.min(last)].clone();
        screen.frame = (screen.frame + 1).min(last);
        Ok(text)
    }

    async fn query_all(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> ComprobarResult<Vec<ElementHandle>> {
        let mut state = self.lock();
        state.history.push(format!("query_all:{selector}"));
        if self.failing_selectors.contains(selector) {
            return Err(ComprobarError::script(format!(
                "'{selector}' is not a valid selector"
            )));
        }
        let screen = &state.screen()?.screen;
        Ok(screen
            .elements
            .iter()
            .filter(|e| scope.map_or(true, |s| screen.is_descendant(e, &s.id)))
            .filter(|e| screen.matches(e, selector))
            .map(MockElement::handle)
            .collect())
    }

    async fn is_visible(&self, element: &ElementHandle) -> ComprobarResult<bool> {
        let mut state = self.lock();
        let (visible, after) = {
            let e = state.element(element)?;
            (e.visible, e.visible_after)
        };
        let checks = state
            .visibility_checks
            .entry(element.id.clone())
            .or_insert(0);
        *checks += 1;
        Ok(visible && *checks > after)
    }

    async fn text_content(&self, element: &ElementHandle) -> ComprobarResult<String> {
        let state = self.lock();
        let e = state.element(element)?;
        Ok(state.screen()?.screen.text_of(e))
    }

    async fn input_value(&self, element: &ElementHandle) -> ComprobarResult<String> {
        Ok(self.lock().element(element)?.value.clone())
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> ComprobarResult<Option<String>> {
        Ok(self.lock().element(element)?.attributes.get(name).cloned())
    }

    async fn is_checked(&self, element: &ElementHandle) -> ComprobarResult<bool> {
        Ok(self.lock().element(element)?.checked)
    }

    async fn closest(
        &self,
        element: &ElementHandle,
        ancestor: &Selector,
    ) -> ComprobarResult<Option<ElementHandle>> {
        let state = self.lock();
        let screen = &state.screen()?.screen;
        let mut current = Some(state.element(element)?);
        while let Some(e) = current {
            if screen.matches(e, ancestor) {
                return Ok(Some(e.handle()));
            }
            current = e.parent.as_deref().and_then(|p| screen.find(p));
        }
        Ok(None)
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> ComprobarResult<()> {
        let mut state = self.lock();
        state.element(element)?;
        state.history.push(format!("scroll_into_view:{}", element.id));
        Ok(())
    }

    async fn click(&self, element: &ElementHandle) -> ComprobarResult<()> {
        let mut state = self.lock();
        state.history.push(format!("click:{}", element.id));
        let (effects, failing) = {
            let e = state.element(element)?;
            (e.on_click.clone(), e.failing_clicks)
        };
        let clicks = state.clicks.entry(element.id.clone()).or_insert(0);
        *clicks += 1;
        if *clicks <= failing {
            return Err(ComprobarError::page(format!(
                "element {} is not clickable",
                element.id
            )));
        }
        for effect in &effects {
            state.apply(effect)?;
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementHandle, value: &str) -> ComprobarResult<()> {
        let mut state = self.lock();
        state.history.push(format!("fill:{}", element.id));
        state.element_mut(element)?.value = value.to_string();
        Ok(())
    }

    async fn select_option(&self, element: &ElementHandle, value: &str) -> ComprobarResult<()> {
        let mut state = self.lock();
        state.history.push(format!("select_option:{}", element.id));
        state.element_mut(element)?.value = value.to_string();
        Ok(())
    }

    async fn check(&self, element: &ElementHandle) -> ComprobarResult<()> {
        let mut state = self.lock();
        state.history.push(format!("check:{}", element.id));
        state.element_mut(element)?.checked = true;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> ComprobarResult<()> {
        let mut state = self.lock();
        state.history.push(format!("press_key:{key}"));
        let effects: Vec<ClickEffect> = state
            .screen()?
            .screen
            .key_effects
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, effect)| effect.clone())
            .collect();
        for effect in &effects {
            state.apply(effect)?;
        }
        Ok(())
    }

    async fn wait_for_load_state(
        &self,
        state: LoadState,
        timeout: Duration,
    ) -> ComprobarResult<()> {
        self.record(format!("wait_for_load_state:{state}"));
        if self.load_state_failure {
            tokio::time::sleep(timeout).await;
            return Err(ComprobarError::TimedOut {
                waited_for: state.to_string(),
                elapsed_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                last_observed: String::new(),
            });
        }
        Ok(())
    }

    async fn wait_for_url(&self, pattern: &UrlPattern, timeout: Duration) -> ComprobarResult<()> {
        self.record(format!("wait_for_url:{pattern}"));
        let deadline = Instant::now() + timeout;
        loop {
            let url = self.lock().current.clone();
            if pattern.matches(&url) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ComprobarError::TimedOut {
                    waited_for: format!("url {pattern}"),
                    elapsed_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    last_observed: url,
                });
            }
            tokio::time::sleep(Duration::from_millis(URL_POLL_INTERVAL_MS)).await;
        }
    }

    async fn evaluate(&self, script: &str) -> ComprobarResult<serde_json::Value> {
        self.record(format!("evaluate:{}", script.chars().take(40).collect::<String>()));
        Ok(serde_json::Value::Bool(true))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn login_screen() -> MockScreen {
        MockScreen::new("https://auth/page/login")
            .title("登录")
            .element(MockElement::new("form", "form"))
            .element(
                MockElement::new("acct", "input")
                    .parent("form")
                    .attr("placeholder", "请输入账号"),
            )
            .element(
                MockElement::new("btn", "button")
                    .text("登录")
                    .parent("form")
                    .navigates_to("https://boh/home"),
            )
    }

    mod query_tests {
        use super::*;

        #[tokio::test]
        async fn test_tag_css_matches_implicitly() {
            let page = MockPage::new().with_screen(login_screen());
            let found = page.query_all(&Selector::css("input, textarea"), None).await.unwrap();
            assert_eq!(found, vec![ElementHandle::new("acct", "input")]);
        }

        #[tokio::test]
        async fn test_text_matches_innermost() {
            let page = MockPage::new().with_screen(login_screen());
            let found = page.query_all(&Selector::text("登录"), None).await.unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].id, "btn");
        }

        #[tokio::test]
        async fn test_placeholder_and_has_text() {
            let page = MockPage::new().with_screen(login_screen());
            let found = page.query_all(&Selector::placeholder("账号"), None).await.unwrap();
            assert_eq!(found[0].id, "acct");
            let found = page
                .query_all(&Selector::css_with_text("button", "登录"), None)
                .await
                .unwrap();
            assert_eq!(found[0].id, "btn");
        }

        #[tokio::test]
        async fn test_text_content_includes_descendants() {
            let page = MockPage::new().with_screen(login_screen());
            let text = page
                .text_content(&ElementHandle::new("form", "form"))
                .await
                .unwrap();
            assert_eq!(text, "登录");
        }

        #[tokio::test]
        async fn test_closest_walks_parents() {
            let page = MockPage::new().with_screen(login_screen());
            let form = page
                .closest(&ElementHandle::new("btn", "button"), &Selector::css("form"))
                .await
                .unwrap();
            assert_eq!(form, Some(ElementHandle::new("form", "form")));
        }

        #[tokio::test]
        async fn test_detached_element_errors() {
            let page = MockPage::new().with_screen(login_screen());
            assert!(page
                .is_visible(&ElementHandle::new("gone", "div"))
                .await
                .is_err());
        }
    }

    mod interaction_tests {
        use super::*;

        #[tokio::test]
        async fn test_click_navigates() {
            let page = MockPage::new().with_screen(login_screen());
            page.click(&ElementHandle::new("btn", "button")).await.unwrap();
            assert_eq!(page.current_url().await.unwrap(), "https://boh/home");
            assert!(page.was_called("click:btn"));
        }

        #[tokio::test]
        async fn test_failing_clicks_then_success() {
            let page = MockPage::new().with_screen(
                MockScreen::new("https://x").element(MockElement::new("b", "button").fail_clicks(1)),
            );
            let b = ElementHandle::new("b", "button");
            assert!(page.click(&b).await.is_err());
            assert!(page.click(&b).await.is_ok());
        }

        #[tokio::test]
        async fn test_fill_and_check() {
            let page = MockPage::new().with_screen(
                login_screen().element(MockElement::new("agree", "input").attr("type", "checkbox")),
            );
            page.fill(&ElementHandle::new("acct", "input"), "admin")
                .await
                .unwrap();
            page.check(&ElementHandle::new("agree", "input")).await.unwrap();
            assert_eq!(page.value_of("acct").as_deref(), Some("admin"));
            assert_eq!(page.is_element_checked("agree"), Some(true));
        }

        #[tokio::test]
        async fn test_key_effect() {
            let page = MockPage::new().with_screen(
                login_screen().on_key("Enter", ClickEffect::Navigate("https://boh/home".into())),
            );
            page.press_key("Enter").await.unwrap();
            assert_eq!(page.current_url().await.unwrap(), "https://boh/home");
        }

        #[tokio::test]
        async fn test_body_frames_advance_and_stick() {
            let page = MockPage::new()
                .with_screen(MockScreen::new("https://x").body_frames(["a", "b"]));
            assert_eq!(page.body_text().await.unwrap(), "a");
            assert_eq!(page.body_text().await.unwrap(), "b");
            assert_eq!(page.body_text().await.unwrap(), "b");
        }

        #[tokio::test]
        async fn test_navigation_error_still_lands() {
            let mut page = MockPage::new().with_navigation_error("https://boh/list");
            assert!(page.navigate("https://boh/list").await.is_err());
            assert_eq!(page.current_url().await.unwrap(), "https://boh/list");
        }

        #[tokio::test(start_paused = true)]
        async fn test_wait_for_url_times_out() {
            let page = MockPage::new().with_screen(login_screen());
            let result = page
                .wait_for_url(&UrlPattern::glob("**/detail**"), Duration::from_millis(200))
                .await;
            assert!(matches!(result, Err(ComprobarError::TimedOut { .. })));
        }
    }
}
