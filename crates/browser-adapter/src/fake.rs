//! Scripted in-memory driver.
//!
//! `FakePage` models a single page as a flat list of visible elements
//! with text, labels, roles and bounding boxes. Tests (and the CLI
//! dry-run mode) script it with elements, page text and injected
//! faults, then assert on the interaction log afterwards.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use visor_core_types::{BoundingBox, Point};

use crate::driver::BrowserDriver;
use crate::errors::BrowserError;
use crate::types::{ElementHandle, ReadScope, Screenshot, ScrollMotion, SelectorQuery, TargetRef};

/// One scripted element on the fake page.
#[derive(Clone, Debug)]
pub struct FakeElement {
    pub handle: ElementHandle,
    pub text: String,
    pub placeholder: Option<String>,
    pub label: Option<String>,
    pub role: Option<String>,
    pub bbox: BoundingBox,
    pub visible: bool,
}

impl FakeElement {
    pub fn new(handle: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            handle: ElementHandle(handle.into()),
            text: text.into(),
            placeholder: None,
            label: None,
            role: None,
            bbox: BoundingBox::new(0.0, 0.0, 100.0, 30.0),
            visible: true,
        }
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn at(mut self, bbox: BoundingBox) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    fn contains_point(&self, p: Point) -> bool {
        p.x >= self.bbox.x
            && p.x <= self.bbox.x + self.bbox.width
            && p.y >= self.bbox.y
            && p.y <= self.bbox.y + self.bbox.height
    }
}

#[derive(Default)]
struct PageState {
    url: String,
    title: String,
    page_text: String,
    elements: Vec<FakeElement>,
    navigations: Vec<String>,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
    scrolls: Vec<String>,
    shot_count: u32,
    closed: bool,
    faults: HashMap<String, VecDeque<BrowserError>>,
}

/// Scripted in-memory `BrowserDriver`.
pub struct FakePage {
    screenshot_dir: PathBuf,
    state: Mutex<PageState>,
}

impl FakePage {
    pub fn new(screenshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            screenshot_dir: screenshot_dir.into(),
            state: Mutex::new(PageState::default()),
        }
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.state.lock().title = title.into();
    }

    pub fn set_page_text(&self, text: impl Into<String>) {
        self.state.lock().page_text = text.into();
    }

    pub fn add_element(&self, element: FakeElement) {
        self.state.lock().elements.push(element);
    }

    /// Queue an error for the next call of `op` (one of `navigate`,
    /// `click`, `fill`, `scroll`, `read_text`, `query_selector`,
    /// `screenshot`). Faults are consumed in FIFO order.
    pub fn inject_fault(&self, op: &str, err: BrowserError) {
        self.state
            .lock()
            .faults
            .entry(op.to_string())
            .or_default()
            .push_back(err);
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().clicks.clone()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.state.lock().fills.clone()
    }

    pub fn scrolls(&self) -> Vec<String> {
        self.state.lock().scrolls.clone()
    }

    pub fn screenshot_count(&self) -> u32 {
        self.state.lock().shot_count
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn take_fault(state: &mut PageState, op: &str) -> Option<BrowserError> {
        state.faults.get_mut(op).and_then(|q| q.pop_front())
    }

    fn check_open(state: &PageState) -> Result<(), BrowserError> {
        if state.closed {
            Err(BrowserError::SessionLost("session closed".into()))
        } else {
            Ok(())
        }
    }

    fn find_target<'a>(
        state: &'a PageState,
        target: &TargetRef,
    ) -> Result<&'a FakeElement, BrowserError> {
        match target {
            TargetRef::Handle(handle) => state
                .elements
                .iter()
                .find(|e| e.visible && e.handle == *handle)
                .ok_or_else(|| BrowserError::TargetDetached(format!("no element {}", handle))),
            TargetRef::Coordinates(point) => state
                .elements
                .iter()
                .find(|e| e.visible && e.contains_point(*point))
                .ok_or_else(|| BrowserError::TargetDetached(format!("no element at {}", point))),
        }
    }

    fn matches(element: &FakeElement, query: &SelectorQuery) -> bool {
        if !element.visible {
            return false;
        }
        let contains = |haystack: &str, needle: &str| {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        };
        match query {
            SelectorQuery::Text(text) => contains(&element.text, text),
            SelectorQuery::Placeholder(text) => element
                .placeholder
                .as_deref()
                .is_some_and(|p| contains(p, text)),
            SelectorQuery::Label(text) => {
                element.label.as_deref().is_some_and(|l| contains(l, text))
            }
            SelectorQuery::Role { role, name } => {
                element.role.as_deref() == Some(role.as_str())
                    && (contains(&element.text, name)
                        || element.label.as_deref().is_some_and(|l| contains(l, name)))
            }
        }
    }
}

#[async_trait]
impl BrowserDriver for FakePage {
    async fn navigate(&self, url: &str) -> Result<String, BrowserError> {
        let mut state = self.state.lock();
        Self::check_open(&state)?;
        if let Some(err) = Self::take_fault(&mut state, "navigate") {
            return Err(err);
        }
        debug!(url, "fake navigate");
        state.url = url.to_string();
        state.navigations.push(url.to_string());
        Ok(state.title.clone())
    }

    async fn click(&self, target: &TargetRef) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        Self::check_open(&state)?;
        if let Some(err) = Self::take_fault(&mut state, "click") {
            return Err(err);
        }
        let handle = Self::find_target(&state, target)?.handle.clone();
        debug!(%handle, "fake click");
        state.clicks.push(handle.0);
        Ok(())
    }

    async fn fill(&self, target: &TargetRef, value: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        Self::check_open(&state)?;
        if let Some(err) = Self::take_fault(&mut state, "fill") {
            return Err(err);
        }
        let handle = Self::find_target(&state, target)?.handle.clone();
        if let Some(element) = state.elements.iter_mut().find(|e| e.handle == handle) {
            element.text = value.to_string();
        }
        state.fills.push((handle.0, value.to_string()));
        Ok(())
    }

    async fn scroll(&self, motion: &ScrollMotion) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        Self::check_open(&state)?;
        if let Some(err) = Self::take_fault(&mut state, "scroll") {
            return Err(err);
        }
        match motion {
            ScrollMotion::IntoView(target) => {
                let handle = Self::find_target(&state, target)?.handle.clone();
                state.scrolls.push(format!("into-view:{}", handle));
            }
            ScrollMotion::Direction(direction) => {
                state.scrolls.push(format!("direction:{:?}", direction));
            }
        }
        Ok(())
    }

    async fn read_text(&self, scope: &ReadScope) -> Result<String, BrowserError> {
        let mut state = self.state.lock();
        Self::check_open(&state)?;
        if let Some(err) = Self::take_fault(&mut state, "read_text") {
            return Err(err);
        }
        match scope {
            ReadScope::Target(target) => Ok(Self::find_target(&state, target)?.text.clone()),
            ReadScope::Page => {
                let mut text = state.page_text.clone();
                for element in state.elements.iter().filter(|e| e.visible) {
                    text.push('\n');
                    text.push_str(&element.text);
                }
                Ok(text)
            }
        }
    }

    async fn query_selector(
        &self,
        query: &SelectorQuery,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let mut state = self.state.lock();
        Self::check_open(&state)?;
        if let Some(err) = Self::take_fault(&mut state, "query_selector") {
            return Err(err);
        }
        let matches: Vec<ElementHandle> = state
            .elements
            .iter()
            .filter(|e| Self::matches(e, query))
            .map(|e| e.handle.clone())
            .collect();
        debug!(query = %query, count = matches.len(), "fake query");
        Ok(matches)
    }

    async fn screenshot(&self) -> Result<Screenshot, BrowserError> {
        let mut state = self.state.lock();
        Self::check_open(&state)?;
        if let Some(err) = Self::take_fault(&mut state, "screenshot") {
            return Err(err);
        }
        state.shot_count += 1;
        let path = self
            .screenshot_dir
            .join(format!("shot-{:03}.png", state.shot_count));
        let bytes = format!("fake-png:{}:{}", state.url, state.shot_count).into_bytes();
        std::fs::write(&path, &bytes)
            .map_err(|e| BrowserError::ScreenshotFailed(e.to_string()))?;
        Ok(Screenshot { path, bytes })
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.state.lock().closed = true;
        Ok(())
    }
}
