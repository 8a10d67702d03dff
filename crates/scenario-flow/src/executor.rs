//! Single-attempt step execution.
//!
//! The executor runs exactly one attempt of one step and reports what
//! happened; the retry loop and run bookkeeping live in the
//! orchestrator. Failures come back as data, not errors, so the policy
//! layer can classify them without unwinding.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use browser_adapter::{BrowserDriver, BrowserError, ReadScope, Screenshot, ScrollMotion, TargetRef};
use element_locator::{ElementResolver, ResolvedTarget, TargetSource};
use tracing::{debug, warn};
use visor_core_types::ErrorKind;

use crate::types::{ScrollTarget, StepAction, TestStep, VerifyCondition};

/// What one attempt produced. Terminal classification happens in the
/// orchestrator against the retry policy.
#[derive(Clone, Debug)]
pub struct AttemptOutcome {
    pub success: bool,
    pub message: String,
    pub error: Option<ErrorKind>,
    pub screenshot_path: Option<PathBuf>,
    pub resolution_source: Option<TargetSource>,
}

impl AttemptOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            screenshot_path: None,
            resolution_source: None,
        }
    }

    fn failed(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(kind),
            screenshot_path: None,
            resolution_source: None,
        }
    }

    fn with_source(mut self, source: TargetSource) -> Self {
        self.resolution_source = Some(source);
        self
    }
}

/// Runs one attempt of one step.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, step: &TestStep) -> AttemptOutcome;
}

/// Default executor: resolves targets through the locator strategy and
/// drives the browser primitives, each under a call timeout.
pub struct DefaultStepExecutor {
    driver: Arc<dyn BrowserDriver>,
    resolver: Arc<dyn ElementResolver>,
    call_timeout: Duration,
}

impl DefaultStepExecutor {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        resolver: Arc<dyn ElementResolver>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            driver,
            resolver,
            call_timeout,
        }
    }

    /// Bound one browser call. A timeout is a transient failure.
    async fn bounded<T>(
        &self,
        op: &str,
        call: impl std::future::Future<Output = Result<T, BrowserError>> + Send,
    ) -> Result<T, BrowserError> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| {
                BrowserError::Timeout(format!(
                    "{} exceeded {}ms",
                    op,
                    self.call_timeout.as_millis()
                ))
            })?
    }

    /// Snapshot the page for resolution. Resolution is always performed
    /// against the page as it is *now*.
    async fn snapshot(&self) -> Result<Screenshot, BrowserError> {
        self.bounded("screenshot", self.driver.screenshot()).await
    }

    async fn resolve(&self, description: &str) -> Result<ResolvedTarget, AttemptOutcome> {
        let snapshot = match self.snapshot().await {
            Ok(s) => s,
            Err(e) => {
                return Err(AttemptOutcome::failed(
                    format!("pre-step screenshot failed: {}", e),
                    e.kind(),
                ))
            }
        };
        match self.resolver.resolve(description, &snapshot).await {
            Ok(resolved) => {
                debug!(
                    description,
                    source = %resolved.source,
                    confidence = resolved.confidence,
                    "target resolved"
                );
                Ok(resolved)
            }
            Err(e) => Err(AttemptOutcome::failed(
                format!("could not resolve '{}': {}", description, e),
                e.kind(),
            )),
        }
    }

    async fn run_action(&self, step: &TestStep) -> AttemptOutcome {
        match &step.action {
            StepAction::Visit { url } => {
                match self.bounded("navigate", self.driver.navigate(url)).await {
                    Ok(title) => AttemptOutcome::ok(format!("navigated to {} ({})", url, title)),
                    Err(e) => {
                        AttemptOutcome::failed(format!("navigation to {} failed: {}", url, e), e.kind())
                    }
                }
            }

            StepAction::Click { target } => {
                let resolved = match self.resolve(target).await {
                    Ok(r) => r,
                    Err(outcome) => return outcome,
                };
                match self.bounded("click", self.driver.click(&resolved.target)).await {
                    Ok(()) => AttemptOutcome::ok(format!("clicked {}", target))
                        .with_source(resolved.source),
                    Err(e) => AttemptOutcome::failed(
                        format!("click on {} failed: {}", target, e),
                        e.kind(),
                    )
                    .with_source(resolved.source),
                }
            }

            StepAction::Fill { target, value } => {
                let resolved = match self.resolve(target).await {
                    Ok(r) => r,
                    Err(outcome) => return outcome,
                };
                match self
                    .bounded("fill", self.driver.fill(&resolved.target, value))
                    .await
                {
                    Ok(()) => AttemptOutcome::ok(format!("filled {}", target))
                        .with_source(resolved.source),
                    Err(e) => AttemptOutcome::failed(
                        format!("fill of {} failed: {}", target, e),
                        e.kind(),
                    )
                    .with_source(resolved.source),
                }
            }

            StepAction::Scroll { target } => match target {
                ScrollTarget::Element { description } => {
                    let resolved = match self.resolve(description).await {
                        Ok(r) => r,
                        Err(outcome) => return outcome,
                    };
                    let motion = ScrollMotion::IntoView(resolved.target.clone());
                    match self.bounded("scroll", self.driver.scroll(&motion)).await {
                        Ok(()) => AttemptOutcome::ok(format!("scrolled {} into view", description))
                            .with_source(resolved.source),
                        Err(e) => AttemptOutcome::failed(
                            format!("scroll to {} failed: {}", description, e),
                            e.kind(),
                        )
                        .with_source(resolved.source),
                    }
                }
                ScrollTarget::Direction(direction) => {
                    let motion = ScrollMotion::Direction(*direction);
                    match self.bounded("scroll", self.driver.scroll(&motion)).await {
                        Ok(()) => AttemptOutcome::ok(format!("scrolled {:?}", direction)),
                        Err(e) => {
                            AttemptOutcome::failed(format!("scroll failed: {}", e), e.kind())
                        }
                    }
                }
            },

            StepAction::Verify { condition, target } => self.verify(condition, target.as_deref()).await,
        }
    }

    async fn verify(&self, condition: &VerifyCondition, target: Option<&str>) -> AttemptOutcome {
        match condition {
            // Resolution succeeding *is* the assertion.
            VerifyCondition::Visible => {
                let description = target.unwrap_or_default();
                match self.resolve(description).await {
                    Ok(resolved) => AttemptOutcome::ok(format!("{} is visible", description))
                        .with_source(resolved.source),
                    Err(outcome) => outcome,
                }
            }

            VerifyCondition::ContainsText { expected } => {
                let description = target.unwrap_or_default();
                let resolved = match self.resolve(description).await {
                    Ok(r) => r,
                    Err(outcome) => return outcome,
                };
                let scope = ReadScope::Target(resolved.target.clone());
                match self.bounded("read_text", self.driver.read_text(&scope)).await {
                    Ok(actual) => {
                        if actual.to_lowercase().contains(&expected.to_lowercase()) {
                            AttemptOutcome::ok(format!("{} contains '{}'", description, expected))
                                .with_source(resolved.source)
                        } else {
                            AttemptOutcome::failed(
                                format!(
                                    "{} does not contain '{}' (got '{}')",
                                    description, expected, actual
                                ),
                                ErrorKind::AssertionFailed,
                            )
                            .with_source(resolved.source)
                        }
                    }
                    Err(e) => AttemptOutcome::failed(
                        format!("text read of {} failed: {}", description, e),
                        e.kind(),
                    )
                    .with_source(resolved.source),
                }
            }

            VerifyCondition::PageContains { expected } => {
                match self
                    .bounded("read_text", self.driver.read_text(&ReadScope::Page))
                    .await
                {
                    Ok(actual) => {
                        if actual.to_lowercase().contains(&expected.to_lowercase()) {
                            AttemptOutcome::ok(format!("page contains '{}'", expected))
                        } else {
                            AttemptOutcome::failed(
                                format!("page does not contain '{}'", expected),
                                ErrorKind::AssertionFailed,
                            )
                        }
                    }
                    Err(e) => {
                        AttemptOutcome::failed(format!("page read failed: {}", e), e.kind())
                    }
                }
            }

            // Row-level assertion: every expected value must land in the
            // same row, not merely somewhere on the page.
            VerifyCondition::RowMatches { fields } => {
                match self
                    .bounded("read_text", self.driver.read_text(&ReadScope::Page))
                    .await
                {
                    Ok(actual) => {
                        let matched = actual.lines().any(|row| {
                            let row = row.to_lowercase();
                            fields.values().all(|value| row.contains(&value.to_lowercase()))
                        });
                        let expected = fields
                            .iter()
                            .map(|(column, value)| format!("{}={}", column, value))
                            .collect::<Vec<_>>()
                            .join(", ");
                        if matched {
                            AttemptOutcome::ok(format!("a row contains {}", expected))
                        } else {
                            AttemptOutcome::failed(
                                format!("no row contains {}", expected),
                                ErrorKind::AssertionFailed,
                            )
                        }
                    }
                    Err(e) => {
                        AttemptOutcome::failed(format!("page read failed: {}", e), e.kind())
                    }
                }
            }
        }
    }
}

#[async_trait]
impl StepExecutor for DefaultStepExecutor {
    async fn execute(&self, step: &TestStep) -> AttemptOutcome {
        let mut outcome = self.run_action(step).await;

        // Every attempt leaves a trace artifact, pass or fail. A failed
        // capture downgrades the trace, never the attempt.
        match self.bounded("screenshot", self.driver.screenshot()).await {
            Ok(shot) => outcome.screenshot_path = Some(shot.path),
            Err(e) => {
                warn!(step = step.index, error = %e, "post-step screenshot failed");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browser_adapter::{ElementHandle, FakeElement, FakePage, Screenshot};
    use element_locator::{LocatorError, ResolvedTarget};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Resolver scripted per description.
    struct StubResolver {
        answers: Mutex<HashMap<String, Result<ResolvedTarget, ErrorKind>>>,
    }

    impl StubResolver {
        fn new() -> Self {
            Self {
                answers: Mutex::new(HashMap::new()),
            }
        }

        fn resolves_to(self, description: &str, handle: &str) -> Self {
            self.answers.lock().insert(
                description.to_string(),
                Ok(ResolvedTarget::from_selector(TargetRef::Handle(
                    ElementHandle(handle.to_string()),
                ))),
            );
            self
        }

        fn fails_with(self, description: &str, kind: ErrorKind) -> Self {
            self.answers.lock().insert(description.to_string(), Err(kind));
            self
        }
    }

    #[async_trait]
    impl ElementResolver for StubResolver {
        async fn resolve(
            &self,
            description: &str,
            _snapshot: &Screenshot,
        ) -> Result<ResolvedTarget, LocatorError> {
            match self.answers.lock().get(description) {
                Some(Ok(resolved)) => Ok(resolved.clone()),
                Some(Err(ErrorKind::Adapter)) => {
                    Err(LocatorError::Adapter("scripted".to_string()))
                }
                _ => Err(LocatorError::NotFound(description.to_string())),
            }
        }
    }

    fn executor(
        page: Arc<FakePage>,
        resolver: StubResolver,
    ) -> DefaultStepExecutor {
        DefaultStepExecutor::new(page, Arc::new(resolver), Duration::from_secs(2))
    }

    fn step(action: StepAction) -> TestStep {
        TestStep::new(0, "test step", action)
    }

    #[tokio::test]
    async fn visit_navigates_and_captures_trace() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::new(dir.path()));
        page.set_title("Home");
        let exec = executor(page.clone(), StubResolver::new());

        let outcome = exec
            .execute(&step(StepAction::Visit {
                url: "http://localhost:8000".into(),
            }))
            .await;
        assert!(outcome.success);
        assert!(outcome.screenshot_path.is_some());
        assert_eq!(page.navigations(), vec!["http://localhost:8000"]);
    }

    #[tokio::test]
    async fn click_uses_resolved_target() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::new(dir.path()));
        page.add_element(FakeElement::new("login", "Login"));
        let exec = executor(
            page.clone(),
            StubResolver::new().resolves_to("Login button", "login"),
        );

        let outcome = exec
            .execute(&step(StepAction::Click {
                target: "Login button".into(),
            }))
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.resolution_source, Some(TargetSource::Selector));
        assert_eq!(page.clicks(), vec!["login".to_string()]);
    }

    #[tokio::test]
    async fn resolution_failure_surfaces_its_kind() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::new(dir.path()));
        let exec = executor(
            page,
            StubResolver::new().fails_with("Ghost button", ErrorKind::ElementNotFound),
        );

        let outcome = exec
            .execute(&step(StepAction::Click {
                target: "Ghost button".into(),
            }))
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(ErrorKind::ElementNotFound));
    }

    #[tokio::test]
    async fn fill_types_into_resolved_element() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::new(dir.path()));
        page.add_element(FakeElement::new("user", "").with_placeholder("username"));
        let exec = executor(
            page.clone(),
            StubResolver::new().resolves_to("username field", "user"),
        );

        let outcome = exec
            .execute(&step(StepAction::Fill {
                target: "username field".into(),
                value: "alice".into(),
            }))
            .await;
        assert!(outcome.success);
        assert_eq!(page.fills(), vec![("user".to_string(), "alice".to_string())]);
    }

    #[tokio::test]
    async fn verify_contains_text_mismatch_is_assertion_failure() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::new(dir.path()));
        page.add_element(FakeElement::new("banner", "Welcome, bob"));
        let exec = executor(
            page,
            StubResolver::new().resolves_to("greeting banner", "banner"),
        );

        let outcome = exec
            .execute(&step(StepAction::Verify {
                condition: VerifyCondition::ContainsText {
                    expected: "Welcome, alice".into(),
                },
                target: Some("greeting banner".into()),
            }))
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(ErrorKind::AssertionFailed));
    }

    #[tokio::test]
    async fn verify_page_contains_reads_whole_page() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::new(dir.path()));
        page.set_page_text("Dashboard loaded");
        let exec = executor(page, StubResolver::new());

        let outcome = exec
            .execute(&step(StepAction::Verify {
                condition: VerifyCondition::PageContains {
                    expected: "dashboard".into(),
                },
                target: None,
            }))
            .await;
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn verify_row_matches_requires_values_in_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::new(dir.path()));
        page.set_page_text("Orders\nAlice | 42 | paid\nBob | 7 | open");
        let exec = executor(page, StubResolver::new());

        let fields = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(c, v)| (c.to_string(), v.to_string()))
                .collect::<std::collections::BTreeMap<_, _>>()
        };

        let outcome = exec
            .execute(&step(StepAction::Verify {
                condition: VerifyCondition::RowMatches {
                    fields: fields(&[("name", "alice"), ("total", "42")]),
                },
                target: None,
            }))
            .await;
        assert!(outcome.success);

        // Both values exist on the page but in different rows.
        let outcome = exec
            .execute(&step(StepAction::Verify {
                condition: VerifyCondition::RowMatches {
                    fields: fields(&[("name", "Alice"), ("total", "7")]),
                },
                target: None,
            }))
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(ErrorKind::AssertionFailed));
    }

    #[tokio::test]
    async fn failed_trace_capture_does_not_change_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::new(dir.path()));
        page.set_title("Home");
        page.inject_fault(
            "screenshot",
            browser_adapter::BrowserError::ScreenshotFailed("disk full".into()),
        );
        let exec = executor(page, StubResolver::new());

        let outcome = exec
            .execute(&step(StepAction::Visit {
                url: "http://localhost:8000".into(),
            }))
            .await;
        assert!(outcome.success);
        assert!(outcome.screenshot_path.is_none());
    }

    #[tokio::test]
    async fn directional_scroll_needs_no_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::new(dir.path()));
        let exec = executor(page.clone(), StubResolver::new());

        let outcome = exec
            .execute(&step(StepAction::Scroll {
                target: ScrollTarget::Direction(browser_adapter::ScrollDirection::Bottom),
            }))
            .await;
        assert!(outcome.success);
        assert_eq!(page.scrolls(), vec!["direction:Bottom".to_string()]);
    }
}
