//! Scenario, step and run-state types.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use browser_adapter::ScrollDirection;
use chrono::{DateTime, Utc};
use element_locator::TargetSource;
use serde::{Deserialize, Serialize};
use visor_core_types::{ErrorKind, ScenarioId, SessionId};

/// Condition checked by a verify step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyCondition {
    /// The described element is visible (resolution succeeding is the
    /// assertion).
    Visible,
    /// The described element's text contains `expected`.
    ContainsText { expected: String },
    /// The page text as a whole contains `expected`.
    PageContains { expected: String },
    /// Some row of the page carries every expected cell value. Rows are
    /// the lines of the page text; column names label the expectation
    /// in reports.
    RowMatches { fields: BTreeMap<String, String> },
}

impl VerifyCondition {
    /// Whether this condition needs a resolvable target.
    pub fn requires_target(&self) -> bool {
        !matches!(
            self,
            VerifyCondition::PageContains { .. } | VerifyCondition::RowMatches { .. }
        )
    }
}

/// What a scroll step scrolls to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollTarget {
    /// Scroll the described element into view.
    Element { description: String },
    /// Scroll the page in a fixed direction.
    Direction(ScrollDirection),
}

/// Closed sum of step action kinds. Adding a kind is a compile-checked
/// extension point: the executor matches exhaustively.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StepAction {
    Visit {
        url: String,
    },
    Click {
        target: String,
    },
    Fill {
        target: String,
        value: String,
    },
    Scroll {
        target: ScrollTarget,
    },
    Verify {
        condition: VerifyCondition,
        target: Option<String>,
    },
}

impl StepAction {
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Visit { .. } => "visit",
            StepAction::Click { .. } => "click",
            StepAction::Fill { .. } => "fill",
            StepAction::Scroll { .. } => "scroll",
            StepAction::Verify { .. } => "verify",
        }
    }
}

/// One step of a scenario. Immutable once parsed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestStep {
    /// Stable position in the scenario, used for ordering and reporting.
    pub index: u32,
    /// Human-readable description of the step.
    pub description: String,
    pub action: StepAction,
}

impl TestStep {
    pub fn new(index: u32, description: impl Into<String>, action: StepAction) -> Self {
        Self {
            index,
            description: description.into(),
            action,
        }
    }
}

/// An ordered, immutable scenario owned by the orchestrator for the
/// duration of one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestScenario {
    pub id: ScenarioId,
    pub name: String,
    pub description: String,
    pub steps: Vec<TestStep>,
}

impl TestScenario {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: ScenarioId::new(),
            name: name.into(),
            description: description.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, action: StepAction, description: impl Into<String>) -> Self {
        let index = self.steps.len() as u32;
        self.steps.push(TestStep::new(index, description, action));
        self
    }

    /// Structural validation: at least one step, contiguous indices,
    /// non-empty descriptions, and a target wherever one is required.
    pub fn validate(&self) -> Result<(), String> {
        if self.steps.is_empty() {
            return Err("scenario has no steps".to_string());
        }
        for (position, step) in self.steps.iter().enumerate() {
            if step.index != position as u32 {
                return Err(format!(
                    "step at position {} carries index {}",
                    position, step.index
                ));
            }
            if step.description.trim().is_empty() {
                return Err(format!("step {} has an empty description", step.index));
            }
            if let StepAction::Verify { condition, target } = &step.action {
                if condition.requires_target() && target.is_none() {
                    return Err(format!(
                        "verify step {} needs a target for its condition",
                        step.index
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Run status. Transitions only move forward: `Idle` before the first
/// step, `Running` until terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    Passed,
    Failed,
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Idle | RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
            RunStatus::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}

/// Terminal record of one step. Created exactly once, when the step
/// reaches success or exhausts its retries; immutable thereafter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_index: u32,
    pub success: bool,
    pub message: String,
    pub screenshot_path: Option<PathBuf>,
    pub error: Option<ErrorKind>,
    pub attempts: u32,
    pub resolution_source: Option<TargetSource>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub latency_ms: u64,
}

impl StepResult {
    pub fn new(step_index: u32) -> Self {
        let now = Utc::now();
        Self {
            step_index,
            success: false,
            message: String::new(),
            screenshot_path: None,
            error: None,
            attempts: 0,
            resolution_source: None,
            started_at: now,
            finished_at: now,
            latency_ms: 0,
        }
    }

    pub fn with_success(mut self, message: impl Into<String>) -> Self {
        self.success = true;
        self.message = message.into();
        self.error = None;
        self
    }

    pub fn with_failure(mut self, message: impl Into<String>, kind: ErrorKind) -> Self {
        self.success = false;
        self.message = message.into();
        self.error = Some(kind);
        self
    }

    pub fn with_screenshot(mut self, path: Option<PathBuf>) -> Self {
        self.screenshot_path = path;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_source(mut self, source: Option<TargetSource>) -> Self {
        self.resolution_source = source;
        self
    }

    /// Set the finish time and latency.
    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self.latency_ms = (self.finished_at - self.started_at).num_milliseconds().max(0) as u64;
        self
    }
}

/// Accumulated record of one run. Mutated only by its orchestrator,
/// monotonically; exposed to reporting as an immutable snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub scenario_id: ScenarioId,
    /// The browser session this run owns.
    pub session_id: SessionId,
    pub name: String,
    pub status: RunStatus,
    /// Number of steps that reached a terminal per-step outcome.
    pub current_index: u32,
    pub total_steps: u32,
    /// Terminal results in step order. `steps.len() == current_index`
    /// holds at every observation point after a step completes.
    pub steps: Vec<StepResult>,
    /// Indices of steps that were never executed.
    pub skipped: Vec<u32>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new(scenario: &TestScenario) -> Self {
        Self {
            scenario_id: scenario.id.clone(),
            session_id: SessionId::new(),
            name: scenario.name.clone(),
            status: RunStatus::Idle,
            current_index: 0,
            total_steps: scenario.steps.len() as u32,
            steps: Vec::new(),
            skipped: Vec::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Enter `Running`. A no-op once the status has moved past `Idle`.
    pub fn start(&mut self) {
        if self.status == RunStatus::Idle {
            self.status = RunStatus::Running;
        }
    }

    /// Append a terminal step result and advance the cursor.
    pub fn record(&mut self, result: StepResult) {
        self.steps.push(result);
        self.current_index = self.steps.len() as u32;
    }

    /// Mark every step from the cursor onward as skipped.
    pub fn skip_remaining(&mut self) {
        for index in self.current_index..self.total_steps {
            self.skipped.push(index);
        }
    }

    /// Transition to a terminal status. Status moves only forward; a
    /// second finalize is ignored.
    pub fn finalize(&mut self, status: RunStatus) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(|r| !r.success)
    }

    pub fn passed_steps(&self) -> usize {
        self.steps.iter().filter(|r| r.success).count()
    }

    pub fn progress(&self) -> String {
        format!("{}/{}", self.steps.len(), self.total_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> TestScenario {
        TestScenario::new("login", "Log in and check greeting")
            .with_step(
                StepAction::Visit {
                    url: "http://localhost:8000".into(),
                },
                "Visit http://localhost:8000",
            )
            .with_step(
                StepAction::Click {
                    target: "Login button".into(),
                },
                "Click on Login button",
            )
    }

    #[test]
    fn builder_assigns_contiguous_indices() {
        let s = scenario();
        assert_eq!(s.steps[0].index, 0);
        assert_eq!(s.steps[1].index, 1);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn empty_scenario_fails_validation() {
        let s = TestScenario::new("empty", "");
        assert!(s.validate().is_err());
    }

    #[test]
    fn targeted_verify_without_target_fails_validation() {
        let s = TestScenario::new("v", "").with_step(
            StepAction::Verify {
                condition: VerifyCondition::Visible,
                target: None,
            },
            "Verify something is visible",
        );
        assert!(s.validate().is_err());
    }

    #[test]
    fn page_level_verify_needs_no_target() {
        let s = TestScenario::new("v", "").with_step(
            StepAction::Verify {
                condition: VerifyCondition::PageContains {
                    expected: "Hello".into(),
                },
                target: None,
            },
            "Verify page contains Hello",
        );
        assert!(s.validate().is_ok());
    }

    #[test]
    fn record_keeps_cursor_invariant() {
        let s = scenario();
        let mut state = RunState::new(&s);
        assert_eq!(state.current_index, 0);

        state.record(StepResult::new(0).with_success("ok").finish());
        assert_eq!(state.current_index, 1);
        assert_eq!(state.steps.len() as u32, state.current_index);

        state.record(
            StepResult::new(1)
                .with_failure("missed", ErrorKind::ElementNotFound)
                .finish(),
        );
        assert_eq!(state.current_index, 2);
        assert!(state.has_failures());
        assert_eq!(state.passed_steps(), 1);
        assert_eq!(state.progress(), "2/2");
    }

    #[test]
    fn skip_remaining_marks_unexecuted_indices() {
        let s = scenario();
        let mut state = RunState::new(&s);
        state.record(StepResult::new(0).with_success("ok").finish());
        state.skip_remaining();
        assert_eq!(state.skipped, vec![1]);
    }

    #[test]
    fn finalize_moves_only_forward() {
        let s = scenario();
        let mut state = RunState::new(&s);
        assert_eq!(state.status, RunStatus::Idle);
        state.start();
        assert_eq!(state.status, RunStatus::Running);
        state.finalize(RunStatus::Aborted);
        assert_eq!(state.status, RunStatus::Aborted);
        state.finalize(RunStatus::Passed);
        assert_eq!(state.status, RunStatus::Aborted);
        assert!(state.finished_at.is_some());
    }
}
