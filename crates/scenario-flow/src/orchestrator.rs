//! Run orchestration: the retry loop, the abort policy and the run
//! state machine.
//!
//! One orchestrator owns one run. Steps execute strictly in order; a
//! step reaches a terminal outcome (success, or failure after the retry
//! budget) before the next one starts. Cancellation and the scenario
//! deadline race the whole run and abort it with a partial report. The
//! browser session is closed on every exit path.

use std::sync::Arc;
use std::time::Duration;

use browser_adapter::BrowserDriver;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use visor_core_types::ErrorKind;

use crate::errors::FlowError;
use crate::executor::StepExecutor;
use crate::policy::RetryPolicy;
use crate::types::{RunState, RunStatus, StepResult, TestScenario, TestStep};

/// Per-run configuration.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub retry: RetryPolicy,
    /// Abort the scenario on the first permanent step failure. When
    /// off, the run continues past failures and finishes `Failed`.
    pub abort_on_failure: bool,
    /// Wall-clock budget for the whole run.
    pub scenario_timeout: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            abort_on_failure: true,
            scenario_timeout: None,
        }
    }
}

/// How the step loop ended, before cancellation and deadline are
/// folded in.
enum DriveOutcome {
    /// Every step reached a terminal outcome.
    Completed,
    /// A permanent failure stopped the run under the abort policy.
    Aborted { reason: String },
    /// The browser session is gone; nothing further can run.
    Fatal { reason: String },
}

/// Executes one scenario end to end.
pub struct RunOrchestrator {
    executor: Arc<dyn StepExecutor>,
    driver: Arc<dyn BrowserDriver>,
    config: RunConfig,
    cancel: CancellationToken,
}

impl RunOrchestrator {
    pub fn new(
        executor: Arc<dyn StepExecutor>,
        driver: Arc<dyn BrowserDriver>,
        config: RunConfig,
    ) -> Self {
        Self {
            executor,
            driver,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts this run when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the scenario to a terminal status. The driver is closed
    /// before this returns, on every path.
    pub async fn run(&self, scenario: &TestScenario) -> Result<RunState, FlowError> {
        if let Err(reason) = scenario.validate() {
            self.close_driver().await;
            return Err(FlowError::Validation(reason));
        }

        let mut state = RunState::new(scenario);
        state.start();
        info!(
            scenario = %scenario.id,
            name = %scenario.name,
            steps = state.total_steps,
            "run started"
        );

        enum Verdict {
            Drive(DriveOutcome),
            Cancelled,
            TimedOut,
        }

        let deadline = self.config.scenario_timeout;
        let verdict = {
            let drive = self.drive(scenario, &mut state);
            tokio::pin!(drive);
            let expire = async {
                match deadline {
                    Some(budget) => tokio::time::sleep(budget).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Verdict::Cancelled,
                _ = expire => Verdict::TimedOut,
                outcome = &mut drive => Verdict::Drive(outcome),
            }
        };

        match verdict {
            Verdict::Drive(DriveOutcome::Completed) => {
                let status = if state.has_failures() {
                    RunStatus::Failed
                } else {
                    RunStatus::Passed
                };
                state.finalize(status);
            }
            Verdict::Drive(DriveOutcome::Aborted { reason }) => {
                warn!(reason, "run aborted");
                state.skip_remaining();
                state.error = Some(reason);
                state.finalize(RunStatus::Aborted);
            }
            Verdict::Drive(DriveOutcome::Fatal { reason }) => {
                error!(reason, "browser session lost");
                state.skip_remaining();
                state.error = Some(reason);
                state.finalize(RunStatus::Failed);
            }
            Verdict::Cancelled => {
                warn!("run cancelled");
                state.skip_remaining();
                state.error = Some("run cancelled".to_string());
                state.finalize(RunStatus::Aborted);
            }
            Verdict::TimedOut => {
                let budget = deadline.unwrap_or_default();
                warn!(budget_ms = budget.as_millis() as u64, "scenario deadline exceeded");
                state.skip_remaining();
                state.error = Some(format!(
                    "scenario exceeded its {}ms budget",
                    budget.as_millis()
                ));
                state.finalize(RunStatus::Aborted);
            }
        }

        self.close_driver().await;
        info!(
            status = %state.status,
            progress = %state.progress(),
            "run finished"
        );
        Ok(state)
    }

    /// The sequential step loop. Records a terminal result for every
    /// step it finishes; leaves the remainder untouched for the caller
    /// to mark skipped.
    async fn drive(&self, scenario: &TestScenario, state: &mut RunState) -> DriveOutcome {
        for step in &scenario.steps {
            let (result, kind) = self.run_step(step).await;
            let failed = !result.success;
            state.record(result);

            if let Some(kind) = kind {
                if kind.is_fatal() {
                    return DriveOutcome::Fatal {
                        reason: format!("step {} lost the browser session", step.index),
                    };
                }
            }
            if failed && self.config.abort_on_failure {
                return DriveOutcome::Aborted {
                    reason: format!("step {} failed permanently", step.index),
                };
            }
        }
        DriveOutcome::Completed
    }

    /// One step through the retry loop, to a terminal result.
    async fn run_step(&self, step: &TestStep) -> (StepResult, Option<ErrorKind>) {
        let result = StepResult::new(step.index);
        let mut attempt = 1u32;

        loop {
            info!(
                step = step.index,
                kind = step.action.kind(),
                attempt,
                "executing step"
            );
            let outcome = self.executor.execute(step).await;

            if outcome.success {
                let result = result
                    .with_success(outcome.message)
                    .with_screenshot(outcome.screenshot_path)
                    .with_attempts(attempt)
                    .with_source(outcome.resolution_source)
                    .finish();
                return (result, None);
            }

            // An outcome with no classification is treated as transient
            // so the retry budget still bounds it.
            let kind = outcome.error.unwrap_or(ErrorKind::TransientBrowser);
            if self.config.retry.should_retry(attempt, kind) {
                let delay = self.config.retry.backoff_delay(attempt);
                warn!(
                    step = step.index,
                    attempt,
                    error = %kind,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            warn!(step = step.index, attempt, error = %kind, "step failed permanently");
            let result = result
                .with_failure(outcome.message, kind)
                .with_screenshot(outcome.screenshot_path)
                .with_attempts(attempt)
                .with_source(outcome.resolution_source)
                .finish();
            return (result, Some(kind));
        }
    }

    async fn close_driver(&self) {
        if let Err(e) = self.driver.close().await {
            warn!(error = %e, "driver close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::AttemptOutcome;
    use crate::types::StepAction;
    use async_trait::async_trait;
    use browser_adapter::FakePage;
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};

    /// Executor scripted per step index. The last queued outcome for an
    /// index repeats once the queue ahead of it is drained.
    struct ScriptedExecutor {
        outcomes: Mutex<HashMap<u32, VecDeque<AttemptOutcome>>>,
    }

    impl ScriptedExecutor {
        fn new() -> Self {
            Self {
                outcomes: Mutex::new(HashMap::new()),
            }
        }

        fn push(self, index: u32, outcome: AttemptOutcome) -> Self {
            self.outcomes
                .lock()
                .entry(index)
                .or_default()
                .push_back(outcome);
            self
        }

        fn passes(self, index: u32) -> Self {
            self.push(
                index,
                AttemptOutcome {
                    success: true,
                    message: "ok".into(),
                    error: None,
                    screenshot_path: None,
                    resolution_source: None,
                },
            )
        }

        fn fails(self, index: u32, kind: ErrorKind) -> Self {
            self.push(
                index,
                AttemptOutcome {
                    success: false,
                    message: format!("scripted {}", kind),
                    error: Some(kind),
                    screenshot_path: None,
                    resolution_source: None,
                },
            )
        }
    }

    #[async_trait]
    impl StepExecutor for ScriptedExecutor {
        async fn execute(&self, step: &TestStep) -> AttemptOutcome {
            let mut outcomes = self.outcomes.lock();
            let queue = outcomes
                .get_mut(&step.index)
                .unwrap_or_else(|| panic!("no script for step {}", step.index));
            if queue.len() > 1 {
                queue.pop_front().expect("len checked")
            } else {
                queue.front().expect("scripts are never empty").clone()
            }
        }
    }

    /// Executor that never finishes; used to test cancellation and the
    /// scenario deadline.
    struct StalledExecutor;

    #[async_trait]
    impl StepExecutor for StalledExecutor {
        async fn execute(&self, _step: &TestStep) -> AttemptOutcome {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("stalled executor never completes")
        }
    }

    fn scenario(step_count: u32) -> TestScenario {
        let mut s = TestScenario::new("fixture", "orchestrator fixture");
        for i in 0..step_count {
            s = s.with_step(
                StepAction::Visit {
                    url: format!("http://localhost:8000/{}", i),
                },
                format!("Visit page {}", i),
            );
        }
        s
    }

    fn orchestrator(
        executor: impl StepExecutor + 'static,
        config: RunConfig,
    ) -> (RunOrchestrator, Arc<FakePage>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::new(dir.path()));
        let orch = RunOrchestrator::new(Arc::new(executor), page.clone(), config);
        (orch, page, dir)
    }

    #[tokio::test]
    async fn all_steps_passing_yields_passed() {
        let exec = ScriptedExecutor::new().passes(0).passes(1).passes(2);
        let (orch, page, _dir) = orchestrator(exec, RunConfig::default());

        let state = orch.run(&scenario(3)).await.unwrap();
        assert_eq!(state.status, RunStatus::Passed);
        assert_eq!(state.steps.len(), 3);
        assert_eq!(state.current_index, 3);
        assert!(state.skipped.is_empty());
        assert!(page.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_failure_exhausts_budget_then_aborts() {
        let exec = ScriptedExecutor::new()
            .passes(0)
            .fails(1, ErrorKind::TransientBrowser);
        let (orch, page, _dir) = orchestrator(exec, RunConfig::default());

        let state = orch.run(&scenario(3)).await.unwrap();
        assert_eq!(state.status, RunStatus::Aborted);
        assert_eq!(state.steps.len(), 2);
        assert_eq!(state.steps[1].attempts, 3);
        assert_eq!(state.steps[1].error, Some(ErrorKind::TransientBrowser));
        assert_eq!(state.skipped, vec![2]);
        assert!(state.error.is_some());
        assert!(page.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_recover_within_budget() {
        let exec = ScriptedExecutor::new()
            .fails(0, ErrorKind::TransientBrowser)
            .fails(0, ErrorKind::ElementNotFound)
            .passes(0);
        let (orch, _page, _dir) = orchestrator(exec, RunConfig::default());

        let state = orch.run(&scenario(1)).await.unwrap();
        assert_eq!(state.status, RunStatus::Passed);
        assert_eq!(state.steps[0].attempts, 3);
        assert!(state.steps[0].success);
    }

    #[tokio::test]
    async fn assertion_failure_is_not_retried() {
        let exec = ScriptedExecutor::new()
            .passes(0)
            .fails(1, ErrorKind::AssertionFailed);
        let (orch, _page, _dir) = orchestrator(exec, RunConfig::default());

        let state = orch.run(&scenario(4)).await.unwrap();
        assert_eq!(state.status, RunStatus::Aborted);
        assert_eq!(state.steps.len(), 2);
        assert_eq!(state.steps[1].attempts, 1);
        assert_eq!(state.skipped, vec![2, 3]);
    }

    #[tokio::test]
    async fn continue_mode_runs_past_failures() {
        let exec = ScriptedExecutor::new()
            .passes(0)
            .fails(1, ErrorKind::AssertionFailed)
            .passes(2);
        let config = RunConfig {
            abort_on_failure: false,
            ..RunConfig::default()
        };
        let (orch, _page, _dir) = orchestrator(exec, config);

        let state = orch.run(&scenario(3)).await.unwrap();
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.steps.len(), 3);
        assert!(state.skipped.is_empty());
        assert_eq!(state.passed_steps(), 2);
    }

    #[tokio::test]
    async fn fatal_failure_fails_the_run_immediately() {
        let exec = ScriptedExecutor::new()
            .passes(0)
            .fails(1, ErrorKind::FatalBrowser);
        let config = RunConfig {
            abort_on_failure: false,
            ..RunConfig::default()
        };
        let (orch, page, _dir) = orchestrator(exec, config);

        let state = orch.run(&scenario(4)).await.unwrap();
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.steps.len(), 2);
        assert_eq!(state.steps[1].attempts, 1);
        assert_eq!(state.skipped, vec![2, 3]);
        assert!(page.is_closed());
    }

    #[tokio::test]
    async fn invalid_scenario_still_closes_the_driver() {
        let (orch, page, _dir) = orchestrator(ScriptedExecutor::new(), RunConfig::default());

        let err = orch
            .run(&TestScenario::new("empty", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
        assert!(page.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_with_partial_report() {
        let (orch, page, _dir) = orchestrator(StalledExecutor, RunConfig::default());
        let orch = Arc::new(orch);
        let token = orch.cancel_token();

        let handle = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.run(&scenario(2)).await })
        };
        tokio::task::yield_now().await;
        token.cancel();

        let state = handle.await.unwrap().unwrap();
        assert_eq!(state.status, RunStatus::Aborted);
        assert!(state.steps.is_empty());
        assert_eq!(state.skipped, vec![0, 1]);
        assert_eq!(state.error.as_deref(), Some("run cancelled"));
        assert!(page.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_deadline_aborts_the_run() {
        let config = RunConfig {
            scenario_timeout: Some(Duration::from_secs(10)),
            ..RunConfig::default()
        };
        let (orch, page, _dir) = orchestrator(StalledExecutor, config);

        let state = orch.run(&scenario(2)).await.unwrap();
        assert_eq!(state.status, RunStatus::Aborted);
        assert!(state.steps.is_empty());
        assert_eq!(state.skipped, vec![0, 1]);
        assert!(state.error.unwrap().contains("budget"));
        assert!(page.is_closed());
    }
}
