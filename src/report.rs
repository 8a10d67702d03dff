//! Run reporting.
//!
//! The JSON report is the machine-readable record of one run; the
//! summary is the human-readable one printed to the console.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use scenario_flow::{RunState, RunStatus, StepResult};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("could not write report {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// JSON report for one run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub scenario_id: String,
    pub session_id: String,
    pub name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub total_steps: u32,
    pub executed: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: Vec<u32>,
    pub error: Option<String>,
    pub steps: Vec<StepResult>,
}

impl RunReport {
    pub fn from_state(state: &RunState) -> Self {
        let executed = state.steps.len() as u32;
        let passed = state.passed_steps() as u32;
        Self {
            scenario_id: state.scenario_id.to_string(),
            session_id: state.session_id.to_string(),
            name: state.name.clone(),
            status: state.status,
            started_at: state.started_at,
            finished_at: state.finished_at,
            duration_ms: state
                .finished_at
                .map(|end| (end - state.started_at).num_milliseconds().max(0) as u64),
            total_steps: state.total_steps,
            executed,
            passed,
            failed: executed - passed,
            skipped: state.skipped.clone(),
            error: state.error.clone(),
            steps: state.steps.clone(),
        }
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "report written");
        Ok(())
    }

    /// Console summary, one line per step plus a verdict line.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("scenario: {}\n", self.name));
        for step in &self.steps {
            let mark = if step.success { "PASS" } else { "FAIL" };
            out.push_str(&format!(
                "  [{}] step {} ({} attempt{}): {}\n",
                mark,
                step.step_index,
                step.attempts,
                if step.attempts == 1 { "" } else { "s" },
                step.message
            ));
        }
        for index in &self.skipped {
            out.push_str(&format!("  [SKIP] step {}\n", index));
        }
        out.push_str(&format!(
            "result: {} ({} passed, {} failed, {} skipped of {})",
            self.status,
            self.passed,
            self.failed,
            self.skipped.len(),
            self.total_steps
        ));
        if let Some(error) = &self.error {
            out.push_str(&format!("\nerror: {}", error));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenario_flow::{StepAction, TestScenario};
    use visor_core_types::ErrorKind;

    fn state() -> RunState {
        let scenario = TestScenario::new("login", "")
            .with_step(
                StepAction::Visit {
                    url: "http://x".into(),
                },
                "Visit http://x",
            )
            .with_step(
                StepAction::Click {
                    target: "Login".into(),
                },
                "Click on Login",
            )
            .with_step(
                StepAction::Click {
                    target: "Logout".into(),
                },
                "Click on Logout",
            );
        let mut state = RunState::new(&scenario);
        state.record(StepResult::new(0).with_success("navigated").finish());
        state.record(
            StepResult::new(1)
                .with_failure("not found", ErrorKind::ElementNotFound)
                .with_attempts(3)
                .finish(),
        );
        state.skip_remaining();
        state.error = Some("step 1 failed permanently".into());
        state.finalize(scenario_flow::RunStatus::Aborted);
        state
    }

    #[test]
    fn report_counts_match_the_state() {
        let report = RunReport::from_state(&state());
        assert_eq!(report.total_steps, 3);
        assert_eq!(report.executed, 2);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, vec![2]);
        assert!(report.duration_ms.is_some());
    }

    #[test]
    fn json_report_round_trips_through_serde() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = RunReport::from_state(&state());
        report.write_json(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["status"], "aborted");
        assert_eq!(value["steps"].as_array().unwrap().len(), 2);
        assert_eq!(value["skipped"][0], 2);
    }

    #[test]
    fn summary_names_every_step_outcome() {
        let summary = RunReport::from_state(&state()).render_summary();
        assert!(summary.contains("[PASS] step 0"));
        assert!(summary.contains("[FAIL] step 1 (3 attempts)"));
        assert!(summary.contains("[SKIP] step 2"));
        assert!(summary.contains("result: aborted"));
    }
}
