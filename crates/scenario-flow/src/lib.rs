//! Scenario execution core.
//!
//! A parsed scenario is an ordered list of steps; each step is executed
//! against the live browser session through the element resolution
//! strategy, wrapped in a bounded retry loop, and recorded into a
//! write-once run state that feeds reporting. Steps are strictly
//! sequential: every step's precondition is the page state the previous
//! step left behind.

pub mod errors;
pub mod executor;
pub mod orchestrator;
pub mod policy;
pub mod types;

pub use errors::FlowError;
pub use executor::{AttemptOutcome, DefaultStepExecutor, StepExecutor};
pub use orchestrator::{RunConfig, RunOrchestrator};
pub use policy::RetryPolicy;
pub use types::{
    RunState, RunStatus, ScrollTarget, StepAction, StepResult, TestScenario, TestStep,
    VerifyCondition,
};
