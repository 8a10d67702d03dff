//! Vision-first browser test execution engine.
//!
//! Scenarios are plain-text step lists; targets are natural-language
//! descriptions resolved against live screenshots by a vision model,
//! with a deterministic selector fallback. The library surface here is
//! the glue the `visor` binary is built from: configuration, the
//! scenario parser, engine assembly and run reporting.

pub mod config;
pub mod engine;
pub mod parser;
pub mod report;

pub use config::{ConfigError, EngineConfig, VisionConfig};
pub use engine::{build_dry_run_driver, build_orchestrator, EngineError, PageFixture};
pub use parser::{parse_scenario, ParseError, RuleBasedParser, ScenarioParser};
pub use report::{ReportError, RunReport};
