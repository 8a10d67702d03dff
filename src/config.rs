//! Engine configuration.
//!
//! One JSON file covers the whole engine; every field has a default so
//! a partial file (or none at all) is valid. CLI flags override the
//! file, the file overrides the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use element_locator::LocatorConfig;
use perceiver_vision::VisionClientConfig;
use scenario_flow::{RetryPolicy, RunConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Vision backend settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// When off, resolution relies on the selector fallback only.
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        let defaults = VisionClientConfig::default();
        Self {
            enabled: false,
            endpoint: defaults.endpoint,
            model: defaults.model,
            api_key: None,
            request_timeout_secs: defaults.request_timeout.as_secs(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum vision confidence to act on a perception candidate.
    pub confidence_threshold: f32,
    /// Total attempts per step, retries included.
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub backoff_ceiling_ms: u64,
    pub abort_on_failure: bool,
    /// Run the browser without a visible window. The scripted dry-run
    /// driver has no window either way; a real driver consumes this at
    /// construction.
    pub headless: bool,
    /// Wall-clock budget for the whole scenario.
    pub scenario_timeout_secs: Option<u64>,
    /// Budget for one browser call.
    pub call_timeout_secs: u64,
    /// Where screenshots and reports land.
    pub artifacts_dir: PathBuf,
    pub vision: VisionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        let locator = LocatorConfig::default();
        Self {
            confidence_threshold: locator.confidence_threshold,
            max_attempts: retry.max_attempts,
            backoff_ms: retry.backoff_unit.as_millis() as u64,
            backoff_ceiling_ms: retry.backoff_ceiling.as_millis() as u64,
            abort_on_failure: true,
            headless: true,
            scenario_timeout_secs: None,
            call_timeout_secs: 10,
            artifacts_dir: PathBuf::from("visor-artifacts"),
            vision: VisionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_unit: Duration::from_millis(self.backoff_ms),
            backoff_ceiling: Duration::from_millis(self.backoff_ceiling_ms),
        }
    }

    pub fn locator_config(&self) -> LocatorConfig {
        LocatorConfig {
            confidence_threshold: self.confidence_threshold,
            ..LocatorConfig::default()
        }
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            retry: self.retry_policy(),
            abort_on_failure: self.abort_on_failure,
            scenario_timeout: self.scenario_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn vision_client_config(&self) -> VisionClientConfig {
        let mut config = VisionClientConfig::new(self.vision.endpoint.clone())
            .model(self.vision.model.clone())
            .request_timeout(Duration::from_secs(self.vision.request_timeout_secs));
        if let Some(key) = &self.vision.api_key {
            config = config.api_key(key.clone());
        }
        config
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
