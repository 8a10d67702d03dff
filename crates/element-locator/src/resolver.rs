//! Vision-first resolution strategy with ordered fallback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use browser_adapter::{BrowserDriver, Screenshot, TargetRef};
use perceiver_vision::{Perception, VisionPerceiver};
use tracing::{debug, info, warn};

use crate::errors::LocatorError;
use crate::strategies::SelectorFallback;
use crate::types::ResolvedTarget;

/// Tunables for the resolution strategy. The threshold is a contract
/// knob, not a constant: runs tune it per model.
#[derive(Clone, Debug)]
pub struct LocatorConfig {
    /// Minimum vision confidence to accept a perception candidate.
    pub confidence_threshold: f32,
    /// Budget for one perception call.
    pub perception_timeout: Duration,
    /// Budget for one selector query.
    pub query_timeout: Duration,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            perception_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// Resolves a description against the current page snapshot.
#[async_trait]
pub trait ElementResolver: Send + Sync {
    /// Resolve `description` against `snapshot`. Produces a fresh
    /// target every call; results must never be cached across steps.
    async fn resolve(
        &self,
        description: &str,
        snapshot: &Screenshot,
    ) -> Result<ResolvedTarget, LocatorError>;
}

/// Default strategy: perception first, thresholded; selector fallback
/// on low confidence, definite not-found, or adapter failure.
pub struct VisionFirstResolver {
    perceiver: Arc<dyn VisionPerceiver>,
    fallback: SelectorFallback,
    config: LocatorConfig,
}

impl VisionFirstResolver {
    pub fn new(
        perceiver: Arc<dyn VisionPerceiver>,
        driver: Arc<dyn BrowserDriver>,
        config: LocatorConfig,
    ) -> Self {
        let fallback = SelectorFallback::new(driver, config.query_timeout);
        Self {
            perceiver,
            fallback,
            config,
        }
    }

    /// Run the perception call. Returns the accepted target, or the
    /// adapter failure message when the call itself broke down.
    async fn try_vision(
        &self,
        description: &str,
        snapshot: &Screenshot,
    ) -> Result<Option<ResolvedTarget>, String> {
        let outcome = tokio::time::timeout(
            self.config.perception_timeout,
            self.perceiver.locate(&snapshot.bytes, description),
        )
        .await;

        match outcome {
            Ok(Ok(Perception::Located { bbox, confidence })) => {
                if confidence >= self.config.confidence_threshold {
                    debug!(description, confidence, "vision candidate accepted");
                    Ok(Some(ResolvedTarget::from_vision(
                        TargetRef::Coordinates(bbox.center()),
                        confidence,
                    )))
                } else {
                    debug!(
                        description,
                        confidence,
                        threshold = self.config.confidence_threshold,
                        "vision candidate below threshold"
                    );
                    Ok(None)
                }
            }
            Ok(Ok(Perception::NotFound)) => {
                debug!(description, "vision reports not found");
                Ok(None)
            }
            Ok(Err(e)) => {
                warn!(description, error = %e, "perception call failed");
                Err(e.to_string())
            }
            Err(_) => {
                warn!(
                    description,
                    timeout_ms = self.config.perception_timeout.as_millis() as u64,
                    "perception call timed out"
                );
                Err(format!(
                    "perception timed out after {}ms",
                    self.config.perception_timeout.as_millis()
                ))
            }
        }
    }
}

#[async_trait]
impl ElementResolver for VisionFirstResolver {
    async fn resolve(
        &self,
        description: &str,
        snapshot: &Screenshot,
    ) -> Result<ResolvedTarget, LocatorError> {
        let adapter_failure = match self.try_vision(description, snapshot).await {
            Ok(Some(resolved)) => {
                info!(description, source = %resolved.source, "resolved via vision");
                return Ok(resolved);
            }
            Ok(None) => None,
            Err(failure) => Some(failure),
        };

        match self.fallback.resolve(description).await {
            Ok(resolved) => {
                info!(description, source = %resolved.source, "resolved via selector fallback");
                Ok(resolved)
            }
            // A broken adapter plus a silent fallback is an adapter
            // problem, not proof of absence.
            Err(LocatorError::NotFound(_)) if adapter_failure.is_some() => Err(
                LocatorError::Adapter(adapter_failure.expect("checked is_some")),
            ),
            Err(e) => Err(e),
        }
    }
}
