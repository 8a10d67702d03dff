//! Engine assembly.
//!
//! Wires a driver, a perceiver and the locator strategy into a run
//! orchestrator. Without a vision backend configured, an offline
//! perceiver answers "not found" for everything and resolution relies
//! on the selector fallback alone.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use browser_adapter::{BrowserDriver, FakeElement, FakePage};
use element_locator::VisionFirstResolver;
use perceiver_vision::{HttpVisionPerceiver, Perception, PerceiverError, VisionPerceiver};
use scenario_flow::{DefaultStepExecutor, RunOrchestrator};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use visor_core_types::BoundingBox;

use crate::config::EngineConfig;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not read page fixture {path}: {source}")]
    FixtureIo {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse page fixture {path}: {source}")]
    FixtureParse {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },
    #[error("could not create artifacts dir {path}: {source}")]
    Artifacts {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Perceiver(#[from] PerceiverError),
}

/// Perceiver used when no vision backend is configured.
struct OfflinePerceiver;

#[async_trait]
impl VisionPerceiver for OfflinePerceiver {
    async fn locate(
        &self,
        _screenshot: &[u8],
        _description: &str,
    ) -> Result<Perception, PerceiverError> {
        Ok(Perception::NotFound)
    }
}

/// One element of a scripted page fixture.
#[derive(Debug, Deserialize)]
struct FixtureElement {
    handle: String,
    #[serde(default)]
    text: String,
    placeholder: Option<String>,
    label: Option<String>,
    role: Option<String>,
    /// `[x, y, width, height]`
    bbox: Option<[f64; 4]>,
}

/// A scripted page for dry runs: title, page text and elements.
#[derive(Debug, Deserialize)]
pub struct PageFixture {
    #[serde(default)]
    title: String,
    #[serde(default)]
    page_text: String,
    #[serde(default)]
    elements: Vec<FixtureElement>,
}

impl PageFixture {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path).map_err(|source| EngineError::FixtureIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| EngineError::FixtureParse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn seed(&self, page: &FakePage) {
        page.set_title(self.title.clone());
        page.set_page_text(self.page_text.clone());
        for element in &self.elements {
            let mut fake = FakeElement::new(element.handle.clone(), element.text.clone());
            if let Some(placeholder) = &element.placeholder {
                fake = fake.with_placeholder(placeholder.clone());
            }
            if let Some(label) = &element.label {
                fake = fake.with_label(label.clone());
            }
            if let Some(role) = &element.role {
                fake = fake.with_role(role.clone());
            }
            if let Some([x, y, w, h]) = element.bbox {
                fake = fake.at(BoundingBox::new(x, y, w, h));
            }
            page.add_element(fake);
        }
    }
}

/// Build a dry-run driver: an in-memory page seeded from an optional
/// fixture, writing screenshots into the artifacts directory.
pub fn build_dry_run_driver(
    config: &EngineConfig,
    fixture: Option<&PageFixture>,
) -> Result<Arc<FakePage>, EngineError> {
    std::fs::create_dir_all(&config.artifacts_dir).map_err(|source| EngineError::Artifacts {
        path: config.artifacts_dir.clone(),
        source,
    })?;
    info!(headless = config.headless, "starting scripted page driver");
    let page = Arc::new(FakePage::new(&config.artifacts_dir));
    if let Some(fixture) = fixture {
        fixture.seed(&page);
    }
    Ok(page)
}

/// Assemble the orchestrator around a driver.
pub fn build_orchestrator(
    config: &EngineConfig,
    driver: Arc<dyn BrowserDriver>,
) -> Result<RunOrchestrator, EngineError> {
    let perceiver: Arc<dyn VisionPerceiver> = if config.vision.enabled {
        info!(
            endpoint = %config.vision.endpoint,
            model = %config.vision.model,
            "vision backend enabled"
        );
        Arc::new(HttpVisionPerceiver::new(config.vision_client_config())?)
    } else {
        info!("no vision backend configured, selector fallback only");
        Arc::new(OfflinePerceiver)
    };

    let resolver = Arc::new(VisionFirstResolver::new(
        perceiver,
        driver.clone(),
        config.locator_config(),
    ));
    let executor = Arc::new(DefaultStepExecutor::new(
        driver.clone(),
        resolver,
        config.call_timeout(),
    ));
    Ok(RunOrchestrator::new(executor, driver, config.run_config()))
}
