//! Vision-model perception adapter.
//!
//! Given a screenshot and a natural-language description, a perceiver
//! answers with the target's bounding box and a confidence signal, or a
//! definite "not found". The HTTP implementation speaks the
//! OpenAI-compatible chat-completions dialect with a base64 image part
//! and tolerates the usual model-output noise around the JSON answer.

pub mod client;
pub mod errors;
pub mod parse;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use visor_core_types::BoundingBox;

pub use client::{HttpVisionPerceiver, VisionClientConfig};
pub use errors::PerceiverError;

/// Outcome of one perception call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Perception {
    /// The model located the described element.
    Located {
        bbox: BoundingBox,
        /// Model-reported confidence in [0,1].
        confidence: f32,
    },
    /// The model is certain the element is not on screen.
    NotFound,
}

/// Vision-capable model behind a narrow localization contract.
#[async_trait]
pub trait VisionPerceiver: Send + Sync {
    /// Locate the element described by `description` in `screenshot`.
    async fn locate(
        &self,
        screenshot: &[u8],
        description: &str,
    ) -> Result<Perception, PerceiverError>;
}
