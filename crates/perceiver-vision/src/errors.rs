//! Perception adapter error types.

use thiserror::Error;

/// Errors raised by a vision perceiver.
#[derive(Debug, Error)]
pub enum PerceiverError {
    /// Transport-level failure reaching the model endpoint.
    #[error("Vision request failed: {0}")]
    Http(String),

    /// The model did not answer within the configured timeout.
    #[error("Vision request timed out after {0}ms")]
    Timeout(u64),

    /// The endpoint answered with a non-success status.
    #[error("Vision API error (status {status}): {body}")]
    Api { status: u16, body: String },

    /// The model reply could not be parsed into a localization answer.
    #[error("Malformed vision reply: {0}")]
    MalformedReply(String),
}

impl From<reqwest::Error> for PerceiverError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured value here; callers
            // that need the exact budget report it themselves.
            PerceiverError::Timeout(0)
        } else {
            PerceiverError::Http(err.to_string())
        }
    }
}
