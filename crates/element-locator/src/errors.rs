//! Resolution error types.

use browser_adapter::BrowserError;
use thiserror::Error;
use visor_core_types::ErrorKind;

/// Errors raised while resolving a description to a target.
#[derive(Debug, Error)]
pub enum LocatorError {
    /// Neither vision nor any derived selector located the element.
    #[error("Element not found: {0}")]
    NotFound(String),

    /// Selector fallback matched more than one visible element.
    #[error("Ambiguous match for '{description}': {count} candidates")]
    Ambiguous { description: String, count: usize },

    /// The perception adapter failed and the fallback produced no
    /// deterministic signal either.
    #[error("Perception adapter failed: {0}")]
    Adapter(String),

    /// The selector query itself failed at the browser layer.
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl LocatorError {
    /// Classification for the engine-wide taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LocatorError::NotFound(_) => ErrorKind::ElementNotFound,
            LocatorError::Ambiguous { .. } => ErrorKind::Ambiguous,
            LocatorError::Adapter(_) => ErrorKind::Adapter,
            LocatorError::Browser(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_mapping() {
        assert_eq!(
            LocatorError::NotFound("x".into()).kind(),
            ErrorKind::ElementNotFound
        );
        assert_eq!(
            LocatorError::Ambiguous {
                description: "x".into(),
                count: 2
            }
            .kind(),
            ErrorKind::Ambiguous
        );
        assert_eq!(
            LocatorError::Adapter("down".into()).kind(),
            ErrorKind::Adapter
        );
        assert_eq!(
            LocatorError::Browser(BrowserError::SessionLost("gone".into())).kind(),
            ErrorKind::FatalBrowser
        );
    }
}
