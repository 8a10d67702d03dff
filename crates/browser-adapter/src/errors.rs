//! Browser error types with the transient/fatal split.

use thiserror::Error;
use visor_core_types::ErrorKind;

/// Errors raised by a browser driver.
#[derive(Debug, Error, Clone)]
pub enum BrowserError {
    /// Navigation failed (DNS, connection refused, bad URL).
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// An operation exceeded its timeout.
    #[error("Browser operation timed out: {0}")]
    Timeout(String),

    /// The target frame or element detached mid-operation.
    #[error("Target detached: {0}")]
    TargetDetached(String),

    /// A selector query was malformed or unsupported.
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Screenshot capture or write failed.
    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    /// The session is gone; no further call can succeed.
    #[error("Browser session lost: {0}")]
    SessionLost(String),

    /// The browser could not be started at all.
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),
}

impl BrowserError {
    /// Whether the failure is worth retrying on a live session.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrowserError::NavigationFailed(_)
                | BrowserError::Timeout(_)
                | BrowserError::TargetDetached(_)
                | BrowserError::ScreenshotFailed(_)
        )
    }

    /// Whether the session itself is unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BrowserError::SessionLost(_) | BrowserError::LaunchFailed(_)
        )
    }

    /// Classification for the engine-wide taxonomy.
    pub fn kind(&self) -> ErrorKind {
        if self.is_fatal() {
            ErrorKind::FatalBrowser
        } else {
            ErrorKind::TransientBrowser
        }
    }
}
