//! Shared primitives for the visor test execution engine.
//!
//! Identifiers, screen geometry and the engine-wide error taxonomy live
//! here so that the adapter, locator and flow crates agree on one
//! vocabulary without depending on each other.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for one parsed scenario.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ScenarioId(pub String);

impl ScenarioId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ScenarioId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for one live browser session.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point in CSS pixel space, origin at the viewport top-left.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.0},{:.0})", self.x, self.y)
    }
}

/// Axis-aligned bounding box in CSS pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Centre point, the click target for coordinate-based interaction.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Engine-wide failure classification.
///
/// Every failed step attempt is tagged with exactly one kind; the retry
/// policy and the abort policy both key off this classification.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Neither vision nor selector fallback located the target.
    ElementNotFound,
    /// Selector fallback matched more than one visible element.
    Ambiguous,
    /// A verify step's condition evaluated to false.
    AssertionFailed,
    /// Recoverable browser failure (navigation timeout, detached frame).
    TransientBrowser,
    /// Browser session is gone; nothing further can succeed.
    FatalBrowser,
    /// Vision model call failed or returned malformed output.
    Adapter,
}

impl ErrorKind {
    /// Whether the retry policy may re-attempt a failure of this kind.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::ElementNotFound | ErrorKind::TransientBrowser | ErrorKind::Adapter
        )
    }

    /// Whether this kind forces scenario abort regardless of the abort flag.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::FatalBrowser)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ElementNotFound => "element_not_found",
            ErrorKind::Ambiguous => "ambiguous",
            ErrorKind::AssertionFailed => "assertion_failed",
            ErrorKind::TransientBrowser => "transient_browser",
            ErrorKind::FatalBrowser => "fatal_browser",
            ErrorKind::Adapter => "adapter",
        };
        write!(f, "{}", name)
    }
}
