//! Target, selector and snapshot types shared with the locator layer.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use visor_core_types::Point;

/// Opaque handle to a DOM element held by the driver.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an interaction should land: a screen coordinate (vision) or a
/// held element handle (selector match).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TargetRef {
    Coordinates(Point),
    Handle(ElementHandle),
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRef::Coordinates(p) => write!(f, "coords{}", p),
            TargetRef::Handle(h) => write!(f, "handle:{}", h),
        }
    }
}

/// Deterministic DOM query derived from a natural-language description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorQuery {
    /// Visible text content match.
    Text(String),
    /// Input placeholder match.
    Placeholder(String),
    /// Associated label text match.
    Label(String),
    /// ARIA role with accessible name.
    Role { role: String, name: String },
}

impl SelectorQuery {
    pub fn kind(&self) -> &'static str {
        match self {
            SelectorQuery::Text(_) => "text",
            SelectorQuery::Placeholder(_) => "placeholder",
            SelectorQuery::Label(_) => "label",
            SelectorQuery::Role { .. } => "role",
        }
    }
}

impl fmt::Display for SelectorQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorQuery::Text(t) => write!(f, "text={}", t),
            SelectorQuery::Placeholder(t) => write!(f, "placeholder={}", t),
            SelectorQuery::Label(t) => write!(f, "label={}", t),
            SelectorQuery::Role { role, name } => write!(f, "role={}[name={}]", role, name),
        }
    }
}

/// Scroll direction for directional scrolls.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Top,
    Bottom,
}

/// What a scroll primitive should do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScrollMotion {
    /// Bring a resolved target into the viewport.
    IntoView(TargetRef),
    /// Scroll the page in a direction.
    Direction(ScrollDirection),
}

/// Scope for a text read: one element or the whole page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ReadScope {
    Target(TargetRef),
    Page,
}

/// A captured screenshot: the written trace artifact plus the raw bytes
/// handed to the perception layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Screenshot {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}
