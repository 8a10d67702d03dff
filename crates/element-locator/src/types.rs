//! Resolution result types.

use std::fmt;

use browser_adapter::TargetRef;
use serde::{Deserialize, Serialize};

/// Which resolver produced a target.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSource {
    Vision,
    Selector,
}

impl fmt::Display for TargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSource::Vision => write!(f, "vision"),
            TargetSource::Selector => write!(f, "selector"),
        }
    }
}

/// A freshly resolved target. Never cached across steps: the page the
/// resolution was made against may no longer exist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub target: TargetRef,
    /// Meaningful for vision-sourced targets; selector matches are
    /// deterministic and carry 1.0.
    pub confidence: f32,
    pub source: TargetSource,
}

impl ResolvedTarget {
    pub fn from_vision(target: TargetRef, confidence: f32) -> Self {
        Self {
            target,
            confidence,
            source: TargetSource::Vision,
        }
    }

    pub fn from_selector(target: TargetRef) -> Self {
        Self {
            target,
            confidence: 1.0,
            source: TargetSource::Selector,
        }
    }
}
