//! The browser capability contract.

use async_trait::async_trait;

use crate::errors::BrowserError;
use crate::types::{ElementHandle, ReadScope, Screenshot, ScrollMotion, SelectorQuery, TargetRef};

/// Opaque browser primitives the engine executes steps against.
///
/// Every call may take long-latency network round trips; callers wrap
/// each one in a timeout and treat a timeout as a transient failure.
/// The driver is the sole source of ground-truth page state.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate to a URL and return the resulting page title.
    async fn navigate(&self, url: &str) -> Result<String, BrowserError>;

    /// Click a resolved target (coordinates or held handle).
    async fn click(&self, target: &TargetRef) -> Result<(), BrowserError>;

    /// Focus a resolved target and type `value` into it.
    async fn fill(&self, target: &TargetRef, value: &str) -> Result<(), BrowserError>;

    /// Scroll a target into view or scroll the page in a direction.
    async fn scroll(&self, motion: &ScrollMotion) -> Result<(), BrowserError>;

    /// Read the visible text of one element or of the whole page.
    async fn read_text(&self, scope: &ReadScope) -> Result<String, BrowserError>;

    /// Return handles of all *visible* elements matching a query.
    async fn query_selector(
        &self,
        query: &SelectorQuery,
    ) -> Result<Vec<ElementHandle>, BrowserError>;

    /// Capture the current viewport; writes the trace artifact and
    /// returns it together with the raw bytes.
    async fn screenshot(&self) -> Result<Screenshot, BrowserError>;

    /// Tear the session down. Idempotent; called on every exit path.
    async fn close(&self) -> Result<(), BrowserError>;
}
