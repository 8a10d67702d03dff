//! Element resolution: vision first, deterministic selector fallback.
//!
//! Both resolvers answer the question "where is the element this
//! description names?" with different trade-offs. The perception call
//! is robust to DOM volatility but probabilistic and slow; the selector
//! fallback is cheap and deterministic but needs recognizable text,
//! placeholder, label or role signals. The strategy composes them in
//! that order behind a confidence threshold.

pub mod errors;
pub mod resolver;
pub mod strategies;
pub mod types;

pub use errors::LocatorError;
pub use resolver::{ElementResolver, LocatorConfig, VisionFirstResolver};
pub use strategies::{derive_queries, SelectorFallback};
pub use types::{ResolvedTarget, TargetSource};
