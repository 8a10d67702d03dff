//! Browser automation capability surface.
//!
//! The engine treats the browser as an opaque set of primitives:
//! navigate, click, fill, scroll, read text, query selectors and take
//! screenshots. This crate defines that contract (`BrowserDriver`)
//! together with the target/selector vocabulary and the transient vs
//! fatal error split the retry policy depends on. A scripted in-memory
//! driver (`FakePage`) backs the workspace's tests and the CLI dry-run
//! mode; real CDP or WebDriver drivers implement the same trait.

pub mod driver;
pub mod errors;
pub mod fake;
pub mod types;

pub use driver::BrowserDriver;
pub use errors::BrowserError;
pub use fake::{FakeElement, FakePage};
pub use types::{
    ElementHandle, ReadScope, Screenshot, ScrollDirection, ScrollMotion, SelectorQuery, TargetRef,
};
