//! Deterministic selector fallback.
//!
//! A description like "the Login button" carries enough signal to derive
//! DOM queries without a model: strip articles and the trailing element
//! word, then probe text content, placeholder, label and ARIA role in
//! that order. The first query with exactly one visible match wins.

use std::sync::Arc;
use std::time::Duration;

use browser_adapter::{BrowserDriver, BrowserError, SelectorQuery, TargetRef};
use tracing::{debug, warn};

use crate::errors::LocatorError;
use crate::types::ResolvedTarget;

const LEADING_NOISE: &[&str] = &["the", "a", "an", "on"];

/// Trailing element words and the ARIA role they imply.
const ELEMENT_WORDS: &[(&str, &str)] = &[
    ("button", "button"),
    ("link", "link"),
    ("field", "textbox"),
    ("input", "textbox"),
    ("box", "textbox"),
    ("tab", "tab"),
    ("menu", "menu"),
    ("checkbox", "checkbox"),
];

/// Derive ordered DOM queries from a natural-language description.
pub fn derive_queries(description: &str) -> Vec<SelectorQuery> {
    let mut words: Vec<&str> = description.split_whitespace().collect();

    while let Some(first) = words.first() {
        if LEADING_NOISE.contains(&first.to_lowercase().as_str()) {
            words.remove(0);
        } else {
            break;
        }
    }

    let mut role = None;
    if words.len() > 1 {
        if let Some(last) = words.last() {
            let last_lower = last.to_lowercase();
            if let Some((_, mapped)) = ELEMENT_WORDS.iter().find(|(w, _)| *w == last_lower) {
                role = Some(*mapped);
                words.pop();
            }
        }
    }

    let core = words.join(" ");
    if core.is_empty() {
        return Vec::new();
    }

    let mut queries = vec![
        SelectorQuery::Text(core.clone()),
        SelectorQuery::Placeholder(core.clone()),
        SelectorQuery::Label(core.clone()),
    ];
    if let Some(role) = role {
        queries.push(SelectorQuery::Role {
            role: role.to_string(),
            name: core,
        });
    }
    queries
}

/// Selector fallback resolver: deterministic, cheap, exact.
pub struct SelectorFallback {
    driver: Arc<dyn BrowserDriver>,
    query_timeout: Duration,
}

impl SelectorFallback {
    pub fn new(driver: Arc<dyn BrowserDriver>, query_timeout: Duration) -> Self {
        Self {
            driver,
            query_timeout,
        }
    }

    /// Resolve a description via derived queries. Exactly one visible
    /// match is required; several is an ambiguity, none is not-found.
    pub async fn resolve(&self, description: &str) -> Result<ResolvedTarget, LocatorError> {
        let queries = derive_queries(description);
        if queries.is_empty() {
            return Err(LocatorError::NotFound(description.to_string()));
        }

        let mut ambiguous_count = 0usize;
        for query in &queries {
            let matches = tokio::time::timeout(self.query_timeout, self.driver.query_selector(query))
                .await
                .map_err(|_| {
                    LocatorError::Browser(BrowserError::Timeout(format!(
                        "selector query {} exceeded {}ms",
                        query,
                        self.query_timeout.as_millis()
                    )))
                })??;

            match matches.len() {
                0 => debug!(%query, "no match"),
                1 => {
                    debug!(%query, handle = %matches[0], "unique selector match");
                    return Ok(ResolvedTarget::from_selector(TargetRef::Handle(
                        matches.into_iter().next().expect("len checked"),
                    )));
                }
                n => {
                    warn!(%query, count = n, "ambiguous selector match");
                    ambiguous_count = ambiguous_count.max(n);
                }
            }
        }

        if ambiguous_count > 1 {
            Err(LocatorError::Ambiguous {
                description: description.to_string(),
                count: ambiguous_count,
            })
        } else {
            Err(LocatorError::NotFound(description.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browser_adapter::{FakeElement, FakePage};

    #[test]
    fn derives_queries_for_button_description() {
        let queries = derive_queries("the Login button");
        assert_eq!(
            queries,
            vec![
                SelectorQuery::Text("Login".into()),
                SelectorQuery::Placeholder("Login".into()),
                SelectorQuery::Label("Login".into()),
                SelectorQuery::Role {
                    role: "button".into(),
                    name: "Login".into()
                },
            ]
        );
    }

    #[test]
    fn keeps_bare_element_word_as_text() {
        // "button" alone has no usable core beyond itself.
        let queries = derive_queries("button");
        assert_eq!(queries[0], SelectorQuery::Text("button".into()));
    }

    #[test]
    fn empty_description_derives_nothing() {
        assert!(derive_queries("the ").is_empty());
    }

    #[tokio::test]
    async fn unique_match_resolves_with_full_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::new(dir.path()));
        page.add_element(FakeElement::new("login", "Login").with_role("button"));

        let fallback = SelectorFallback::new(page, Duration::from_secs(1));
        let resolved = fallback.resolve("the Login button").await.unwrap();
        assert_eq!(resolved.confidence, 1.0);
        assert_eq!(
            resolved.target,
            TargetRef::Handle(browser_adapter::ElementHandle("login".into()))
        );
    }

    #[tokio::test]
    async fn several_matches_are_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::new(dir.path()));
        page.add_element(FakeElement::new("b1", "Submit").with_role("button"));
        page.add_element(FakeElement::new("b2", "Submit").with_role("button"));

        let fallback = SelectorFallback::new(page, Duration::from_secs(1));
        let err = fallback.resolve("Submit button").await.unwrap_err();
        assert!(matches!(err, LocatorError::Ambiguous { count: 2, .. }));
    }

    #[tokio::test]
    async fn no_match_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::new(dir.path()));

        let fallback = SelectorFallback::new(page, Duration::from_secs(1));
        let err = fallback.resolve("Logout button").await.unwrap_err();
        assert!(matches!(err, LocatorError::NotFound(_)));
    }

    #[tokio::test]
    async fn placeholder_match_beats_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(FakePage::new(dir.path()));
        page.add_element(FakeElement::new("user", "").with_placeholder("username"));

        let fallback = SelectorFallback::new(page, Duration::from_secs(1));
        let resolved = fallback.resolve("username field").await.unwrap();
        assert_eq!(
            resolved.target,
            TargetRef::Handle(browser_adapter::ElementHandle("user".into()))
        );
    }
}
