//! The test case contract and the context handed to case bodies

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::driver::UiDriver;
use crate::error::{CaseError, CaseResult};
use crate::fixture::{Fixture, FixtureSet, FixtureSpec};
use crate::metadata::TestMetadata;
use crate::skip::SkipCondition;

/// A runnable test case.
///
/// The runner evaluates [`skip_conditions`](TestCase::skip_conditions)
/// first, then acquires [`fixtures`](TestCase::fixtures), calls
/// [`run`](TestCase::run) and finally releases the fixtures. A body signals
/// an assertion failure by returning [`CaseError::AssertionFailed`] or by
/// panicking.
#[async_trait]
pub trait TestCase: Send + Sync {
    fn name(&self) -> &str;

    fn metadata(&self) -> &TestMetadata;

    fn tags(&self) -> &[String] {
        &[]
    }

    fn fixtures(&self) -> &[FixtureSpec] {
        &[]
    }

    fn skip_conditions(&self) -> Vec<&SkipCondition> {
        Vec::new()
    }

    async fn run(&self, ctx: &CaseContext) -> CaseResult<()>;
}

#[async_trait]
impl<T: TestCase + ?Sized> TestCase for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn metadata(&self) -> &TestMetadata {
        (**self).metadata()
    }

    fn tags(&self) -> &[String] {
        (**self).tags()
    }

    fn fixtures(&self) -> &[FixtureSpec] {
        (**self).fixtures()
    }

    fn skip_conditions(&self) -> Vec<&SkipCondition> {
        (**self).skip_conditions()
    }

    async fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        (**self).run(ctx).await
    }
}

/// Base URL plus named URLs (`@login_page`)
#[derive(Debug, Clone, Default)]
pub struct UrlMap {
    base_url: String,
    named: BTreeMap<String, String>,
}

impl UrlMap {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            named: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.named.insert(name.into(), url.into());
        self
    }

    pub fn extend(mut self, named: &BTreeMap<String, String>) -> Self {
        self.named
            .extend(named.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// `@name` looks up a named URL, absolute URLs pass through, anything
    /// else is joined onto the base URL.
    pub fn resolve(&self, url: &str) -> CaseResult<String> {
        let url = match url.strip_prefix('@') {
            Some(name) => self
                .named
                .get(name)
                .ok_or_else(|| CaseError::InvalidConfig(format!("no url named '{}'", name)))?
                .as_str(),
            None => url,
        };

        if url.contains("://") {
            return Ok(url.to_string());
        }
        Ok(format!("{}/{}", self.base_url, url.trim_start_matches('/')))
    }
}

/// Everything a case body may touch
pub struct CaseContext {
    driver: Arc<dyn UiDriver>,
    fixtures: FixtureSet,
    urls: Arc<UrlMap>,
}

impl CaseContext {
    pub fn new(driver: Arc<dyn UiDriver>, fixtures: FixtureSet, urls: Arc<UrlMap>) -> Self {
        Self {
            driver,
            fixtures,
            urls,
        }
    }

    pub fn driver(&self) -> &dyn UiDriver {
        self.driver.as_ref()
    }

    pub fn fixtures(&self) -> &FixtureSet {
        &self.fixtures
    }

    pub fn fixture(&self, name: &str) -> CaseResult<&Fixture> {
        self.fixtures
            .get(name)
            .ok_or_else(|| CaseError::Fixture(format!("no fixture named '{}' was acquired", name)))
    }

    pub fn resolve_url(&self, url: &str) -> CaseResult<String> {
        self.urls.resolve(url)
    }

    /// Resolve `url` and navigate to it
    pub async fn navigate(&self, url: &str) -> CaseResult<()> {
        let url = self.resolve_url(url)?;
        self.driver.navigate(&url).await
    }
}

/// Fail with an assertion error unless `haystack` contains `needle`
pub fn assert_contains(haystack: &str, needle: &str) -> CaseResult<()> {
    if haystack.contains(needle) {
        return Ok(());
    }

    const PREVIEW: usize = 200;
    let preview: String = haystack.chars().take(PREVIEW).collect();
    let ellipsis = if haystack.chars().count() > PREVIEW { "..." } else { "" };
    Err(CaseError::AssertionFailed(format!(
        "expected {:?} in {:?}{}",
        needle, preview, ellipsis
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_urls() {
        let urls = UrlMap::new("http://localhost:8000/")
            .with("login_page", "/login")
            .with("sso", "https://sso.example.com/start");

        assert_eq!(urls.resolve("@login_page").unwrap(), "http://localhost:8000/login");
        assert_eq!(urls.resolve("@sso").unwrap(), "https://sso.example.com/start");
        assert_eq!(urls.resolve("users/1").unwrap(), "http://localhost:8000/users/1");
        assert_eq!(urls.resolve("http://other/x").unwrap(), "http://other/x");
        assert!(urls.resolve("@missing").is_err());
    }

    #[test]
    fn test_assert_contains() {
        assert!(assert_contains("<p>Logged in as user: foo</p>", "Logged in as user:").is_ok());

        let err = assert_contains("<p>Invalid credentials</p>", "Logged in as user:").unwrap_err();
        assert!(matches!(err, CaseError::AssertionFailed(msg) if msg.contains("Invalid credentials")));
    }

    #[test]
    fn test_assert_contains_truncates_long_pages() {
        let page = "x".repeat(1000);
        let CaseError::AssertionFailed(msg) = assert_contains(&page, "y").unwrap_err() else {
            panic!("expected assertion failure");
        };
        assert!(msg.len() < 300);
        assert!(msg.ends_with("..."));
    }
}
