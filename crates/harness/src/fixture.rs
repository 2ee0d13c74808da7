//! Test fixtures: resources created for one case and removed afterwards
//!
//! A [`FixtureScope`] owns everything a single case execution acquired.
//! Release walks the acquired fixtures in reverse order and attempts every
//! delete even when an earlier one fails.

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::FixtureConfig;
use crate::error::{panic_message, CaseError, CaseResult};

pub type Attributes = BTreeMap<String, String>;

/// Declaration of a fixture a case needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureSpec {
    /// Name the case body uses to refer to the fixture
    pub name: String,

    /// Resource kind, e.g. `user`
    pub kind: String,

    #[serde(default)]
    pub attributes: Attributes,
}

impl FixtureSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A created resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: String,
    pub kind: String,
    pub attributes: Attributes,
}

impl Fixture {
    /// Attribute lookup; `id` resolves to the fixture id
    pub fn get(&self, key: &str) -> Option<&str> {
        if key == "id" {
            return Some(&self.id);
        }
        self.attributes.get(key).map(String::as_str)
    }
}

/// Creates and deletes fixtures of one or more kinds
#[async_trait]
pub trait FixtureProvider: Send + Sync {
    async fn create(&self, kind: &str, attributes: &Attributes) -> CaseResult<Fixture>;

    async fn delete(&self, fixture: &Fixture) -> CaseResult<()>;
}

/// Process-local provider. Tracks what is alive, which makes it handy for
/// dry runs and for asserting teardown behavior.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    next_id: AtomicU64,
    created: AtomicUsize,
    deleted: AtomicUsize,
    live: Mutex<BTreeMap<String, Fixture>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> usize {
        self.deleted.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> Vec<Fixture> {
        self.live.lock().values().cloned().collect()
    }
}

#[async_trait]
impl FixtureProvider for InMemoryProvider {
    async fn create(&self, kind: &str, attributes: &Attributes) -> CaseResult<Fixture> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let fixture = Fixture {
            id: id.to_string(),
            kind: kind.to_string(),
            attributes: attributes.clone(),
        };
        self.live.lock().insert(fixture.id.clone(), fixture.clone());
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(fixture)
    }

    async fn delete(&self, fixture: &Fixture) -> CaseResult<()> {
        if self.live.lock().remove(&fixture.id).is_none() {
            return Err(CaseError::Fixture(format!(
                "{} {} is not alive",
                fixture.kind, fixture.id
            )));
        }
        self.deleted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// REST fixture service: `POST {url}/{kind}s` and `DELETE {url}/{kind}s/{id}`
pub struct HttpFixtureProvider {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpFixtureProvider {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> CaseResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn collection_url(&self, kind: &str) -> String {
        format!("{}/{}s", self.base_url, kind)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl FixtureProvider for HttpFixtureProvider {
    async fn create(&self, kind: &str, attributes: &Attributes) -> CaseResult<Fixture> {
        let url = self.collection_url(kind);
        debug!("Creating {} fixture via {}", kind, url);

        let response = self
            .authorize(self.client.post(&url).json(attributes))
            .send()
            .await
            .map_err(|e| CaseError::Fixture(format!("create {}: {}", kind, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaseError::Fixture(format!(
                "create {} returned {}: {}",
                kind, status, body
            )));
        }

        let body: serde_json::Map<String, serde_json::Value> = response
            .json()
            .await
            .map_err(|e| CaseError::Fixture(format!("create {}: invalid response: {}", kind, e)))?;

        let id = match body.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => {
                return Err(CaseError::Fixture(format!(
                    "create {}: response has no id",
                    kind
                )))
            }
        };

        // Server echoes win over what was sent; secrets the server does not
        // echo back (passwords) stay available to the case body.
        let mut merged = attributes.clone();
        for (key, value) in &body {
            if key == "id" {
                continue;
            }
            if let serde_json::Value::String(s) = value {
                merged.insert(key.clone(), s.clone());
            }
        }

        Ok(Fixture {
            id,
            kind: kind.to_string(),
            attributes: merged,
        })
    }

    async fn delete(&self, fixture: &Fixture) -> CaseResult<()> {
        let url = format!("{}/{}", self.collection_url(&fixture.kind), fixture.id);

        let response = self
            .authorize(self.client.delete(&url))
            .send()
            .await
            .map_err(|e| CaseError::Fixture(format!("delete {} {}: {}", fixture.kind, fixture.id, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            warn!("{} {} was already gone", fixture.kind, fixture.id);
            return Ok(());
        }
        if !status.is_success() {
            return Err(CaseError::Fixture(format!(
                "delete {} {} returned {}",
                fixture.kind, fixture.id, status
            )));
        }
        Ok(())
    }
}

/// Fixture providers by kind, with an optional catch-all
#[derive(Clone, Default)]
pub struct FixtureProviders {
    by_kind: HashMap<String, Arc<dyn FixtureProvider>>,
    fallback: Option<Arc<dyn FixtureProvider>>,
}

impl FixtureProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: impl Into<String>, provider: Arc<dyn FixtureProvider>) -> Self {
        self.by_kind.insert(kind.into(), provider);
        self
    }

    pub fn with_fallback(mut self, provider: Arc<dyn FixtureProvider>) -> Self {
        self.fallback = Some(provider);
        self
    }

    pub fn from_config(config: &FixtureConfig) -> CaseResult<Self> {
        let mut providers = Self::new();
        if let Some(url) = &config.url {
            let http = HttpFixtureProvider::new(
                url.clone(),
                config.token.clone(),
                Duration::from_secs(config.timeout_secs),
            )?;
            providers = providers.with_fallback(Arc::new(http));
        }
        Ok(providers)
    }

    pub fn provider(&self, kind: &str) -> CaseResult<&Arc<dyn FixtureProvider>> {
        self.by_kind
            .get(kind)
            .or(self.fallback.as_ref())
            .ok_or_else(|| CaseError::UnknownFixtureKind(kind.to_string()))
    }
}

/// Fixtures acquired for one case, by name
#[derive(Debug, Clone, Default, Serialize)]
pub struct FixtureSet {
    fixtures: BTreeMap<String, Fixture>,
}

impl FixtureSet {
    pub fn get(&self, name: &str) -> Option<&Fixture> {
        self.fixtures.get(name)
    }

    /// Look up `name.key`, failing with a descriptive error
    pub fn attr(&self, name: &str, key: &str) -> CaseResult<&str> {
        let fixture = self
            .get(name)
            .ok_or_else(|| CaseError::Placeholder(format!("no fixture named '{}'", name)))?;
        fixture.get(key).ok_or_else(|| {
            CaseError::Placeholder(format!("fixture '{}' has no attribute '{}'", name, key))
        })
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }
}

/// Scoped ownership of the fixtures of one case execution
pub struct FixtureScope<'a> {
    providers: &'a FixtureProviders,
    acquired: Vec<(String, Fixture)>,
}

impl<'a> FixtureScope<'a> {
    pub fn new(providers: &'a FixtureProviders) -> Self {
        Self {
            providers,
            acquired: Vec::new(),
        }
    }

    pub async fn acquire(&mut self, spec: &FixtureSpec) -> CaseResult<&Fixture> {
        let provider = self.providers.provider(&spec.kind)?;
        let fixture = AssertUnwindSafe(provider.create(&spec.kind, &spec.attributes))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(CaseError::Fixture(format!(
                    "creating {} '{}' panicked: {}",
                    spec.kind,
                    spec.name,
                    panic_message(payload)
                )))
            })?;
        info!("Created {} fixture '{}' (id {})", spec.kind, spec.name, fixture.id);

        self.acquired.push((spec.name.clone(), fixture));
        Ok(&self.acquired[self.acquired.len() - 1].1)
    }

    /// Acquire every spec in order. Stops at the first failure; whatever
    /// was acquired before it stays in the scope for release.
    pub async fn acquire_all(&mut self, specs: &[FixtureSpec]) -> CaseResult<()> {
        for spec in specs {
            self.acquire(spec).await?;
        }
        Ok(())
    }

    pub fn fixtures(&self) -> FixtureSet {
        FixtureSet {
            fixtures: self.acquired.iter().cloned().collect(),
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.acquired
            .iter()
            .map(|(name, f)| format!("{}:{}", name, f.id))
            .collect()
    }

    /// Delete everything in reverse acquisition order. Returns one message
    /// per failed or panicking delete.
    pub async fn release(mut self) -> Vec<String> {
        let mut errors = Vec::new();

        while let Some((name, fixture)) = self.acquired.pop() {
            let result = match self.providers.provider(&fixture.kind) {
                Ok(provider) => AssertUnwindSafe(provider.delete(&fixture))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        Err(CaseError::Fixture(format!(
                            "deleting {} {} panicked: {}",
                            fixture.kind,
                            fixture.id,
                            panic_message(payload)
                        )))
                    }),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => debug!("Deleted {} fixture '{}' (id {})", fixture.kind, name, fixture.id),
                Err(e) => {
                    warn!("Teardown of fixture '{}' failed: {}", name, e);
                    errors.push(format!("{}: {}", name, e));
                }
            }
        }

        errors
    }
}
