//! Shared fakes for harness integration tests.
//!
//! `FakeApp` plays a tiny login application behind the `UiDriver` seam:
//! a login page with `username`/`password` inputs and a submit button.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use casekit_harness::driver::{ElementHandle, Locator, UiDriver, INNER_HTML};
use casekit_harness::fixture::{Attributes, Fixture, FixtureProvider, InMemoryProvider};
use casekit_harness::{CaseError, CaseResult};
use parking_lot::Mutex;

pub const SUBMIT: &str = "#login_form input[type=submit]";

#[derive(Default)]
struct AppState {
    url: String,
    inputs: HashMap<String, String>,
    page: String,
    actions: Vec<String>,
}

/// Fake browser session driving a login page
#[derive(Clone)]
pub struct FakeApp {
    state: Arc<Mutex<AppState>>,
    valid: (String, String),
}

impl FakeApp {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(AppState::default())),
            valid: (username.to_string(), password.to_string()),
        }
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    pub fn current_url(&self) -> String {
        self.state.lock().url.clone()
    }

    fn record(&self, action: String) {
        self.state.lock().actions.push(action);
    }
}

#[async_trait]
impl UiDriver for FakeApp {
    async fn navigate(&self, url: &str) -> CaseResult<()> {
        self.record(format!("navigate {}", url));
        let mut state = self.state.lock();
        state.url = url.to_string();
        state.inputs.clear();
        state.page = r#"<form id="login_form"><input name="username"><input name="password"><input type="submit"></form>"#
            .to_string();
        Ok(())
    }

    async fn find_element(&self, locator: &Locator) -> CaseResult<Box<dyn ElementHandle>> {
        let known = match locator {
            Locator::Name(n) => n == "username" || n == "password",
            Locator::Css(s) => s == SUBMIT,
            _ => false,
        };
        if !known || !self.state.lock().url.ends_with("/login") {
            return Err(CaseError::ElementNotFound(locator.to_string()));
        }

        Ok(Box::new(FakeElement {
            app: self.clone(),
            locator: locator.clone(),
        }))
    }

    async fn get_attribute(&self, name: &str) -> CaseResult<String> {
        match name {
            INNER_HTML => Ok(self.state.lock().page.clone()),
            other => Err(CaseError::Driver(format!("unsupported page attribute {}", other))),
        }
    }

    async fn close(&self) -> CaseResult<()> {
        self.record("close".to_string());
        Ok(())
    }
}

struct FakeElement {
    app: FakeApp,
    locator: Locator,
}

impl FakeElement {
    fn field(&self) -> Option<&str> {
        match &self.locator {
            Locator::Name(n) => Some(n),
            _ => None,
        }
    }
}

#[async_trait]
impl ElementHandle for FakeElement {
    async fn clear(&self) -> CaseResult<()> {
        self.app.record(format!("clear {}", self.locator));
        if let Some(field) = self.field() {
            self.app.state.lock().inputs.remove(field);
        }
        Ok(())
    }

    async fn send_keys(&self, text: &str) -> CaseResult<()> {
        self.app.record(format!("send_keys {} {}", self.locator, text));
        let field = self
            .field()
            .ok_or_else(|| CaseError::Driver("cannot type into a button".to_string()))?;
        self.app
            .state
            .lock()
            .inputs
            .entry(field.to_string())
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn click(&self) -> CaseResult<()> {
        self.app.record(format!("click {}", self.locator));
        let mut state = self.app.state.lock();
        let user = state.inputs.get("username").cloned().unwrap_or_default();
        let pass = state.inputs.get("password").cloned().unwrap_or_default();

        state.page = if (user.as_str(), pass.as_str()) == (self.app.valid.0.as_str(), self.app.valid.1.as_str()) {
            format!("<p>Logged in as user: {}</p>", user)
        } else {
            "<p>Invalid credentials</p>".to_string()
        };
        Ok(())
    }

    async fn get_attribute(&self, name: &str) -> CaseResult<Option<String>> {
        let state = self.app.state.lock();
        Ok(match (name, self.field()) {
            ("value", Some(field)) => state.inputs.get(field).cloned(),
            _ => None,
        })
    }
}

/// In-memory provider that can be told to fail deletes
#[derive(Default)]
pub struct FlakyProvider {
    pub inner: InMemoryProvider,
    pub fail_deletes: bool,
    pub delete_attempts: AtomicUsize,
}

impl FlakyProvider {
    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Default::default()
        }
    }

    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FixtureProvider for FlakyProvider {
    async fn create(&self, kind: &str, attributes: &Attributes) -> CaseResult<Fixture> {
        match attributes.get("fail").map(String::as_str) {
            Some("create") => {
                return Err(CaseError::Fixture(format!("{} service rejected create", kind)))
            }
            Some("create-panic") => panic!("{} service crashed", kind),
            _ => {}
        }
        self.inner.create(kind, attributes).await
    }

    async fn delete(&self, fixture: &Fixture) -> CaseResult<()> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        if fixture.attributes.get("fail").map(String::as_str) == Some("delete-panic") {
            panic!("{} service crashed", fixture.kind);
        }
        if self.fail_deletes {
            return Err(CaseError::Fixture(format!("cannot delete {} {}", fixture.kind, fixture.id)));
        }
        self.inner.delete(fixture).await
    }
}
