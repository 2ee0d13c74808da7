//! UI automation seam
//!
//! Cases never talk to a browser directly; they get a [`UiDriver`] through
//! their [`CaseContext`](crate::case::CaseContext). The runner's caller owns
//! the session lifecycle. [`WebDriver`] is the W3C WebDriver adapter.

use std::fmt;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::{Browser, WebDriverConfig};
use crate::error::{CaseError, CaseResult};

/// How to find an element on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// `name="..."` attribute
    Name(String),
    Css(String),
    Id(String),
    Xpath(String),
    LinkText(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Name(s) => write!(f, "name={}", s),
            Locator::Css(s) => write!(f, "css={}", s),
            Locator::Id(s) => write!(f, "id={}", s),
            Locator::Xpath(s) => write!(f, "xpath={}", s),
            Locator::LinkText(s) => write!(f, "link_text={}", s),
        }
    }
}

/// Page-level attributes understood by every driver
pub const INNER_HTML: &str = "inner_html";
pub const PAGE_SOURCE: &str = "page_source";
pub const CURRENT_URL: &str = "current_url";

/// Browser session
#[async_trait]
pub trait UiDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> CaseResult<()>;

    async fn find_element(&self, locator: &Locator) -> CaseResult<Box<dyn ElementHandle>>;

    /// Read a page-level attribute such as [`INNER_HTML`]
    async fn get_attribute(&self, name: &str) -> CaseResult<String>;

    async fn close(&self) -> CaseResult<()>;
}

/// Element found on the current page
#[async_trait]
pub trait ElementHandle: Send + Sync {
    async fn clear(&self) -> CaseResult<()>;

    async fn send_keys(&self, text: &str) -> CaseResult<()>;

    async fn click(&self) -> CaseResult<()>;

    async fn get_attribute(&self, name: &str) -> CaseResult<Option<String>>;
}

/// WebDriver-backed session (chromedriver, geckodriver, Selenium grid)
pub struct WebDriver {
    client: Client,
}

impl WebDriver {
    /// Open a new browser session
    pub async fn connect(config: &WebDriverConfig) -> CaseResult<Self> {
        let mut caps = serde_json::Map::new();
        match config.browser {
            Browser::Chrome => {
                caps.insert("browserName".to_string(), json!("chrome"));
                if config.headless {
                    caps.insert(
                        "goog:chromeOptions".to_string(),
                        json!({ "args": ["--headless=new", "--no-sandbox"] }),
                    );
                }
            }
            Browser::Firefox => {
                caps.insert("browserName".to_string(), json!("firefox"));
                if config.headless {
                    caps.insert("moz:firefoxOptions".to_string(), json!({ "args": ["-headless"] }));
                }
            }
        }

        info!("Opening {:?} session at {}", config.browser, config.url);

        let mut builder = ClientBuilder::native();
        builder.capabilities(caps);
        let client = builder
            .connect(&config.url)
            .await
            .map_err(|e| CaseError::Driver(format!("cannot open session at {}: {}", config.url, e)))?;

        Ok(Self { client })
    }

    async fn body(&self) -> CaseResult<Element> {
        self.client
            .find(fantoccini::Locator::Css("body"))
            .await
            .map_err(|e| CaseError::Driver(format!("page has no body: {}", e)))
    }
}

#[async_trait]
impl UiDriver for WebDriver {
    async fn navigate(&self, url: &str) -> CaseResult<()> {
        debug!("navigate {}", url);
        self.client
            .goto(url)
            .await
            .map_err(|e| CaseError::Driver(format!("navigate {}: {}", url, e)))
    }

    async fn find_element(&self, locator: &Locator) -> CaseResult<Box<dyn ElementHandle>> {
        debug!("find {}", locator);

        let by_name;
        let search = match locator {
            Locator::Name(name) => {
                by_name = format!("[name=\"{}\"]", name.replace('"', "\\\""));
                fantoccini::Locator::Css(&by_name)
            }
            Locator::Css(s) => fantoccini::Locator::Css(s),
            Locator::Id(s) => fantoccini::Locator::Id(s),
            Locator::Xpath(s) => fantoccini::Locator::XPath(s),
            Locator::LinkText(s) => fantoccini::Locator::LinkText(s),
        };

        let element = self
            .client
            .find(search)
            .await
            .map_err(|e| CaseError::ElementNotFound(format!("{}: {}", locator, e)))?;

        Ok(Box::new(WebElement {
            element,
            label: locator.to_string(),
        }))
    }

    async fn get_attribute(&self, name: &str) -> CaseResult<String> {
        let value = match name {
            INNER_HTML | "innerHTML" => self.body().await?.html(true).await,
            PAGE_SOURCE | "source" => self.client.source().await,
            CURRENT_URL => self.client.current_url().await.map(|u| u.to_string()),
            other => self
                .body()
                .await?
                .attr(other)
                .await
                .map(|v| v.unwrap_or_default()),
        };
        value.map_err(|e| CaseError::Driver(format!("read {}: {}", name, e)))
    }

    async fn close(&self) -> CaseResult<()> {
        info!("Closing browser session");
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| CaseError::Driver(format!("close session: {}", e)))
    }
}

struct WebElement {
    element: Element,
    label: String,
}

impl WebElement {
    fn fail(&self, action: &str, e: impl fmt::Display) -> CaseError {
        CaseError::Driver(format!("{} {}: {}", action, self.label, e))
    }
}

#[async_trait]
impl ElementHandle for WebElement {
    async fn clear(&self) -> CaseResult<()> {
        self.element.clear().await.map_err(|e| self.fail("clear", e))
    }

    async fn send_keys(&self, text: &str) -> CaseResult<()> {
        self.element
            .send_keys(text)
            .await
            .map_err(|e| self.fail("send_keys", e))
    }

    async fn click(&self) -> CaseResult<()> {
        self.element.click().await.map_err(|e| self.fail("click", e))
    }

    async fn get_attribute(&self, name: &str) -> CaseResult<Option<String>> {
        if name == INNER_HTML || name == "innerHTML" {
            return self
                .element
                .html(true)
                .await
                .map(Some)
                .map_err(|e| self.fail("read inner_html of", e));
        }
        self.element
            .attr(name)
            .await
            .map_err(|e| self.fail(&format!("read {} of", name), e))
    }
}
