//! Declarative YAML test cases

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::case::{assert_contains, CaseContext, TestCase};
use crate::driver::{Locator, INNER_HTML};
use crate::error::{CaseError, CaseResult};
use crate::fixture::{FixtureSet, FixtureSpec};
use crate::metadata::TestMetadata;
use crate::skip::{skip_if, SkipCondition};

/// A complete test case parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSpec {
    /// Unique name for this case
    pub name: String,

    /// Human-readable description; may carry a `:id:` field list
    #[serde(default)]
    pub description: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// Explicit metadata; wins over the description field list
    #[serde(default)]
    pub metadata: Option<TestMetadata>,

    /// Defects that skip this case while open
    #[serde(default)]
    pub skip_if: Vec<SkipCondition>,

    /// Fixtures created before the steps and deleted afterwards
    #[serde(default)]
    pub fixtures: Vec<FixtureSpec>,

    /// Steps to execute in order
    pub steps: Vec<CaseStep>,
}

/// A single step of a declarative case
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CaseStep {
    /// Navigate to a URL (`@name`, relative or absolute)
    Navigate { url: String },

    /// Clear an input
    Clear { locator: Locator },

    /// Type text into an element
    SendKeys { locator: Locator, text: String },

    /// Clear an input, then type into it
    Fill { locator: Locator, value: String },

    /// Click an element
    Click { locator: Locator },

    /// Assert that an attribute of the page (or of an element) contains `text`
    AssertContains {
        #[serde(default)]
        locator: Option<Locator>,
        #[serde(default = "default_attribute")]
        attribute: String,
        text: String,
    },

    /// Log a message
    Log { message: String },
}

fn default_attribute() -> String {
    INNER_HTML.to_string()
}

impl CaseStep {
    pub fn label(&self) -> String {
        match self {
            CaseStep::Navigate { url } => format!("navigate:{}", url),
            CaseStep::Clear { locator } => format!("clear:{}", locator),
            CaseStep::SendKeys { locator, .. } => format!("send_keys:{}", locator),
            CaseStep::Fill { locator, .. } => format!("fill:{}", locator),
            CaseStep::Click { locator } => format!("click:{}", locator),
            CaseStep::AssertContains { attribute, .. } => format!("assert_contains:{}", attribute),
            CaseStep::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }
}

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{\s*([A-Za-z0-9_-]+)\.([A-Za-z0-9_-]+)\s*\}").expect("placeholder regex is valid")
});

/// Replace `${fixture.attribute}` with values from acquired fixtures
pub fn expand_placeholders(text: &str, fixtures: &FixtureSet) -> CaseResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always matches");
        out.push_str(&text[last..whole.start()]);
        out.push_str(fixtures.attr(&caps[1], &caps[2])?);
        last = whole.end();
    }
    out.push_str(&text[last..]);

    Ok(out)
}

impl CaseSpec {
    /// Parse a case from a YAML string
    pub fn from_yaml(yaml: &str) -> CaseResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a case from a YAML file
    pub fn from_file(path: &Path) -> CaseResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| CaseError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all cases below a directory, in path order
    pub fn load_all(dir: &Path) -> CaseResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(CaseError::SpecParse(format!(
                "case directory {} does not exist",
                dir.display()
            )));
        }

        let mut paths = Vec::new();
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry.map_err(|e| {
                CaseError::SpecParse(format!("cannot read {}: {}", dir.display(), e))
            })?;
            let is_case = entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false);
            if is_case {
                paths.push(entry.into_path());
            }
        }
        paths.sort();

        let mut specs = Vec::with_capacity(paths.len());
        for path in paths {
            specs.push(Self::from_file(&path)?);
        }

        info!("Loaded {} case file(s) from {}", specs.len(), dir.display());
        Ok(specs)
    }

    fn validate(&self) -> CaseResult<()> {
        if self.name.trim().is_empty() {
            return Err(CaseError::SpecParse("case name must not be empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(CaseError::SpecParse(format!("case '{}' has no steps", self.name)));
        }
        let mut names: Vec<&str> = self.fixtures.iter().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(CaseError::SpecParse(format!(
                "case '{}' declares fixture '{}' twice",
                self.name, w[0]
            )));
        }
        Ok(())
    }

    /// Metadata from the `metadata:` mapping, else from the description
    pub fn resolve_metadata(&self) -> CaseResult<TestMetadata> {
        if let Some(meta) = &self.metadata {
            return Ok(meta.clone());
        }
        TestMetadata::from_field_list(&self.description)
            .map_err(|e| CaseError::SpecParse(format!("case '{}': {}", self.name, e)))?
            .ok_or_else(|| CaseError::SpecParse(format!("case '{}' has no metadata", self.name)))
    }

    /// Turn the spec into a runnable case, wrapped in one guard per
    /// `skip_if` entry. The first entry is the outermost guard.
    pub fn into_case(mut self) -> CaseResult<Arc<dyn TestCase>> {
        let metadata = self.resolve_metadata()?;
        let conditions = std::mem::take(&mut self.skip_if);

        let mut case: Box<dyn TestCase> = Box::new(SpecCase {
            spec: self,
            metadata,
        });
        for condition in conditions.into_iter().rev() {
            case = Box::new(skip_if(condition, case));
        }

        Ok(Arc::from(case))
    }
}

/// A [`CaseSpec`] executed step by step against the context's driver
pub struct SpecCase {
    spec: CaseSpec,
    metadata: TestMetadata,
}

impl SpecCase {
    async fn execute_step(&self, step: &CaseStep, ctx: &CaseContext) -> CaseResult<()> {
        let expand = |text: &str| expand_placeholders(text, ctx.fixtures());

        match step {
            CaseStep::Navigate { url } => ctx.navigate(&expand(url)?).await,
            CaseStep::Clear { locator } => ctx.driver().find_element(locator).await?.clear().await,
            CaseStep::SendKeys { locator, text } => {
                let text = expand(text)?;
                ctx.driver().find_element(locator).await?.send_keys(&text).await
            }
            CaseStep::Fill { locator, value } => {
                let value = expand(value)?;
                let element = ctx.driver().find_element(locator).await?;
                element.clear().await?;
                element.send_keys(&value).await
            }
            CaseStep::Click { locator } => ctx.driver().find_element(locator).await?.click().await,
            CaseStep::AssertContains {
                locator,
                attribute,
                text,
            } => {
                let expected = expand(text)?;
                let actual = match locator {
                    Some(locator) => ctx
                        .driver()
                        .find_element(locator)
                        .await?
                        .get_attribute(attribute)
                        .await?
                        .unwrap_or_default(),
                    None => ctx.driver().get_attribute(attribute).await?,
                };
                assert_contains(&actual, &expected)
            }
            CaseStep::Log { message } => {
                info!("[{}] {}", self.spec.name, message);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl TestCase for SpecCase {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn metadata(&self) -> &TestMetadata {
        &self.metadata
    }

    fn tags(&self) -> &[String] {
        &self.spec.tags
    }

    fn fixtures(&self) -> &[FixtureSpec] {
        &self.spec.fixtures
    }

    async fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        for (i, step) in self.spec.steps.iter().enumerate() {
            debug!("{} step {}: {}", self.spec.name, i + 1, step.label());
            self.execute_step(step, ctx).await?;
        }
        Ok(())
    }
}
