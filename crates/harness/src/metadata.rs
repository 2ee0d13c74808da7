//! Test case metadata
//!
//! Metadata is descriptive only: reporting and filtering read it, the
//! runner never consults it to decide pass or fail. It can be declared as a
//! YAML mapping or as a field list inside a case description:
//!
//! ```text
//! :id: 12345
//! :level: Critical
//! :customerscenario: true
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CaseError, CaseResult};

/// Opaque, unique identifier of a test case.
///
/// Accepted as either a string or an integer in case files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawId", into = "String")]
pub struct CaseId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Str(String),
}

impl CaseId {
    pub fn new(id: impl Into<String>) -> CaseResult<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(CaseError::InvalidMetadata("id must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<RawId> for CaseId {
    type Error = CaseError;

    fn try_from(raw: RawId) -> CaseResult<Self> {
        match raw {
            RawId::Int(n) => CaseId::new(n.to_string()),
            RawId::Str(s) => CaseId::new(s),
        }
    }
}

impl From<CaseId> for String {
    fn from(id: CaseId) -> Self {
        id.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Severity of a test case. Ordered so that `Critical` is the greatest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Level {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
            Level::Critical => "critical",
        }
    }
}

impl FromStr for Level {
    type Err = CaseError;

    fn from_str(s: &str) -> CaseResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Level::Low),
            "medium" => Ok(Level::Medium),
            "high" => Ok(Level::High),
            "critical" => Ok(Level::Critical),
            other => Err(CaseError::InvalidMetadata(format!(
                "unknown level '{}' (expected critical, high, medium or low)",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Level {
    type Error = CaseError;

    fn try_from(s: String) -> CaseResult<Self> {
        s.parse()
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured metadata attached to a test case at definition time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMetadata {
    /// Unique identifier
    pub id: CaseId,

    /// Severity level
    #[serde(default)]
    pub level: Level,

    /// Whether the case reproduces a customer-reported scenario
    #[serde(default, alias = "customerscenario", alias = "customerScenario")]
    pub customer_scenario: bool,

    /// Unrecognized keys, kept as written
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl TestMetadata {
    pub fn new(id: CaseId, level: Level) -> Self {
        Self {
            id,
            level,
            customer_scenario: false,
            extra: BTreeMap::new(),
        }
    }

    pub fn customer_scenario(mut self, flag: bool) -> Self {
        self.customer_scenario = flag;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_yaml::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Extract metadata from a `:key: value` field list embedded in free
    /// text. Returns `None` when the text carries no field list at all.
    pub fn from_field_list(text: &str) -> CaseResult<Option<Self>> {
        let mut id = None;
        let mut level = Level::default();
        let mut customer_scenario = false;
        let mut extra = BTreeMap::new();
        let mut seen_any = false;

        for line in text.lines() {
            let Some((key, value)) = parse_field(line) else {
                continue;
            };
            seen_any = true;

            match key.to_ascii_lowercase().as_str() {
                "id" => id = Some(CaseId::new(value)?),
                "level" => level = value.parse()?,
                "customerscenario" | "customer_scenario" => {
                    customer_scenario = parse_bool(value).ok_or_else(|| {
                        CaseError::InvalidMetadata(format!(
                            "customerscenario must be a boolean, got '{}'",
                            value
                        ))
                    })?;
                }
                _ => {
                    extra.insert(key.to_string(), serde_yaml::Value::String(value.to_string()));
                }
            }
        }

        if !seen_any {
            return Ok(None);
        }

        let id = id.ok_or_else(|| {
            CaseError::InvalidMetadata("field list has no :id: entry".to_string())
        })?;

        Ok(Some(Self {
            id,
            level,
            customer_scenario,
            extra,
        }))
    }
}

/// Split `:key: value` into its parts
fn parse_field(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim().strip_prefix(':')?;
    let (key, value) = rest.split_once(':')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key, value.trim()))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Write-once store of case metadata, keyed by case name
#[derive(Debug, Default, Clone)]
pub struct MetadataRegistry {
    by_name: BTreeMap<String, TestMetadata>,
    names_by_id: HashMap<CaseId, String>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metadata for a case. Names and ids must both be unique.
    pub fn register(&mut self, name: &str, metadata: TestMetadata) -> CaseResult<()> {
        if self.by_name.contains_key(name) {
            return Err(CaseError::DuplicateName(name.to_string()));
        }
        if let Some(first) = self.names_by_id.get(&metadata.id) {
            return Err(CaseError::DuplicateId {
                id: metadata.id.to_string(),
                first: first.clone(),
                second: name.to_string(),
            });
        }

        self.names_by_id.insert(metadata.id.clone(), name.to_string());
        self.by_name.insert(name.to_string(), metadata);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TestMetadata> {
        self.by_name.get(name)
    }

    pub fn find_by_id(&self, id: &CaseId) -> Option<(&str, &TestMetadata)> {
        let name = self.names_by_id.get(id)?;
        self.by_name.get(name).map(|m| (name.as_str(), m))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TestMetadata)> {
        self.by_name.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
