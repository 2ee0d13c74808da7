//! Harness configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{CaseError, CaseResult};
use crate::skip::strings_or_ints;

/// Harness configuration, usually read from `casekit.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the application under test
    pub base_url: String,

    /// Directory holding YAML case files
    pub cases_dir: PathBuf,

    /// Directory for result files
    pub output_dir: PathBuf,

    /// Named URLs, referenced from case steps as `@name`
    pub urls: BTreeMap<String, String>,

    /// WebDriver session settings
    pub webdriver: WebDriverConfig,

    /// Fixture service settings
    pub fixtures: FixtureConfig,

    /// Defect trackers by name
    pub trackers: BTreeMap<String, TrackerConfig>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            cases_dir: PathBuf::from("cases"),
            output_dir: PathBuf::from("test-results"),
            urls: BTreeMap::new(),
            webdriver: WebDriverConfig::default(),
            fixtures: FixtureConfig::default(),
            trackers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
}

/// WebDriver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    /// WebDriver endpoint (chromedriver, geckodriver, selenium)
    pub url: String,

    pub browser: Browser,

    pub headless: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:4444".to_string(),
            browser: Browser::Chrome,
            headless: true,
        }
    }
}

/// Fixture service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    /// Base URL of the fixture REST service (None = no HTTP fixtures)
    pub url: Option<String>,

    /// Bearer token sent to the fixture service
    pub token: Option<String>,

    pub timeout_secs: u64,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            timeout_secs: 10,
        }
    }
}

/// One `[trackers.<name>]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TrackerConfig {
    Bugzilla {
        url: String,
        #[serde(default)]
        api_key: Option<String>,
        /// Statuses counted as open when the server omits `is_open`
        #[serde(default)]
        open_statuses: Option<Vec<String>>,
        #[serde(default = "default_tracker_timeout")]
        timeout_secs: u64,
    },
    Static {
        #[serde(default, deserialize_with = "strings_or_ints")]
        open: Vec<String>,
        #[serde(default, deserialize_with = "strings_or_ints")]
        closed: Vec<String>,
    },
}

fn default_tracker_timeout() -> u64 {
    10
}

impl HarnessConfig {
    /// Load configuration from file, or defaults if it does not exist
    pub fn load(path: &Path) -> CaseResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> CaseResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CaseError::InvalidConfig(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> CaseResult<()> {
        if self.base_url.is_empty() {
            return Err(CaseError::InvalidConfig("base_url must not be empty".to_string()));
        }
        for (name, url) in &self.urls {
            if url.is_empty() {
                return Err(CaseError::InvalidConfig(format!("url '{}' is empty", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
base_url = "http://localhost:8000"

[urls]
login_page = "/login"

[webdriver]
url = "http://localhost:9515"
browser = "firefox"
headless = false

[fixtures]
url = "http://localhost:8000/api"

[trackers.bugzilla]
kind = "bugzilla"
url = "https://bugzilla.example.com"

[trackers.local]
kind = "static"
open = ["456789"]
"#;
        let config: HarnessConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.urls["login_page"], "/login");
        assert_eq!(config.webdriver.browser, Browser::Firefox);
        assert!(!config.webdriver.headless);
        assert_eq!(config.fixtures.url.as_deref(), Some("http://localhost:8000/api"));
        assert_eq!(config.fixtures.timeout_secs, 10);
        assert!(matches!(
            &config.trackers["bugzilla"],
            TrackerConfig::Bugzilla { timeout_secs: 10, .. }
        ));
        assert_eq!(
            config.trackers["local"],
            TrackerConfig::Static {
                open: vec!["456789".to_string()],
                closed: vec![]
            }
        );
    }

    #[test]
    fn test_static_tracker_accepts_numeric_ids() {
        let toml = r#"
[trackers.local]
kind = "static"
open = [456789, "ABC-1"]
closed = [12]
"#;
        let config: HarnessConfig = toml::from_str(toml).unwrap();
        assert_eq!(
            config.trackers["local"],
            TrackerConfig::Static {
                open: vec!["456789".to_string(), "ABC-1".to_string()],
                closed: vec!["12".to_string()]
            }
        );
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("casekit.toml")).unwrap();
        assert_eq!(config.webdriver.url, "http://localhost:4444");
        assert!(config.trackers.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("casekit.toml");

        let mut config = HarnessConfig::default();
        config.urls.insert("login_page".to_string(), "/login".to_string());
        config.save(&path).unwrap();

        let loaded = HarnessConfig::load(&path).unwrap();
        assert_eq!(loaded.urls.get("login_page").map(String::as_str), Some("/login"));
    }
}
