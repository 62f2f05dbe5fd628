//! Configuration for floorwatch.
//!
//! Settings are read from `.floorwatch/floorwatch.toml` (or `--config`),
//! falling back to `<user config dir>/floorwatch/floorwatch.toml`, and layered
//! file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [backend]
//! base_url = "http://localhost:8000/api"
//! token_env = "FLOORWATCH_TOKEN"
//! request_timeout_ms = 8000
//!
//! [feed]
//! vendor_id = "42"
//! interval_ms = 5000
//! cycle_timeout_ms = 10000
//!
//! [filters]
//! project = "all"
//! machine = "all"
//! operator = "all"
//! status = "all"
//! date_range = "today"
//!
//! [relay]
//! port = 3151
//! dev = false
//!
//! [logging]
//! level = "info"
//! json = false
//! dir = ".floorwatch/logs"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::feed::client::{HttpTrackTraceClient, parse_base_url};
use crate::feed::scheduler::PollConfig;
use crate::filter::{DateRange, FilterSet, Selection, VendorId};

/// Project-local configuration directory.
pub const CONFIG_DIR: &str = ".floorwatch";
/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "floorwatch.toml";

pub const ENV_BASE_URL: &str = "FLOORWATCH_BASE_URL";
pub const ENV_VENDOR_ID: &str = "FLOORWATCH_VENDOR_ID";
pub const ENV_INTERVAL_MS: &str = "FLOORWATCH_INTERVAL_MS";

const MIN_SENSIBLE_INTERVAL_MS: u64 = 1000;

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_token_env() -> String {
    "FLOORWATCH_TOKEN".to_string()
}

fn default_request_timeout_ms() -> u64 {
    8000
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_env: default_token_env(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Poll loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSection {
    /// Tenant to poll; no vendor keeps the feed idle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_cycle_timeout_ms")]
    pub cycle_timeout_ms: u64,
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_cycle_timeout_ms() -> u64 {
    10_000
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            vendor_id: None,
            interval_ms: default_interval_ms(),
            cycle_timeout_ms: default_cycle_timeout_ms(),
        }
    }
}

/// Initial FilterSet, kept as raw strings so `validate` can report bad values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiltersSection {
    #[serde(default = "default_all")]
    pub project: String,
    #[serde(default = "default_all")]
    pub machine: String,
    #[serde(default = "default_all")]
    pub operator: String,
    #[serde(default = "default_all")]
    pub status: String,
    #[serde(default = "default_date_range")]
    pub date_range: String,
}

fn default_all() -> String {
    "all".to_string()
}

fn default_date_range() -> String {
    DateRange::Today.as_str().to_string()
}

impl Default for FiltersSection {
    fn default() -> Self {
        Self {
            project: default_all(),
            machine: default_all(),
            operator: default_all(),
            status: default_all(),
            date_range: default_date_range(),
        }
    }
}

impl FiltersSection {
    /// Parse into a typed FilterSet.
    pub fn to_filter_set(&self) -> Result<FilterSet> {
        Ok(FilterSet {
            project: self.project.parse::<Selection>().context("filters.project")?,
            machine: self.machine.parse::<Selection>().context("filters.machine")?,
            operator: self.operator.parse::<Selection>().context("filters.operator")?,
            status: self.status.parse::<Selection>().context("filters.status")?,
            date_range: self
                .date_range
                .parse::<DateRange>()
                .context("filters.date_range")?,
        })
    }
}

/// Relay server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaySection {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS for local frontend development
    #[serde(default)]
    pub dev: bool,
}

fn default_port() -> u16 {
    3151
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            port: default_port(),
            dev: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Directory for the daily-rolling log file; stderr only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            dir: None,
        }
    }
}

/// The complete floorwatch.toml configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FloorwatchToml {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub feed: FeedSection,
    #[serde(default)]
    pub filters: FiltersSection,
    #[serde(default)]
    pub relay: RelaySection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl FloorwatchToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse floorwatch.toml")
    }

    /// Save configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content =
            toml::to_string_pretty(self).context("Failed to serialize floorwatch.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.backend.base_url = url;
        }
        if let Some(vendor) = lookup(ENV_VENDOR_ID) {
            self.feed.vendor_id = Some(vendor);
        }
        if let Some(raw) = lookup(ENV_INTERVAL_MS) {
            self.feed.interval_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds", ENV_INTERVAL_MS))?;
        }
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.backend.base_url.trim().is_empty() {
            warnings.push("backend.base_url is empty".to_string());
        } else if let Err(e) = parse_base_url(&self.backend.base_url) {
            warnings.push(e.to_string());
        }

        if self.feed.interval_ms < MIN_SENSIBLE_INTERVAL_MS {
            warnings.push(format!(
                "feed.interval_ms = {} is below {}ms and will load the backend heavily",
                self.feed.interval_ms, MIN_SENSIBLE_INTERVAL_MS
            ));
        }

        if self.feed.cycle_timeout_ms < self.backend.request_timeout_ms {
            warnings.push(format!(
                "feed.cycle_timeout_ms ({}) is shorter than backend.request_timeout_ms ({})",
                self.feed.cycle_timeout_ms, self.backend.request_timeout_ms
            ));
        }

        if let Err(e) = self.filters.to_filter_set() {
            warnings.push(format!("{:#}", e));
        }

        if self.vendor().is_none() {
            warnings.push("feed.vendor_id is not set; the feed will stay idle".to_string());
        }

        warnings
    }

    pub fn vendor(&self) -> Option<VendorId> {
        self.feed.vendor_id.as_deref().and_then(VendorId::parse)
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// File the settings were read from, if any
    pub source: Option<PathBuf>,
    pub toml: FloorwatchToml,
    /// Problems noticed while resolving that did not stop it
    pub notices: Vec<String>,
}

impl Config {
    /// Project-local config path under `project_dir`.
    pub fn project_path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Per-user config path, if the platform has a config directory.
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("floorwatch").join(CONFIG_FILE))
    }

    /// Locate and read the config file, then apply environment overrides.
    ///
    /// An explicit path must exist. Otherwise the project-local file wins
    /// over the per-user file, and defaults apply when neither exists.
    pub fn resolve(explicit: Option<&Path>, project_dir: &Path) -> Result<Self> {
        let mut notices = Vec::new();
        if let Some(notice) = load_dotenv(&project_dir.join(".env")) {
            notices.push(notice);
        }

        let source = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => [Some(Self::project_path(project_dir)), Self::user_path()]
                .into_iter()
                .flatten()
                .find(|p| p.exists()),
        };

        let mut toml = match &source {
            Some(path) => FloorwatchToml::load(path)?,
            None => FloorwatchToml::default(),
        };
        toml.apply_env(|name| std::env::var(name).ok())?;

        Ok(Self {
            source,
            toml,
            notices,
        })
    }

    pub fn vendor(&self) -> Option<VendorId> {
        self.toml.vendor()
    }

    pub fn filter_set(&self) -> Result<FilterSet> {
        self.toml.filters.to_filter_set()
    }

    /// Bearer token from the environment variable named by `token_env`.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.toml.backend.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.toml.backend.request_timeout_ms)
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig::default()
            .with_interval(Duration::from_millis(self.toml.feed.interval_ms.max(1)))
            .with_cycle_timeout(Duration::from_millis(self.toml.feed.cycle_timeout_ms))
    }

    /// Build the HTTP client for the configured backend.
    pub fn client(&self) -> Result<HttpTrackTraceClient> {
        HttpTrackTraceClient::new(
            &self.toml.backend.base_url,
            self.token(),
            self.request_timeout(),
        )
        .context("Failed to configure the track-trace client")
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.notices.clone();
        warnings.extend(self.toml.validate());
        warnings
    }
}

/// Load a `.env` file into the process environment. A missing file is fine;
/// anything else comes back as a notice.
fn load_dotenv(path: &Path) -> Option<String> {
    match dotenvy::from_path(path) {
        Ok(()) => None,
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => Some(format!("Ignoring {}: {}", path.display(), e)),
    }
}
