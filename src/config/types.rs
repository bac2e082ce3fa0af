use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Slug-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub api: ApiConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub input: InputConfig,
    pub storage: StorageConfig,
}

/// Crawl pacing, retry and checkpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Total fetch attempts per item, including the first
    pub max_attempts: u32,

    /// Fixed delay between failed attempts (milliseconds)
    pub retry_delay_ms: u64,

    /// Lower bound of the randomized delay between items (milliseconds)
    pub politeness_min_ms: u64,

    /// Upper bound of the randomized delay between items (milliseconds)
    pub politeness_max_ms: u64,

    /// Pause before every auxiliary fetch (milliseconds)
    pub auxiliary_delay_ms: u64,

    /// Number of completed items between progress checkpoints
    pub checkpoint_interval: u32,

    /// Timeout applied to each HTTP request (seconds)
    pub request_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 5_000,
            politeness_min_ms: 1_000,
            politeness_max_ms: 5_000,
            auxiliary_delay_ms: 1_000,
            checkpoint_interval: 10,
            request_timeout_secs: 10,
        }
    }
}

impl CrawlerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn auxiliary_delay(&self) -> Duration {
        Duration::from_millis(self.auxiliary_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Remote API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiConfig {
    /// Base URL that `home/{id}` and `home/services/{id}` are resolved against
    pub base_url: String,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// Email address for crawler-related contact
    pub contact_email: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SlugHarvester".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_email: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version` or `Name/Version (+email)`
    pub fn header_value(&self) -> String {
        match &self.contact_email {
            Some(email) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, email
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Candidate id source configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InputConfig {
    /// JSON file holding the candidate records
    pub candidates_path: String,

    /// Field of each candidate record that holds its id
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

fn default_id_field() -> String {
    "username".to_string()
}

/// Which persistence backend holds progress and records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    File,
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Key identifying the progress state of this crawl
    #[serde(default = "default_run_key")]
    pub run_key: String,

    /// SQLite database file (sqlite backend)
    pub database_path: Option<String>,

    /// JSON progress file (file backend)
    pub state_path: Option<String>,

    /// JSON-Lines record file (file backend)
    pub output_path: Option<String>,
}

fn default_run_key() -> String {
    "main_scraper".to_string()
}
