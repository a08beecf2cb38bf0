// ⚙️ Configuration - timeouts, delays, endpoints and log settings
// Every component gets what it needs from here at construction time.

use crate::error::{SyncError, SyncResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// LOG CONFIG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Logging switches handed to the matcher and the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log every per-flag mismatch the identity matcher finds
    pub trace_matching: bool,

    /// Log every UI sub-step (locate, wait, click) the driver performs
    pub trace_steps: bool,

    pub format: LogFormat,
}

// ============================================================================
// SYNC CONFIG
// ============================================================================

/// Runtime configuration. All durations are in milliseconds on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Site root, without trailing slash
    pub base_url: String,

    /// Page title expected right after a successful login
    pub login_title: String,

    /// W3C WebDriver endpoint (chromedriver / geckodriver)
    pub webdriver_url: String,

    /// Use Firefox instead of Chrome
    pub firefox: bool,

    /// Run the browser headed and leave it open after the run
    pub show_browser: bool,

    /// Bound for every ordinary UI wait (visible, enabled, modal, consent)
    pub step_timeout_ms: u64,

    /// Bound for locating text areas, the toolbar button and the save acknowledgement
    pub long_timeout_ms: u64,

    /// How often bounded waits re-check their condition
    pub poll_interval_ms: u64,

    /// Settle time after navigating to an entity or versions page
    pub navigation_settle_ms: u64,

    /// Settle time before clicking a located control
    pub click_settle_ms: u64,

    /// Settle time after submitting the login form
    pub login_settle_ms: u64,

    /// Polite pause between work items
    pub item_delay_ms: u64,

    /// Fixed backoff between "not ready yet" collection responses
    pub pending_backoff_ms: u64,

    /// How many "not ready yet" responses are tolerated before giving up
    pub max_pending_retries: u32,

    pub log: LogConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            base_url: "https://boardgamegeek.com".to_string(),
            login_title: "BoardGameGeek | Gaming Unplugged Since 2000".to_string(),
            webdriver_url: "http://localhost:4444".to_string(),
            firefox: false,
            show_browser: false,
            step_timeout_ms: 5_000,
            long_timeout_ms: 10_000,
            poll_interval_ms: 250,
            navigation_settle_ms: 500,
            click_settle_ms: 200,
            login_settle_ms: 2_000,
            item_delay_ms: 100,
            pending_backoff_ms: 5_000,
            max_pending_retries: 24,
            log: LogConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a JSON file. Missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: SyncConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make bounded waits meaningless.
    pub fn validate(&self) -> SyncResult<()> {
        let invalid =
            |message: &str| -> SyncResult<()> { Err(SyncError::Config(message.to_string())) };

        if self.base_url.trim().is_empty() {
            return invalid("base_url must not be empty");
        }
        if self.poll_interval_ms == 0 {
            return invalid("poll_interval_ms must be greater than zero");
        }
        if self.step_timeout_ms == 0 || self.long_timeout_ms == 0 {
            return invalid("timeouts must be greater than zero");
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn long_timeout(&self) -> Duration {
        Duration::from_millis(self.long_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    pub fn login_settle(&self) -> Duration {
        Duration::from_millis(self.login_settle_ms)
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn pending_backoff(&self) -> Duration {
        Duration::from_millis(self.pending_backoff_ms)
    }

    pub fn entity_url(&self, entity_id: u64) -> String {
        format!("{}/boardgame/{}", self.base_url(), entity_id)
    }

    pub fn login_url(&self) -> String {
        format!("{}/login", self.base_url())
    }

    pub fn user_collection_url(&self, username: &str) -> String {
        format!(
            "{}/collection/user/{}",
            self.base_url(),
            urlencoding::encode(username)
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
