use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for login, discovery and download runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Page opened for login when no seed is given
    #[serde(default = "default_home_url")]
    pub home_url: String,

    /// Where the serialized session state lives
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Browser profile directory used by the interactive login
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,

    /// Regex matched against a link's path to decide if it is a root page
    #[serde(default = "default_root_pattern")]
    pub root_pattern: String,

    /// Regex matched against the landed URL; a match means the session is not authenticated
    #[serde(default = "default_login_redirect_pattern")]
    pub login_redirect_pattern: String,

    /// Maximum number of pages visited during discovery
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Links with more slashes than this in their path are not followed
    #[serde(default = "default_max_link_depth")]
    pub max_link_depth: usize,

    /// Page load timeout while downloading
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    /// Page load timeout while discovering
    #[serde(default = "default_discover_timeout_secs")]
    pub discover_timeout_secs: u64,

    /// How long to wait for a clicked download to land in the output directory
    #[serde(default = "default_click_timeout_ms")]
    pub click_timeout_ms: u64,

    #[serde(default = "default_scroll_step_px")]
    pub scroll_step_px: i64,

    #[serde(default = "default_scroll_pause_ms")]
    pub scroll_pause_ms: u64,

    /// Texts of controls that reveal collapsed catalog sections
    #[serde(default = "default_expand_labels")]
    pub expand_labels: Vec<String>,

    /// Texts (or aria-labels) of controls that trigger a file download
    #[serde(default = "default_download_labels")]
    pub download_labels: Vec<String>,
}

impl DownloaderConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every navigation or walk a no-op
    pub fn validate(&self) -> Result<()> {
        if self.page_timeout_secs == 0 || self.discover_timeout_secs == 0 {
            return Err(Error::Config("page timeouts must be at least 1s".to_string()));
        }
        if self.max_pages == 0 {
            return Err(Error::Config("max_pages must be at least 1".to_string()));
        }
        if self.download_labels.iter().any(|l| l.trim().is_empty()) {
            return Err(Error::Config("download_labels must not contain blanks".to_string()));
        }
        Ok(())
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn discover_timeout(&self) -> Duration {
        Duration::from_secs(self.discover_timeout_secs)
    }

    pub fn click_timeout(&self) -> Duration {
        Duration::from_millis(self.click_timeout_ms)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        // Every field is defaulted, so an empty object is a complete config
        Self {
            webdriver_url: default_webdriver_url(),
            home_url: default_home_url(),
            state_file: default_state_file(),
            profile_dir: default_profile_dir(),
            root_pattern: default_root_pattern(),
            login_redirect_pattern: default_login_redirect_pattern(),
            max_pages: default_max_pages(),
            max_link_depth: default_max_link_depth(),
            page_timeout_secs: default_page_timeout_secs(),
            discover_timeout_secs: default_discover_timeout_secs(),
            click_timeout_ms: default_click_timeout_ms(),
            scroll_step_px: default_scroll_step_px(),
            scroll_pause_ms: default_scroll_pause_ms(),
            expand_labels: default_expand_labels(),
            download_labels: default_download_labels(),
        }
    }
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_home_url() -> String {
    "https://online-academy.fishhuang.com/".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from("state.json")
}

fn default_profile_dir() -> PathBuf {
    PathBuf::from(".pw-user")
}

fn default_root_pattern() -> String {
    r"/learning/megacombo/[0-9a-fA-F-]{36}$".to_string()
}

fn default_login_redirect_pattern() -> String {
    r"(?i)/(users/)?(login|sign_in|signin)\b".to_string()
}

fn default_max_pages() -> usize {
    100
}

fn default_max_link_depth() -> usize {
    5
}

fn default_page_timeout_secs() -> u64 {
    20
}

fn default_discover_timeout_secs() -> u64 {
    15
}

fn default_click_timeout_ms() -> u64 {
    3000
}

fn default_scroll_step_px() -> i64 {
    1400
}

fn default_scroll_pause_ms() -> u64 {
    350
}

fn default_expand_labels() -> Vec<String> {
    [
        "Expand", "Show more", "Load more", "Catalog", "All", "Everything", "展開", "顯示更多",
        "載入更多", "目錄", "全部", "所有",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_download_labels() -> Vec<String> {
    vec!["下載".to_string(), "Download".to_string()]
}
