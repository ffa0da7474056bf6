use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that end a run. Per-page and per-file failures are logged and
/// skipped by the caller instead of being surfaced through this type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not logged in: {0} not found (run with --login first)")]
    NotLoggedIn(PathBuf),
    #[error("session state {path} is unusable: {reason}")]
    InvalidSession { path: PathBuf, reason: String },
    #[error("login was not completed: no cookies were captured from {0}")]
    LoginIncomplete(String),
    #[error("authentication required: {0} redirected to the login page (run --login again)")]
    AuthRequired(String),
    #[error("{source_file}:{line}: invalid root URL {value:?}: {reason}")]
    InvalidRoot {
        source_file: String,
        line: usize,
        value: String,
        reason: url::ParseError,
    },
    #[error("no root source: pass --roots-file or --discover")]
    NoRootSource,
    #[error("failed to start WebDriver session: {0}")]
    WebDriver(#[from] fantoccini::error::NewSessionError),
    #[error("webdriver command failed: {0}")]
    Command(#[from] fantoccini::error::CmdError),
    #[error("timed out after {secs}s loading {url}")]
    Timeout { url: String, secs: u64 },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),
    #[error("configuration error: {0}")]
    Config(String),
}
