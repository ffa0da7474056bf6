// Re-export modules
pub mod config;
pub mod crawlers;
pub mod discover;
pub mod download;
pub mod error;
pub mod filter;
pub mod parsers;
pub mod results;
pub mod roots;
pub mod session;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::DownloaderConfig;
pub use error::{Error, Result};
pub use results::RunSummary;

use crawlers::{BrowserOptions, BrowserPage, WebDriverPage};
use discover::DiscoverOptions;
use download::{DownloadOptions, Downloader};
use filter::{LinkFilter, LinkFilterConfig};
use session::{SessionManager, SessionState};
use std::path::PathBuf;
use tokio::io::BufReader;
use url::Url;

/// Where the root pages of a download run come from
#[derive(Debug, Clone)]
pub enum RootSource {
    /// Newline-delimited URL list
    File(PathBuf),
    /// Seed pages to discover roots from
    Discover(Vec<Url>),
}

/// Main builder for login and download runs
pub struct Job {
    config: DownloaderConfig,
    out_dir: PathBuf,
    max_roots: usize,
    headless: bool,
    save_roots: Option<PathBuf>,
}

impl Job {
    /// Create a new Job with the given configuration
    pub fn new(mut config: DownloaderConfig) -> Self {
        // Override the WebDriver URL with an environment variable if provided
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                config.webdriver_url = webdriver_url;
            }
        }

        Self {
            config,
            out_dir: PathBuf::from("downloads"),
            max_roots: 500,
            headless: false,
            save_roots: None,
        }
    }

    /// Use this WebDriver server instead of the configured one
    pub fn with_webdriver_url(mut self, webdriver_url: Option<String>) -> Self {
        if let Some(webdriver_url) = webdriver_url {
            self.config.webdriver_url = webdriver_url;
        }
        self
    }

    /// Set the flat output directory
    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    /// Set the maximum number of root pages processed
    pub fn with_max_roots(mut self, max_roots: usize) -> Self {
        self.max_roots = max_roots;
        self
    }

    /// Run the download browser without a window
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Write discovered roots to this file
    pub fn with_save_roots(mut self, path: Option<PathBuf>) -> Self {
        self.save_roots = path;
        self
    }

    fn link_filter(&self) -> Result<LinkFilter> {
        Ok(LinkFilter::new(LinkFilterConfig::from_config(&self.config))?)
    }

    /// Interactive login: open a visible browser on `seed`, wait for Enter,
    /// save the session state, and close the browser.
    pub async fn login(&self, seed: Option<&str>) -> Result<SessionState> {
        let seed = Url::parse(seed.unwrap_or(&self.config.home_url))?;
        let filter = self.link_filter()?;

        let options = BrowserOptions {
            webdriver_url: self.config.webdriver_url.clone(),
            headless: false,
            download_dir: None,
            profile_dir: Some(self.config.profile_dir.clone()),
            page_timeout: self.config.page_timeout(),
        };
        let mut page = WebDriverPage::launch(&options).await?;

        let mut stdin = BufReader::new(tokio::io::stdin());
        let result = SessionManager::new(&filter)
            .login(&mut page, &seed, &mut stdin, &self.config.state_file)
            .await;

        close_quietly(page).await;
        let state = result?;
        println!("Saved login state to {}", self.config.state_file.display());
        Ok(state)
    }

    /// Download mode: restore the saved session, collect roots, and fetch
    /// every root's files. Returns `None` when there was nothing to process.
    pub async fn download(&self, source: RootSource) -> Result<Option<RunSummary>> {
        // Fail before starting a browser when there is no usable session
        let state = SessionState::load(&self.config.state_file)?;
        let filter = self.link_filter()?;
        std::fs::create_dir_all(&self.out_dir)?;

        let options = BrowserOptions {
            webdriver_url: self.config.webdriver_url.clone(),
            headless: self.headless,
            download_dir: Some(self.out_dir.clone()),
            profile_dir: None,
            page_timeout: self.config.page_timeout(),
        };
        let mut page = WebDriverPage::launch(&options).await?;

        let result = self.download_with(&mut page, &filter, &state, source).await;
        close_quietly(page).await;
        result
    }

    async fn download_with<P: BrowserPage + ?Sized>(
        &self,
        page: &mut P,
        filter: &LinkFilter,
        state: &SessionState,
        source: RootSource,
    ) -> Result<Option<RunSummary>> {
        SessionManager::new(filter).restore(page, state).await?;

        let mut roots = match source {
            RootSource::File(path) => roots::read_roots_file(&path)?,
            RootSource::Discover(seeds) => {
                println!("Discovering megacombo pages from {} seed(s)...", seeds.len());
                let options = DiscoverOptions::from_config(&self.config, self.max_roots);
                let found = discover::discover(page, &seeds, filter, &options).await?;
                if let Some(path) = &self.save_roots {
                    discover::save_roots(path, &found)?;
                    println!("Roots written to: {}", path.display());
                }
                found
            }
        };

        if roots.is_empty() {
            println!("No megacombo pages found.");
            return Ok(None);
        }

        roots.truncate(self.max_roots);
        println!("Preparing to process {} page(s)", roots.len());

        let options = DownloadOptions::from_config(&self.config, self.out_dir.clone());
        let summary = Downloader::new(filter, options).run(page, &roots).await?;
        Ok(Some(summary))
    }
}

async fn close_quietly(page: WebDriverPage) {
    if let Err(e) = page.close().await {
        ::log::warn!("Failed to close browser session: {}", e);
    }
}
