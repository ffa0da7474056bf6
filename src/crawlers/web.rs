use crate::crawlers::crawler::BrowserPage;
use crate::error::{Error, Result};
use crate::parsers::{ParsedPage, Parser};
use crate::results::FetchedAsset;
use crate::session::{StorageEntry, StoredCookie, cookie_header, unix_now};
use async_trait::async_trait;
use cookie::{Cookie, SameSite};
use fantoccini::elements::Element;
use fantoccini::wd::{Capabilities, TimeoutConfiguration};
use fantoccini::{Client, ClientBuilder, Locator};
use reqwest::header::{
    CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, HeaderName, REFERER, USER_AGENT,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

/// Extra time on top of the WebDriver page-load timeout before we give up ourselves
const NAVIGATION_GRACE: Duration = Duration::from_secs(5);

const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

const FALLBACK_WEBDRIVER_URLS: [&str; 2] = [
    "http://localhost:9515", // ChromeDriver default
    "http://127.0.0.1:4444", // Try with IP instead of localhost
];

/// How to start the browser behind the WebDriver server
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub webdriver_url: String,
    pub headless: bool,
    /// Where clicked downloads are saved; must be visible to the browser's machine
    pub download_dir: Option<PathBuf>,
    /// Persistent Chrome profile, used for interactive login
    pub profile_dir: Option<PathBuf>,
    pub page_timeout: Duration,
}

/// A single Chrome tab controlled over WebDriver
pub struct WebDriverPage {
    client: Client,
    http: reqwest::Client,
    page_timeout: Duration,
    user_agent: Option<String>,
    /// Cookies replayed into this session; WebDriver only reports those of the current document
    restored: Vec<StoredCookie>,
}

impl WebDriverPage {
    /// Start a browser session and apply the page-load timeout
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let caps = capabilities(options)?;
        let client = connect_to_webdriver(&options.webdriver_url, caps).await?;

        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;

        let mut page = Self {
            client,
            http,
            page_timeout: options.page_timeout,
            user_agent: None,
            restored: Vec::new(),
        };
        page.set_page_timeout(options.page_timeout).await?;
        Ok(page)
    }

    /// End the WebDriver session, closing the browser
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }

    async fn user_agent(&mut self) -> Option<String> {
        if self.user_agent.is_none() {
            match self.client.execute("return navigator.userAgent;", vec![]).await {
                Ok(value) => self.user_agent = value.as_str().map(|s| s.to_string()),
                Err(e) => ::log::debug!("Could not read navigator.userAgent: {}", e),
            }
        }
        self.user_agent.clone()
    }

    async fn labeled_elements(&mut self, labels: &[String]) -> Result<Vec<Element>> {
        if labels.is_empty() {
            return Ok(Vec::new());
        }
        let xpath = labeled_xpath(labels);
        Ok(self.client.find_all(Locator::XPath(&xpath)).await?)
    }
}

#[async_trait(?Send)]
impl BrowserPage for WebDriverPage {
    async fn goto(&mut self, url: &Url) -> Result<Url> {
        ::log::debug!("GOTO: {}", url);
        match timeout(
            self.page_timeout + NAVIGATION_GRACE,
            self.client.goto(url.as_str()),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Timeout {
                    url: url.to_string(),
                    secs: self.page_timeout.as_secs(),
                });
            }
        }
        Ok(self.client.current_url().await?)
    }

    async fn current_url(&mut self) -> Result<Url> {
        Ok(self.client.current_url().await?)
    }

    async fn set_page_timeout(&mut self, page_timeout: Duration) -> Result<()> {
        self.client
            .update_timeouts(TimeoutConfiguration::new(None, Some(page_timeout), None))
            .await?;
        self.page_timeout = page_timeout;
        Ok(())
    }

    async fn parse(&mut self) -> Result<ParsedPage> {
        let html = self.client.source().await?;
        let url = self.client.current_url().await?;
        Ok(Parser::parse(&html, &url))
    }

    async fn scroll(&mut self, delta_px: i64) -> Result<()> {
        self.client
            .execute("window.scrollBy(0, arguments[0]);", vec![json!(delta_px)])
            .await?;
        Ok(())
    }

    async fn click_text(&mut self, label: &str) -> Result<bool> {
        let xpath = format!("//*[contains(text(), {})]", xpath_literal(label));
        let elements = self.client.find_all(Locator::XPath(&xpath)).await?;
        let Some(element) = elements.into_iter().next() else {
            return Ok(false);
        };
        if !element.is_displayed().await? {
            return Ok(false);
        }
        element.click().await?;
        Ok(true)
    }

    async fn count_labeled(&mut self, labels: &[String]) -> Result<usize> {
        Ok(self.labeled_elements(labels).await?.len())
    }

    async fn click_labeled(&mut self, labels: &[String], index: usize) -> Result<bool> {
        // Re-query each time; earlier clicks may have re-rendered the list.
        // Element Click scrolls the target into view itself.
        let elements = self.labeled_elements(labels).await?;
        let Some(element) = elements.into_iter().nth(index) else {
            return Ok(false);
        };
        if !element.is_displayed().await? {
            return Ok(false);
        }
        element.click().await?;
        Ok(true)
    }

    async fn fetch(&mut self, url: &Url) -> Result<FetchedAsset> {
        let cookies = self.cookies().await?;
        let referer = self.client.current_url().await.ok();
        let user_agent = self.user_agent().await;

        let mut request = self.http.get(url.clone());
        if let Some(header) = request_cookie_header(&cookies, &self.restored, url, unix_now()) {
            request = request.header(COOKIE, header);
        }
        if let Some(user_agent) = user_agent {
            request = request.header(USER_AGENT, user_agent);
        }
        if let Some(referer) = referer {
            request = request.header(REFERER, referer.as_str());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };
        let content_type = header(CONTENT_TYPE);
        let content_disposition = header(CONTENT_DISPOSITION);
        let body = response.bytes().await?.to_vec();

        Ok(FetchedAsset {
            status,
            content_type,
            content_disposition,
            body,
        })
    }

    async fn cookies(&mut self) -> Result<Vec<StoredCookie>> {
        let cookies = self.client.get_all_cookies().await?;
        Ok(cookies.iter().map(to_stored_cookie).collect())
    }

    async fn add_cookie(&mut self, cookie: &StoredCookie) -> Result<()> {
        self.client.add_cookie(to_browser_cookie(cookie)).await?;
        self.restored.push(cookie.clone());
        Ok(())
    }

    async fn local_storage(&mut self) -> Result<Vec<StorageEntry>> {
        let value = self
            .client
            .execute(
                "return Object.entries(window.localStorage).map(([name, value]) => ({name, value}));",
                vec![],
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn set_local_storage(&mut self, entries: &[StorageEntry]) -> Result<()> {
        let arg = serde_json::to_value(entries)?;
        self.client
            .execute(
                "for (const e of arguments[0]) { window.localStorage.setItem(e.name, e.value); }",
                vec![arg],
            )
            .await?;
        Ok(())
    }
}

/// `Cookie` header for a direct fetch. The browser's live cookies win over
/// restored ones of the same name.
fn request_cookie_header(
    live: &[StoredCookie],
    restored: &[StoredCookie],
    url: &Url,
    now: i64,
) -> Option<String> {
    let all: Vec<StoredCookie> = live.iter().chain(restored).cloned().collect();
    cookie_header(&all, url, now)
}

/// Chrome capabilities for the session
fn capabilities(options: &BrowserOptions) -> Result<Capabilities> {
    let mut args = vec!["--disable-gpu".to_string()];
    if options.headless {
        args.push("--headless=new".to_string());
    }
    if let Some(profile) = &options.profile_dir {
        args.push(format!("--user-data-dir={}", absolute(profile)?.display()));
    }

    let mut prefs = serde_json::Map::new();
    if let Some(dir) = &options.download_dir {
        let dir = absolute(dir)?;
        prefs.insert(
            "download.default_directory".to_string(),
            json!(dir.display().to_string()),
        );
        prefs.insert("download.prompt_for_download".to_string(), json!(false));
        prefs.insert("download.directory_upgrade".to_string(), json!(true));
        // Save PDFs instead of opening them in the built-in viewer
        prefs.insert("plugins.always_open_pdf_externally".to_string(), json!(true));
    }

    let mut caps = Capabilities::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({ "args": args, "prefs": prefs }),
    );
    Ok(caps)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Connects to the WebDriver instance, trying common local ports if the configured one fails
async fn connect_to_webdriver(webdriver_url: &str, caps: Capabilities) -> Result<Client> {
    let mut builder = ClientBuilder::native();
    builder.capabilities(caps);

    let first_error = match builder.connect(webdriver_url).await {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {}", webdriver_url);
            return Ok(client);
        }
        Err(e) => {
            ::log::error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
            e
        }
    };

    for url in FALLBACK_WEBDRIVER_URLS.iter() {
        if *url == webdriver_url {
            continue;
        }

        ::log::info!("Trying fallback WebDriver URL: {}", url);
        if let Ok(client) = builder.connect(url).await {
            ::log::debug!("Connected to fallback WebDriver at {}", url);
            return Ok(client);
        }
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    Err(first_error.into())
}

/// XPath union of links, buttons and aria-labelled elements carrying any of `labels`
pub fn labeled_xpath(labels: &[String]) -> String {
    labels
        .iter()
        .flat_map(|label| {
            let exact = xpath_literal(label);
            let lower = xpath_literal(&label.to_lowercase());
            [
                format!("//a[contains(., {exact})]"),
                format!("//button[contains(., {exact})]"),
                format!("//*[contains(@aria-label, {exact})]"),
                format!("//*[contains(@aria-label, {lower})]"),
            ]
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Quote a string as an XPath 1.0 literal
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

fn to_stored_cookie(cookie: &Cookie<'_>) -> StoredCookie {
    StoredCookie {
        name: cookie.name().to_string(),
        value: cookie.value().to_string(),
        domain: cookie.domain().map(|d| d.to_string()),
        path: cookie.path().map(|p| p.to_string()),
        expires: cookie.expires_datetime().map(|t| t.unix_timestamp()),
        http_only: cookie.http_only().unwrap_or(false),
        secure: cookie.secure().unwrap_or(false),
        same_site: cookie.same_site().map(|s| s.to_string()),
    }
}

/// Expiry is not replayed; restored cookies live for the browser session only
fn to_browser_cookie(stored: &StoredCookie) -> Cookie<'static> {
    let mut cookie = Cookie::new(stored.name.clone(), stored.value.clone());
    if let Some(domain) = &stored.domain {
        cookie.set_domain(domain.clone());
    }
    if let Some(path) = &stored.path {
        cookie.set_path(path.clone());
    }
    cookie.set_secure(stored.secure);
    cookie.set_http_only(stored.http_only);
    let same_site = match stored.same_site.as_deref() {
        Some(s) if s.eq_ignore_ascii_case("strict") => Some(SameSite::Strict),
        Some(s) if s.eq_ignore_ascii_case("lax") => Some(SameSite::Lax),
        Some(s) if s.eq_ignore_ascii_case("none") => Some(SameSite::None),
        _ => None,
    };
    if let Some(same_site) = same_site {
        cookie.set_same_site(same_site);
    }
    cookie
}
