use crate::error::Result;
use crate::parsers::ParsedPage;
use crate::results::FetchedAsset;
use crate::session::{StorageEntry, StoredCookie};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// One browser tab, driven sequentially.
///
/// Discovery, downloading and session handling only talk to the browser
/// through this trait, so they can run against a WebDriver session or a
/// scripted stand-in.
#[async_trait(?Send)]
pub trait BrowserPage {
    /// Navigate and return the URL the browser ended up on
    async fn goto(&mut self, url: &Url) -> Result<Url>;

    /// URL of the current document
    async fn current_url(&mut self) -> Result<Url>;

    /// Upper bound for a single navigation
    async fn set_page_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Parse the rendered document
    async fn parse(&mut self) -> Result<ParsedPage>;

    /// Scroll the viewport down by `delta_px`
    async fn scroll(&mut self, delta_px: i64) -> Result<()>;

    async fn pause(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Click the first visible element whose text contains `label`.
    /// Returns whether anything was clicked.
    async fn click_text(&mut self, label: &str) -> Result<bool>;

    /// Number of elements whose text or aria-label carries one of `labels`
    async fn count_labeled(&mut self, labels: &[String]) -> Result<usize>;

    /// Click the `index`-th element counted by [`BrowserPage::count_labeled`].
    /// Invisible elements are left alone and reported as `false`.
    async fn click_labeled(&mut self, labels: &[String], index: usize) -> Result<bool>;

    /// GET a URL with the browser's cookies
    async fn fetch(&mut self, url: &Url) -> Result<FetchedAsset>;

    /// Cookies visible to the current document
    async fn cookies(&mut self) -> Result<Vec<StoredCookie>>;

    /// Add a cookie; the current document must be on a matching domain
    async fn add_cookie(&mut self, cookie: &StoredCookie) -> Result<()>;

    /// localStorage of the current origin
    async fn local_storage(&mut self) -> Result<Vec<StorageEntry>>;

    async fn set_local_storage(&mut self, entries: &[StorageEntry]) -> Result<()>;
}

/// Scroll `times` steps with a pause after each, to let lazy content render
pub async fn scroll_page<P: BrowserPage + ?Sized>(
    page: &mut P,
    times: usize,
    delta_px: i64,
    pause: Duration,
) -> Result<()> {
    for _ in 0..times {
        page.scroll(delta_px).await?;
        page.pause(pause).await;
    }
    Ok(())
}
