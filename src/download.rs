use crate::config::DownloaderConfig;
use crate::crawlers::{BrowserPage, scroll_page};
use crate::error::{Error, Result};
use crate::filter::LinkFilter;
use crate::results::{DownloadKind, DownloadedFile, PageReport, RunSummary};
use crate::utils::{pdf_filename, sanitize_filename};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Browser temp files that mean a download is still in flight
const PARTIAL_SUFFIXES: [&str; 3] = [".crdownload", ".part", ".tmp"];

const DOWNLOAD_POLL: Duration = Duration::from_millis(200);

const EXPAND_PAUSE: Duration = Duration::from_millis(600);

/// Settings for processing root pages
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Flat directory every file is written to
    pub out_dir: PathBuf,
    pub page_timeout: Duration,
    pub click_timeout: Duration,
    pub scroll_step_px: i64,
    pub scroll_pause: Duration,
    pub expand_labels: Vec<String>,
    pub download_labels: Vec<String>,
}

impl DownloadOptions {
    pub fn from_config(config: &DownloaderConfig, out_dir: PathBuf) -> Self {
        Self {
            out_dir,
            page_timeout: config.page_timeout(),
            click_timeout: config.click_timeout(),
            scroll_step_px: config.scroll_step_px,
            scroll_pause: config.scroll_pause(),
            expand_labels: config.expand_labels.clone(),
            download_labels: config.download_labels.clone(),
        }
    }
}

/// Visits root pages one at a time and saves their files
pub struct Downloader<'a> {
    filter: &'a LinkFilter,
    options: DownloadOptions,
}

impl<'a> Downloader<'a> {
    pub fn new(filter: &'a LinkFilter, options: DownloadOptions) -> Self {
        Self { filter, options }
    }

    /// Process every root in order. Stops early only when the session turns out
    /// to be unauthenticated.
    pub async fn run<P: BrowserPage + ?Sized>(
        &self,
        page: &mut P,
        roots: &[Url],
    ) -> Result<RunSummary> {
        std::fs::create_dir_all(&self.options.out_dir)?;
        page.set_page_timeout(self.options.page_timeout).await?;

        let mut pages = Vec::with_capacity(roots.len());
        for root in roots {
            let report = self.process_root(page, root).await?;
            if report.skipped.is_none() {
                println!("  -> Files downloaded on this page: {}", report.files.len());
            }
            pages.push(report);
        }

        Ok(RunSummary {
            out_dir: self.options.out_dir.clone(),
            pages,
        })
    }

    /// Load one root page and save whatever it offers
    pub async fn process_root<P: BrowserPage + ?Sized>(
        &self,
        page: &mut P,
        root: &Url,
    ) -> Result<PageReport> {
        println!("\n=== Page: {}", root);

        let landed = match page.goto(root).await {
            Ok(landed) => landed,
            Err(e) => {
                println!("  Load failed, skipping ({})", e);
                ::log::warn!("Skipping {}: {}", root, e);
                return Ok(PageReport::skipped(root.clone(), e.to_string()));
            }
        };
        if self.filter.is_login_redirect(&landed) {
            return Err(Error::AuthRequired(root.to_string()));
        }

        let mut report = PageReport::new(root.clone());

        self.scroll(page, 8).await;
        self.expand(page).await;
        self.scroll(page, 4).await;

        report.files.extend(self.click_downloads(page).await);

        match page.parse().await {
            Ok(parsed) => {
                report.title = parsed.title;
                let pdfs: Vec<Url> = parsed
                    .links
                    .into_iter()
                    .filter(|link| self.filter.is_pdf(link))
                    .collect();
                report.files.extend(self.direct_pdfs(page, &pdfs).await);
            }
            Err(e) => ::log::warn!("Could not read links on {}: {}", root, e),
        }

        Ok(report)
    }

    async fn scroll<P: BrowserPage + ?Sized>(&self, page: &mut P, times: usize) {
        if let Err(e) = scroll_page(
            page,
            times,
            self.options.scroll_step_px,
            self.options.scroll_pause,
        )
        .await
        {
            ::log::debug!("Scrolling failed: {}", e);
        }
    }

    /// Open collapsed sections so every download control is rendered
    async fn expand<P: BrowserPage + ?Sized>(&self, page: &mut P) {
        for label in &self.options.expand_labels {
            match page.click_text(label).await {
                Ok(true) => {
                    ::log::debug!("Clicked expand control {:?}", label);
                    page.pause(EXPAND_PAUSE).await;
                }
                Ok(false) => {}
                Err(e) => ::log::trace!("Expand control {:?} not usable: {}", label, e),
            }
        }
    }

    /// Click each download control and keep the files the browser saves
    async fn click_downloads<P: BrowserPage + ?Sized>(&self, page: &mut P) -> Vec<DownloadedFile> {
        let labels = &self.options.download_labels;
        let count = match page.count_labeled(labels).await {
            Ok(count) => count,
            Err(e) => {
                ::log::warn!("Could not look up download controls: {}", e);
                return Vec::new();
            }
        };
        ::log::debug!("Found {} download controls", count);

        let mut files = Vec::new();
        for index in 0..count {
            let before = match list_files(&self.options.out_dir) {
                Ok(before) => before,
                Err(e) => {
                    ::log::warn!("Cannot read {}: {}", self.options.out_dir.display(), e);
                    break;
                }
            };

            match page.click_labeled(labels, index).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    ::log::debug!("Download control {} not clickable: {}", index, e);
                    continue;
                }
            }

            // No download event within the timeout: the control led elsewhere
            let Some(name) = self.wait_for_new_file(&before).await else {
                ::log::debug!("Download control {} produced no file", index);
                continue;
            };

            let name = self.settle_name(name);
            println!("    + click-download: {}", name);
            files.push(DownloadedFile {
                name,
                kind: DownloadKind::Click,
            });
        }
        files
    }

    async fn wait_for_new_file(&self, before: &HashSet<String>) -> Option<String> {
        let deadline = Instant::now() + self.options.click_timeout;
        loop {
            if let Ok(now) = list_files(&self.options.out_dir) {
                let finished = now
                    .into_iter()
                    .filter(|name| !before.contains(name))
                    .find(|name| !is_partial(name));
                if finished.is_some() {
                    return finished;
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(DOWNLOAD_POLL).await;
        }
    }

    /// Rename a browser-saved file to its sanitized form
    fn settle_name(&self, name: String) -> String {
        let clean = sanitize_filename(&name);
        if clean == name {
            return name;
        }
        let dir = &self.options.out_dir;
        match std::fs::rename(dir.join(&name), dir.join(&clean)) {
            Ok(()) => clean,
            Err(e) => {
                ::log::warn!("Could not rename {} to {}: {}", name, clean, e);
                name
            }
        }
    }

    /// GET each PDF link and write the ones that really are PDFs
    async fn direct_pdfs<P: BrowserPage + ?Sized>(
        &self,
        page: &mut P,
        links: &[Url],
    ) -> Vec<DownloadedFile> {
        let mut files = Vec::new();
        for link in links {
            match self.fetch_pdf(page, link).await {
                Ok(Some(name)) => {
                    println!("    + direct-pdf: {}", name);
                    files.push(DownloadedFile {
                        name,
                        kind: DownloadKind::Direct,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    println!("    ! direct error: {} ({})", link, e);
                    ::log::warn!("Fetching {} failed: {}", link, e);
                }
            }
        }
        files
    }

    async fn fetch_pdf<P: BrowserPage + ?Sized>(
        &self,
        page: &mut P,
        link: &Url,
    ) -> Result<Option<String>> {
        let asset = page.fetch(link).await?;
        if !asset.is_success() {
            ::log::debug!("{} answered {}", link, asset.status);
            return Ok(None);
        }
        if !asset.is_pdf() {
            ::log::debug!(
                "{} is {:?}, not a PDF",
                link,
                asset.content_type.as_deref().unwrap_or("untyped")
            );
            return Ok(None);
        }

        let name = pdf_filename(link, asset.content_disposition.as_deref());
        // Same name as an earlier file: the later download wins
        tokio::fs::write(self.options.out_dir.join(&name), &asset.body).await?;
        Ok(Some(name))
    }
}

fn is_partial(name: &str) -> bool {
    name.starts_with('.') || PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

fn list_files(dir: &Path) -> std::io::Result<HashSet<String>> {
    let mut names = HashSet::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}
