//! Scripted in-memory site used by the unit tests in place of a real browser.

use crate::crawlers::crawler::BrowserPage;
use crate::error::{Error, Result};
use crate::parsers::ParsedPage;
use crate::results::FetchedAsset;
use crate::session::{StorageEntry, StoredCookie};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Default)]
pub struct FakeSite {
    links: HashMap<Url, Vec<Url>>,
    titles: HashMap<Url, String>,
    redirects: HashMap<Url, Url>,
    broken: HashSet<Url>,
    assets: HashMap<Url, FetchedAsset>,
    click_files: HashMap<Url, Vec<(String, Vec<u8>)>>,
    download_dir: Option<PathBuf>,
    cookies: Vec<StoredCookie>,
    storage: Vec<StorageEntry>,
    current: Option<Url>,
    pub visits: Vec<Url>,
    pub fetches: Vec<Url>,
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: &str, links: &[&str]) -> Self {
        self.links
            .insert(url(page), links.iter().map(|l| url(l)).collect());
        self
    }

    pub fn with_title(mut self, page: &str, title: &str) -> Self {
        self.titles.insert(url(page), title.to_string());
        self
    }

    pub fn with_redirect(mut self, from: &Url, to: &str) -> Self {
        self.redirects.insert(from.clone(), url(to));
        self
    }

    pub fn with_broken(mut self, page: &str) -> Self {
        self.broken.insert(url(page));
        self
    }

    pub fn with_pdf(mut self, link: &str, disposition: Option<&str>, body: &[u8]) -> Self {
        self.assets.insert(
            url(link),
            FetchedAsset {
                status: 200,
                content_type: Some("application/pdf".to_string()),
                content_disposition: disposition.map(|d| d.to_string()),
                body: body.to_vec(),
            },
        );
        self
    }

    pub fn with_asset(mut self, link: &str, asset: FetchedAsset) -> Self {
        self.assets.insert(url(link), asset);
        self
    }

    /// Clicking the n-th download control on `page` drops `files[n]` into the download dir
    pub fn with_click_download(mut self, page: &str, name: &str, body: &[u8]) -> Self {
        self.click_files
            .entry(url(page))
            .or_default()
            .push((name.to_string(), body.to_vec()));
        self
    }

    pub fn with_download_dir(mut self, dir: PathBuf) -> Self {
        self.download_dir = Some(dir);
        self
    }

    pub fn with_cookie(mut self, cookie: StoredCookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn with_local_storage(mut self, name: &str, value: &str) -> Self {
        self.storage.push(StorageEntry {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn cookie_names(&self) -> Vec<String> {
        self.cookies.iter().map(|c| c.name.clone()).collect()
    }

    pub fn storage_len(&self) -> usize {
        self.storage.len()
    }

    fn current(&self) -> Result<&Url> {
        self.current
            .as_ref()
            .ok_or_else(|| Error::Config("no page loaded".to_string()))
    }
}

#[async_trait(?Send)]
impl BrowserPage for FakeSite {
    async fn goto(&mut self, target: &Url) -> Result<Url> {
        self.visits.push(target.clone());
        if self.broken.contains(target) {
            return Err(Error::Timeout {
                url: target.to_string(),
                secs: 0,
            });
        }
        let landed = self
            .redirects
            .get(target)
            .cloned()
            .unwrap_or_else(|| target.clone());
        self.current = Some(landed.clone());
        Ok(landed)
    }

    async fn current_url(&mut self) -> Result<Url> {
        Ok(self.current()?.clone())
    }

    async fn set_page_timeout(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn parse(&mut self) -> Result<ParsedPage> {
        let current = self.current()?.clone();
        let mut links = self.links.get(&current).cloned().unwrap_or_default();
        links.sort();
        links.dedup();
        Ok(ParsedPage {
            title: self.titles.get(&current).cloned(),
            links,
        })
    }

    async fn scroll(&mut self, _delta_px: i64) -> Result<()> {
        Ok(())
    }

    async fn pause(&mut self, _duration: Duration) {}

    async fn click_text(&mut self, _label: &str) -> Result<bool> {
        Ok(false)
    }

    async fn count_labeled(&mut self, _labels: &[String]) -> Result<usize> {
        let current = self.current()?;
        Ok(self.click_files.get(current).map_or(0, |f| f.len()))
    }

    async fn click_labeled(&mut self, _labels: &[String], index: usize) -> Result<bool> {
        let current = self.current()?.clone();
        let Some((name, body)) = self
            .click_files
            .get(&current)
            .and_then(|files| files.get(index))
        else {
            return Ok(false);
        };
        if let Some(dir) = &self.download_dir {
            std::fs::write(dir.join(name), body)?;
        }
        Ok(true)
    }

    async fn fetch(&mut self, link: &Url) -> Result<FetchedAsset> {
        self.fetches.push(link.clone());
        Ok(self.assets.get(link).cloned().unwrap_or(FetchedAsset {
            status: 404,
            ..FetchedAsset::default()
        }))
    }

    async fn cookies(&mut self) -> Result<Vec<StoredCookie>> {
        Ok(self.cookies.clone())
    }

    async fn add_cookie(&mut self, cookie: &StoredCookie) -> Result<()> {
        self.cookies.push(cookie.clone());
        Ok(())
    }

    async fn local_storage(&mut self) -> Result<Vec<StorageEntry>> {
        Ok(self.storage.clone())
    }

    async fn set_local_storage(&mut self, entries: &[StorageEntry]) -> Result<()> {
        self.storage.extend(entries.iter().cloned());
        Ok(())
    }
}
