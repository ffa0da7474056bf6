use crate::config::DownloaderConfig;
use crate::crawlers::{BrowserPage, scroll_page};
use crate::error::Result;
use crate::filter::LinkFilter;
use std::collections::{HashSet, VecDeque};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Bounds and pacing for a discovery walk
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    /// Stop after visiting this many pages
    pub max_pages: usize,
    /// Stop once this many roots are known
    pub max_roots: usize,
    pub scroll_times: usize,
    pub scroll_step_px: i64,
    pub scroll_pause: Duration,
    pub page_timeout: Duration,
}

impl DiscoverOptions {
    pub fn from_config(config: &DownloaderConfig, max_roots: usize) -> Self {
        Self {
            max_pages: config.max_pages,
            max_roots,
            scroll_times: 4,
            scroll_step_px: config.scroll_step_px,
            scroll_pause: config.scroll_pause(),
            page_timeout: config.discover_timeout(),
        }
    }
}

/// Breadth-first walk from `seeds`, collecting root pages in the order they are first seen.
///
/// Only same-site links are considered. Pages that fail to load are skipped.
pub async fn discover<P: BrowserPage + ?Sized>(
    page: &mut P,
    seeds: &[Url],
    filter: &LinkFilter,
    options: &DiscoverOptions,
) -> Result<Vec<Url>> {
    page.set_page_timeout(options.page_timeout).await?;

    let mut queue: VecDeque<Url> = seeds.iter().map(|s| filter.normalize_url(s)).collect();
    let mut visited: HashSet<String> = HashSet::new();
    let mut found: Vec<Url> = Vec::new();
    let mut found_set: HashSet<String> = HashSet::new();

    'walk: while let Some(url) = queue.pop_front() {
        if visited.len() >= options.max_pages || found.len() >= options.max_roots {
            break;
        }
        if !visited.insert(url.to_string()) {
            continue;
        }

        ::log::debug!("Discovering on {} ({} visited)", url, visited.len());
        if let Err(e) = page.goto(&url).await {
            ::log::warn!("Skipping {} during discovery: {}", url, e);
            continue;
        }
        if let Err(e) = scroll_page(
            page,
            options.scroll_times,
            options.scroll_step_px,
            options.scroll_pause,
        )
        .await
        {
            ::log::debug!("Scrolling {} failed: {}", url, e);
        }

        let parsed = match page.parse().await {
            Ok(parsed) => parsed,
            Err(e) => {
                ::log::warn!("Could not read links on {}: {}", url, e);
                continue;
            }
        };

        for link in parsed.links {
            let link = filter.normalize_url(&link);
            if !filter.same_site(&link, &url) {
                continue;
            }

            if filter.is_root(&link) && found_set.insert(link.to_string()) {
                ::log::info!("Found root: {}", link);
                found.push(link.clone());
                if found.len() >= options.max_roots {
                    break 'walk;
                }
            }

            if filter.should_follow(&link, &url) && !visited.contains(link.as_str()) {
                queue.push_back(link);
            }
        }
    }

    ::log::info!(
        "Discovery visited {} pages and found {} roots",
        visited.len(),
        found.len()
    );
    Ok(found)
}

/// Write roots one per line
pub fn save_roots(path: &Path, roots: &[Url]) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    for root in roots {
        writeln!(file, "{}", root)?;
    }
    Ok(())
}
