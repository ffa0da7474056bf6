use crate::parsers::ParsedPage;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Parses an HTML document into its title and absolute links
pub fn parse(html: &str, base: &Url) -> ParsedPage {
    let doc = Html::parse_document(html);

    let title_selector = Selector::parse("title").unwrap();
    let title = doc
        .select(&title_selector)
        .next()
        .map(|t| t.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty());

    let links = resolve_links(extract_hrefs(&doc), base);

    ::log::debug!("HTML parser found {} links on {}", links.len(), base);

    ParsedPage { title, links }
}

/// Parses HTML content and only extracts absolute links
pub fn parse_links_only(html: &str, base: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    resolve_links(extract_hrefs(&doc), base)
}

fn extract_hrefs(doc: &Html) -> Vec<String> {
    let link_selector = Selector::parse("a[href]").unwrap();
    doc.select(&link_selector)
        .filter_map(|e| e.value().attr("href"))
        .map(|s| s.trim().to_string())
        .collect()
}

/// Resolves hrefs against the page URL, dropping in-page anchors and script links.
/// The result is deduplicated and sorted.
fn resolve_links(hrefs: Vec<String>, base: &Url) -> Vec<Url> {
    let mut links = BTreeSet::new();
    for href in hrefs {
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }
        match base.join(&href) {
            Ok(url) => {
                links.insert(url);
            }
            Err(e) => ::log::trace!("Skipping unresolvable href {:?}: {}", href, e),
        }
    }
    links.into_iter().collect()
}
