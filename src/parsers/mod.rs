pub mod html;

#[cfg(test)]
mod tests;

use url::Url;

/// What a rendered page tells us
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Contents of `<title>`, whitespace-collapsed
    pub title: Option<String>,
    /// Absolute, deduplicated link targets in sorted order
    pub links: Vec<Url>,
}

/// Main parser entry point for page sources fetched from the browser
pub struct Parser;

impl Parser {
    /// Parse a page source, resolving links against the URL the browser landed on
    pub fn parse(source: &str, page_url: &Url) -> ParsedPage {
        html::parse(source, page_url)
    }
}
