use crate::config::DownloaderConfig;
use regex::Regex;
use url::Url;

/// Configuration for classifying links found on a page
#[derive(Debug, Clone)]
pub struct LinkFilterConfig {
    /// Regex a link's path must match to be treated as a root page
    pub root_pattern: String,

    /// Links with more than this many `/` in their path are not followed
    pub max_link_depth: usize,

    /// Regex patterns for links that are never followed (these take precedence)
    pub exclude_patterns: Vec<String>,

    /// Regex matched against a landed URL to detect a bounce to the login page
    pub login_redirect_pattern: Option<String>,
}

/// Direct PDF links, with or without a query string
const PDF_PATTERN: &str = r"(?i)\.pdf($|\?)";

impl LinkFilterConfig {
    pub fn from_config(config: &DownloaderConfig) -> Self {
        Self {
            root_pattern: config.root_pattern.clone(),
            max_link_depth: config.max_link_depth,
            exclude_patterns: vec![PDF_PATTERN.to_string()],
            login_redirect_pattern: Some(config.login_redirect_pattern.clone()),
        }
    }
}

/// Decides which links are roots, which are worth walking, and which are PDFs
#[derive(Debug, Clone)]
pub struct LinkFilter {
    config: LinkFilterConfig,
    root_regex: Regex,
    pdf_regex: Regex,
    exclude_regexes: Vec<Regex>,
    login_regex: Option<Regex>,
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self::new(LinkFilterConfig::from_config(&DownloaderConfig::default()))
            .expect("Default regex patterns should be valid")
    }
}

impl LinkFilter {
    /// Create a new link filter from configuration
    pub fn new(config: LinkFilterConfig) -> Result<Self, regex::Error> {
        let root_regex = Regex::new(&config.root_pattern)?;
        let pdf_regex = Regex::new(PDF_PATTERN)?;

        let mut exclude_regexes = Vec::with_capacity(config.exclude_patterns.len());
        for pattern in &config.exclude_patterns {
            exclude_regexes.push(Regex::new(pattern)?);
        }

        let login_regex = match &config.login_redirect_pattern {
            Some(pattern) => Some(Regex::new(pattern)?),
            None => None,
        };

        Ok(Self {
            config,
            root_regex,
            pdf_regex,
            exclude_regexes,
            login_regex,
        })
    }

    /// Scheme, host and port all match
    pub fn same_site(&self, a: &Url, b: &Url) -> bool {
        a.scheme() == b.scheme()
            && a.host_str() == b.host_str()
            && a.port_or_known_default() == b.port_or_known_default()
    }

    /// Whether the link points at a root (content) page
    pub fn is_root(&self, url: &Url) -> bool {
        self.root_regex.is_match(url.path())
    }

    /// Whether the link is a direct PDF
    pub fn is_pdf(&self, url: &Url) -> bool {
        self.pdf_regex.is_match(url.as_str())
    }

    /// Whether discovery should walk into this link, given the page it was found on
    pub fn should_follow(&self, url: &Url, from: &Url) -> bool {
        if !self.same_site(url, from) {
            return false;
        }

        if url.path().matches('/').count() > self.config.max_link_depth {
            return false;
        }

        let url_str = url.as_str();
        !self.exclude_regexes.iter().any(|regex| regex.is_match(url_str))
    }

    /// Whether a navigation ended on the login page instead of the requested one
    pub fn is_login_redirect(&self, landed: &Url) -> bool {
        match &self.login_regex {
            Some(regex) => regex.is_match(landed.path()),
            None => false,
        }
    }

    /// Create a normalized version of the URL (e.g., removing fragments)
    pub fn normalize_url(&self, url: &Url) -> Url {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        normalized
    }
}
