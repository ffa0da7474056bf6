use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Response to a GET issued with the browser's session
#[derive(Debug, Clone, Default)]
pub struct FetchedAsset {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedAsset {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("pdf"))
    }
}

/// How a file reached the output directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadKind {
    /// Browser download triggered by clicking a control on the page
    Click,
    /// Direct GET of a PDF link
    Direct,
}

/// A file written to the output directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadedFile {
    pub name: String,
    pub kind: DownloadKind,
}

/// Outcome of processing one root page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    pub url: Url,
    pub title: Option<String>,
    pub files: Vec<DownloadedFile>,
    /// Set when the page could not be loaded and was skipped
    pub skipped: Option<String>,
}

impl PageReport {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            title: None,
            files: Vec::new(),
            skipped: None,
        }
    }

    pub fn skipped(url: Url, reason: String) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::new(url)
        }
    }
}

/// Totals for a whole download run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub out_dir: PathBuf,
    pub pages: Vec<PageReport>,
}

impl RunSummary {
    pub fn total_files(&self) -> usize {
        self.pages.iter().map(|p| p.files.len()).sum()
    }

    pub fn skipped_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.skipped.is_some()).count()
    }
}
