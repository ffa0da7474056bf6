use crate::error::{Error, Result};
use std::collections::HashSet;
use std::path::Path;
use url::Url;

/// Read a newline-delimited list of root URLs.
///
/// Blank lines and `#` comments are skipped; repeated URLs keep their first position.
pub fn read_roots_file(path: &Path) -> Result<Vec<Url>> {
    let contents = std::fs::read_to_string(path)?;
    parse_roots(&contents, &path.display().to_string())
}

fn parse_roots(contents: &str, source: &str) -> Result<Vec<Url>> {
    let mut seen = HashSet::new();
    let mut roots = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let url = Url::parse(line).map_err(|e| Error::InvalidRoot {
            source_file: source.to_string(),
            line: index + 1,
            value: line.to_string(),
            reason: e,
        })?;

        if seen.insert(url.to_string()) {
            roots.push(url);
        } else {
            ::log::debug!("Dropping duplicate root on line {}: {}", index + 1, url);
        }
    }

    Ok(roots)
}
