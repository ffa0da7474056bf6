use url::Url;

const MAX_FILENAME_CHARS: usize = 150;

/// Convert a server- or browser-suggested name to a safe flat filename
///
/// Path separators, characters Windows rejects, and CR/LF/TAB become `_`;
/// surrounding whitespace is trimmed and the result is capped at 150 chars.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' | '\n' | '\r' | '\t' => '_',
            c => c,
        })
        .take(MAX_FILENAME_CHARS)
        .collect();

    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

/// Extract the filename parameter from a Content-Disposition header value
///
/// Takes the first `filename=` or `filename*=` parameter. For the extended
/// form the charset prefix (`UTF-8''`) is dropped and the rest is
/// percent-decoded.
pub fn content_disposition_filename(header_value: &str) -> Option<String> {
    for param in header_value.split(';') {
        let Some((name, value)) = param.trim().split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        if name != "filename" && name != "filename*" {
            continue;
        }

        let value = value.trim().trim_matches('"').trim_matches('\'');
        let value = match value.rsplit_once("''") {
            Some((_charset, encoded)) => percent_decode(encoded),
            None => value.to_string(),
        };

        if !value.is_empty() {
            return Some(value);
        }
    }
    None
}

/// Pick the on-disk name for a fetched PDF
pub fn pdf_filename(url: &Url, content_disposition: Option<&str>) -> String {
    let from_header = content_disposition.and_then(content_disposition_filename);

    let raw = from_header.unwrap_or_else(|| {
        url.path_segments()
            .and_then(|mut segments| segments.next_back().map(percent_decode))
            .filter(|segment| !segment.is_empty())
            .unwrap_or_else(|| "file.pdf".to_string())
    });

    let mut name = sanitize_filename(&raw);
    if !name.to_lowercase().ends_with(".pdf") {
        name.push_str(".pdf");
    }
    name
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(high << 4 | low);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
