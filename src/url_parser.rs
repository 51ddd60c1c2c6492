//! Turns Google Drive / Docs share links into bare file or folder IDs.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{DriveError, Result};

static FOLDER_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/drive/(?:u/\d+/)?folders/([a-zA-Z0-9_-]+)")
        .expect("Invalid folder URL regex")
});

static FILE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/(?:u/\d+/)?file/d/([a-zA-Z0-9_-]+)")
        .expect("Invalid file URL regex")
});

// drive.google.com/open?id=..., drive.google.com/uc?id=...&export=download
static QUERY_ID_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/(?:open|uc)\?(?:[^#]*&)?id=([a-zA-Z0-9_-]+)")
        .expect("Invalid open URL regex")
});

static DOCS_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://docs\.google\.com/(?:document|spreadsheets|presentation|forms)/(?:u/\d+/)?d/([a-zA-Z0-9_-]+)",
    )
    .expect("Invalid docs URL regex")
});

static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid ID regex"));

/// Extract a Google Drive ID from a URL or validate a raw ID.
///
/// Supports the following URL formats:
/// - `https://drive.google.com/drive/folders/<ID>` (optionally with `u/<n>/`)
/// - `https://drive.google.com/file/d/<ID>/view`
/// - `https://drive.google.com/open?id=<ID>` and `.../uc?id=<ID>`
/// - `https://docs.google.com/{document,spreadsheets,presentation,forms}/d/<ID>/edit`
/// - Raw ID string (including the `root` alias)
///
/// # Examples
///
/// ```
/// use gdrive_toolkit::url_parser::extract_id;
///
/// let id = extract_id("https://drive.google.com/drive/folders/1abc123").unwrap();
/// assert_eq!(id, "1abc123");
///
/// let id = extract_id("https://docs.google.com/document/d/1xyz/edit").unwrap();
/// assert_eq!(id, "1xyz");
/// ```
pub fn extract_id(url_or_id: &str) -> Result<String> {
    let trimmed = url_or_id.trim();

    let url_patterns: [&LazyLock<Regex>; 4] = [
        &FOLDER_URL_REGEX,
        &FILE_URL_REGEX,
        &QUERY_ID_URL_REGEX,
        &DOCS_URL_REGEX,
    ];

    for pattern in url_patterns {
        if let Some(id) = pattern.captures(trimmed).and_then(|c| c.get(1)) {
            return Ok(id.as_str().to_string());
        }
    }

    if ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(DriveError::InvalidUrlOrId(url_or_id.to_string()))
}

/// True for share links and the `root` alias, which always name a Drive item.
///
/// Bare strings are ambiguous: `Reports` and `training_checkpoints_final`
/// are both syntactically valid IDs, so they need a lookup first.
pub fn looks_like_id(input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return extract_id(trimmed).is_ok();
    }
    trimmed == "root"
}

/// True when a bare string is long enough to be a generated Drive ID.
/// Long folder names match as well.
pub fn could_be_raw_id(input: &str) -> bool {
    let trimmed = input.trim();
    trimmed.len() >= 25 && ID_REGEX.is_match(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_folder_url_with_user() {
        let url = "https://drive.google.com/drive/u/2/folders/1abc123XYZ";
        assert_eq!(extract_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn test_extract_uc_url() {
        let url = "https://drive.google.com/uc?export=download&id=1abc123XYZ";
        assert_eq!(extract_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn test_extract_spreadsheet_url() {
        let url = "https://docs.google.com/spreadsheets/d/1sheetID_-x/edit#gid=0";
        assert_eq!(extract_id(url).unwrap(), "1sheetID_-x");
    }

    #[test]
    fn test_looks_like_id() {
        assert!(looks_like_id("root"));
        assert!(!looks_like_id("1AbCdEfGhIjKlMnOpQrStUvWxYz012"));
        assert!(!looks_like_id("training_checkpoints_final"));
        assert!(looks_like_id("https://drive.google.com/drive/folders/abc"));
        assert!(!looks_like_id("Reports"));
        assert!(!looks_like_id("My Folder"));
        assert!(!looks_like_id("https://example.com/abc"));
    }

    #[test]
    fn test_could_be_raw_id() {
        assert!(could_be_raw_id("1AbCdEfGhIjKlMnOpQrStUvWxYz012"));
        assert!(could_be_raw_id("training_checkpoints_final"));
        assert!(!could_be_raw_id("Reports"));
        assert!(!could_be_raw_id("a folder name with spaces in it"));
    }
}
