//! Google Drive link extraction
//!
//! People say "attached" when they mean "linked". Drive file IDs found in
//! the body are surfaced next to the real attachments.

use crate::types::DriveLink;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static DRIVE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"https?://drive\.google\.com/open\?id=([a-zA-Z0-9_-]+)",
        r"https?://drive\.google\.com/file/d/([a-zA-Z0-9_-]+)",
        r"https?://drive\.google\.com/drive/folders/([a-zA-Z0-9_-]+)",
        r"https?://docs\.google\.com/document/d/([a-zA-Z0-9_-]+)",
        r"https?://docs\.google\.com/spreadsheets/d/([a-zA-Z0-9_-]+)",
        r"https?://docs\.google\.com/presentation/d/([a-zA-Z0-9_-]+)",
        r"https?://docs\.google\.com/forms/d/([a-zA-Z0-9_-]+)",
        r"https?://docs\.google\.com/drawings/d/([a-zA-Z0-9_-]+)",
        r"https?://sites\.google\.com/d/([a-zA-Z0-9_-]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Drive/Docs links in `text`, deduplicated by file ID.
///
/// Ordered by link family first, then by position in the text.
#[must_use]
pub fn extract_drive_links(text: &str) -> Vec<DriveLink> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut links = Vec::new();

    for pattern in DRIVE_PATTERNS.iter() {
        for cap in pattern.captures_iter(text) {
            let (Some(url), Some(file_id)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            if seen.insert(file_id.as_str()) {
                links.push(DriveLink {
                    file_id: file_id.as_str().to_string(),
                    url: url.as_str().to_string(),
                });
            }
        }
    }

    links
}
