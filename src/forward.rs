//! Splitting forwarded content out of a body
//!
//! Forward markers only count at the very start of a line. A quoted
//! marker (`> ---------- Forwarded message ---------`) never matches, so
//! forwards buried inside a quoted reply stay part of the quote.

use crate::types::ForwardedSection;
use regex::Regex;
use std::sync::LazyLock;

static FORWARD_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^-{5,}\s*Forwarded message\s*-{5,}\s*$|^Begin forwarded message:\s*$")
        .unwrap()
});

static ATTRIBUTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(From|Date|Subject|To|Cc|Sent):\s").unwrap());

/// Split `body` into its own content and the forwarded sections after it.
///
/// Returns the body unchanged with no sections when it carries no marker.
#[must_use]
pub fn split_forwarded(body: &str) -> (String, Vec<ForwardedSection>) {
    let Some(first) = FORWARD_MARKER.find(body) else {
        return (body.to_string(), Vec::new());
    };

    let own = body[..first.start()].trim_end().to_string();
    let rest = body[first.end()..].trim_start_matches(['\r', '\n']);

    let sections: Vec<ForwardedSection> = FORWARD_MARKER
        .split(rest)
        .filter(|chunk| !chunk.trim().is_empty())
        .map(parse_section)
        .collect();

    tracing::debug!(sections = sections.len(), "split forwarded content");

    (own, sections)
}

/// Peel the leading attribution block off a forwarded chunk
#[must_use]
pub fn parse_section(chunk: &str) -> ForwardedSection {
    let lines: Vec<&str> = chunk.lines().collect();
    let mut attribution: Vec<&str> = Vec::new();
    let mut body_start = 0;

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if ATTRIBUTION_LINE.is_match(line) {
            attribution.push(trimmed);
            body_start = idx + 1;
        } else if trimmed.is_empty() {
            if !attribution.is_empty() {
                break;
            }
        } else {
            break;
        }
    }

    ForwardedSection {
        attribution: attribution.join("\n"),
        body: lines[body_start..].join("\n").trim().to_string(),
    }
}
