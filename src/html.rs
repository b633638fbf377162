//! HTML cleanup and markdown conversion
//!
//! Email HTML is noisy. Tracking pixels, Outlook conditionals and hidden
//! elements are removed first so they don't leak into the markdown.

use crate::diagnostics::{HeuristicLog, TracingLog};
use crate::error::{ExtractError, Result};
use htmd::HtmlToMarkdown;
use regex::Regex;
use std::sync::LazyLock;

// Adobe's anti-scraping trick: 7.<br style="display:none"/>1.<br/>26
static HIDDEN_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<br\s+style="[^"]*display:\s*none[^"]*"\s*/?>"#).unwrap()
});

static MSO_CONDITIONAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<!--\[if\s+.*?\]>.*?<!\[endif\]-->").unwrap());

static TRACKING_PIXEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]*(?:width|height)=["']1["'][^>]*/?>"#).unwrap()
});

static HIDDEN_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<[^>]+style="[^"]*display:\s*none[^"]*"[^>]*>.*?</[^>]+>"#).unwrap()
});

static SPACER_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<td[^>]*>\s*(?:&nbsp;|\s)*\s*</td>").unwrap());

static EMPTY_PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<p(?:\s[^>]*)?>\s*(?:&nbsp;|\s)*\s*</p>").unwrap());

static EMPTY_DIV: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<div(?:\s[^>]*)?>\s*(?:&nbsp;|\s)*\s*</div>").unwrap());

static INLINE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

/// Result of an HTML to markdown conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub markdown: String,

    /// The converter failed and tags were stripped instead
    pub used_fallback: bool,
}

/// Remove tracking pixels, Outlook conditionals, hidden elements, spacer
/// cells and empty paragraphs
#[must_use]
pub fn clean_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let html = HIDDEN_BREAK.replace_all(html, "");
    let html = MSO_CONDITIONAL.replace_all(&html, "");
    let html = TRACKING_PIXEL.replace_all(&html, "");
    let html = HIDDEN_ELEMENT.replace_all(&html, "");
    let html = SPACER_CELL.replace_all(&html, "");
    let html = EMPTY_PARAGRAPH.replace_all(&html, "");
    EMPTY_DIV.replace_all(&html, "").into_owned()
}

/// Convert HTML to markdown, falling back to tag stripping.
///
/// Never fails: a conversion error, or an empty result for non-empty
/// input, switches to [`strip_html_tags`].
#[must_use]
pub fn html_to_markdown(html: &str) -> Converted {
    html_to_markdown_with(html, &TracingLog)
}

/// [`html_to_markdown`] with an explicit failure sink
#[must_use]
pub fn html_to_markdown_with(html: &str, log: &dyn HeuristicLog) -> Converted {
    if html.trim().is_empty() {
        return Converted {
            markdown: String::new(),
            used_fallback: false,
        };
    }

    match convert(html) {
        Ok(markdown) => Converted {
            markdown,
            used_fallback: false,
        },
        Err(e) => {
            log.heuristic_failed("html conversion", &e);
            Converted {
                markdown: strip_html_tags(html),
                used_fallback: true,
            }
        }
    }
}

/// Clean then convert, the full path for an HTML-only body
#[must_use]
pub fn normalize_html(html: &str) -> Converted {
    html_to_markdown(&clean_html(html))
}

fn convert(html: &str) -> Result<String> {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "head", "title", "meta"])
        .build();
    let markdown = converter
        .convert(html)
        .map_err(|e| ExtractError::Conversion(e.to_string()))?;

    let markdown = markdown.trim();
    if markdown.is_empty() {
        return Err(ExtractError::Conversion("converter returned nothing".into()));
    }
    Ok(markdown.to_string())
}

/// Strip tags, decode the common entities and collapse whitespace.
///
/// Block-level closing tags become line breaks; script and style content
/// is dropped.
#[must_use]
pub fn strip_html_tags(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;
    let mut tag = String::new();

    for c in html.chars() {
        if !in_tag && c == '<' {
            in_tag = true;
            tag.clear();
        } else if in_tag && c == '>' {
            in_tag = false;
            let name = tag.to_lowercase();
            if name.starts_with("script") {
                in_script = true;
            } else if name.starts_with("/script") {
                in_script = false;
            } else if name.starts_with("style") {
                in_style = true;
            } else if name.starts_with("/style") {
                in_style = false;
            }

            if name.starts_with("br")
                || name.starts_with("/p")
                || name.starts_with("/div")
                || name.starts_with("/li")
                || name.starts_with("/tr")
                || name.starts_with("/h")
            {
                result.push('\n');
            } else {
                result.push(' ');
            }
        } else if in_tag {
            tag.push(c);
        } else if !in_script && !in_style {
            result.push(c);
        }
    }

    let result = result
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    result
        .lines()
        .map(|line| INLINE_SPACES.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
