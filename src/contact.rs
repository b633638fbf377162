//! Trailing corporate contact blocks
//!
//! Modern corporate sign-offs often have no `--` or "Thanks" line: just a
//! short name, a title line and a stack of links. A block is taken to start
//! at a short line after a blank line, followed by another short non-link
//! line, with at least [`CONTACT_MIN_URLS`] links from there to the end.
//!
//! Known risk: the earliest qualifying line wins, so a short heading (say
//! "Q1.") after a blank line, with three links somewhere below it, cuts
//! everything from the heading down.

use crate::diagnostics::{HeuristicLog, TracingLog};
use crate::error::{ExtractError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// A name line is shorter than this
pub const CONTACT_NAME_MAX: usize = 30;

/// The line after the name (title, team) is shorter than this
pub const CONTACT_TITLE_MAX: usize = 60;

/// Links needed below the name line to call it a contact block
pub const CONTACT_MIN_URLS: usize = 3;

static REPLY_PREAMBLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^On .{10,80} wrote:\s*$").unwrap());

static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://|<http").unwrap());

/// Remove an orphaned `On ... wrote:` line and a trailing contact block
#[must_use]
pub fn strip_trailing_contact_block(body: &str) -> String {
    strip_trailing_contact_block_with(body, &TracingLog)
}

/// [`strip_trailing_contact_block`] with an explicit failure sink
#[must_use]
pub fn strip_trailing_contact_block_with(body: &str, log: &dyn HeuristicLog) -> String {
    match try_strip(body) {
        Ok(stripped) => stripped,
        Err(e) => {
            log.heuristic_failed("contact block", &e);
            body.to_string()
        }
    }
}

/// Drop `On <date>, <name> wrote:` lines left behind by quote removal
#[must_use]
pub fn strip_reply_preamble(body: &str) -> String {
    REPLY_PREAMBLE.replace_all(body, "").trim_end().to_string()
}

fn try_strip(body: &str) -> Result<String> {
    let body = strip_reply_preamble(body);

    let lines: Vec<&str> = body.split('\n').collect();
    if lines.len() < 5 {
        return Ok(body);
    }

    for i in 1..lines.len() - 2 {
        if !lines[i - 1].trim().is_empty() {
            continue;
        }

        let name = lines[i].trim();
        if name.is_empty() || name.chars().count() >= CONTACT_NAME_MAX || URL.is_match(name) {
            continue;
        }

        let next_text = lines[i + 1..lines.len().min(i + 4)]
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty());

        let Some(next_text) = next_text else {
            continue;
        };
        if URL.is_match(next_text) || next_text.chars().count() >= CONTACT_TITLE_MAX {
            continue;
        }

        let trailing = lines[i..].join("\n");
        if URL.find_iter(&trailing).count() >= CONTACT_MIN_URLS {
            let cut: usize = lines[..i].iter().map(|l| l.len() + 1).sum();
            let kept = body.get(..cut).ok_or(ExtractError::Boundary {
                stage: "contact block",
                index: cut,
            })?;
            tracing::debug!(line = i, "stripped trailing contact block");
            return Ok(kept.trim_end().to_string());
        }
    }

    Ok(body)
}
