//! Bruteforce signature detection
//!
//! The last non-empty lines of a body are classified one by one:
//!
//! - `l`: too long to be part of a signature
//! - `d`: starts with dashes but carries other text (separator or bullet)
//! - `c`: anything else, a plausible signature line
//!
//! Scanning that marker string from the end gives the longest trailing run
//! of plausible lines, with at most one `d` inside it. A sign-off marker
//! (`--`, `Thanks`, `Regards`, `Cheers`, `Best ...`) found within that run
//! starts the signature.

use crate::diagnostics::{HeuristicLog, TracingLog};
use crate::error::{ExtractError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Signatures are looked for among this many trailing non-empty lines
pub const SIGNATURE_MAX_LINES: usize = 11;

/// Lines longer than this are never part of a signature
pub const TOO_LONG_SIGNATURE_LINE: usize = 60;

static DELIMITER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n").unwrap());

static SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ims)(?:^[\s]*--*[\s]*[a-z .]*$|^thanks[\s,!]*$|^regards[\s,!]*$|^cheers[\s,!]*$|^best[ a-z]*[\s,!]*$).*",
    )
    .unwrap()
});

// Appended by mobile mail clients
static PHONE_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ims)(?:^sent from my[\s,!\w]*$|^sent from Mailbox for iPhone.*$|^sent (?:\S* )?from my BlackBerry.*$|^Enviado desde mi (?:\S+ ){0,2}BlackBerry.*$).*",
    )
    .unwrap()
});

/// Line delimiter used by the body: the first `\r\n` or `\n` found
#[must_use]
pub fn get_delimiter(body: &str) -> &'static str {
    match DELIMITER.find(body) {
        Some(m) if m.as_str() == "\r\n" => "\r\n",
        _ => "\n",
    }
}

/// Classify the candidate lines, returning one marker char per index
#[must_use]
pub fn mark_candidate_lines(lines: &[&str], candidates: &[usize]) -> String {
    candidates
        .iter()
        .map(|&idx| {
            let line = lines.get(idx).map_or("", |l| l.trim());
            if line.chars().count() > TOO_LONG_SIGNATURE_LINE {
                'l'
            } else if line.starts_with('-') && !line.trim_matches('-').is_empty() {
                'd'
            } else {
                'c'
            }
        })
        .collect()
}

/// Length of the trailing run of signature lines in a marker string.
///
/// Reading from the end: a run of `c` optionally followed by a single
/// `d`, unless that `d` is itself followed by another `d`. Without a
/// leading `c`, a lone `d` not followed by another `d` counts as one. An
/// `l` always ends the run.
#[must_use]
pub fn signature_run_len(markers: &str) -> usize {
    let reversed: Vec<char> = markers.chars().rev().collect();
    let is_dash = |idx: usize| reversed.get(idx) == Some(&'d');
    let plain = reversed.iter().take_while(|&&m| m == 'c').count();

    if plain == 0 {
        usize::from(is_dash(0) && !is_dash(1))
    } else if is_dash(plain) && !is_dash(plain + 1) {
        plain + 1
    } else {
        plain
    }
}

/// Index of the first line that may belong to a signature.
///
/// The first non-empty line is never a candidate and a body with a single
/// non-empty line has no signature at all.
#[must_use]
pub fn signature_candidate_start(lines: &[&str]) -> Option<usize> {
    let non_empty: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, _)| idx)
        .collect();

    if non_empty.len() <= 1 {
        return None;
    }

    let candidates = &non_empty[1..];
    let candidates = &candidates[candidates.len().saturating_sub(SIGNATURE_MAX_LINES)..];

    let markers = mark_candidate_lines(lines, candidates);
    let run = signature_run_len(&markers);

    (run > 0).then(|| candidates[candidates.len() - run])
}

/// Split a body into `(content, signature)`.
///
/// Phone-client footers ("Sent from my iPhone") are always dropped from the
/// content and reported after the signature. Internal failures go to
/// `tracing` and the body comes back untouched.
#[must_use]
pub fn extract_signature(body: &str) -> (String, Option<String>) {
    extract_signature_with(body, &TracingLog)
}

/// [`extract_signature`] with an explicit failure sink
#[must_use]
pub fn extract_signature_with(body: &str, log: &dyn HeuristicLog) -> (String, Option<String>) {
    match try_extract_signature(body) {
        Ok(split) => split,
        Err(e) => {
            log.heuristic_failed("signature", &e);
            (body.to_string(), None)
        }
    }
}

/// Content of `body` with its signature removed
#[must_use]
pub fn strip_signature(body: &str) -> String {
    extract_signature(body).0
}

fn try_extract_signature(body: &str) -> Result<(String, Option<String>)> {
    let delimiter = get_delimiter(body);
    let leading = body.len() - body.trim_start().len();
    let mut stripped = body.trim();
    let mut phone_signature = None;

    if let Some(phone) = PHONE_SIGNATURE.find(body) {
        let cut = phone.start().saturating_sub(leading);
        stripped = stripped.get(..cut).ok_or(ExtractError::Boundary {
            stage: "phone signature",
            index: cut,
        })?;
        phone_signature = Some(phone.as_str());
    }

    let lines: Vec<&str> = stripped.lines().collect();
    let candidate = signature_candidate_start(&lines)
        .map(|start| lines[start..].join(delimiter))
        .unwrap_or_default();

    let Some(found) = SIGNATURE.find(&candidate) else {
        if phone_signature.is_none() {
            return Ok((body.to_string(), None));
        }
        return Ok((stripped.trim().to_string(), None));
    };

    let joined = lines.join(delimiter);
    let content = joined
        .strip_suffix(found.as_str())
        .ok_or(ExtractError::Boundary {
            stage: "signature",
            index: found.start(),
        })?;

    let mut signature = found.as_str().to_string();
    if let Some(phone) = phone_signature {
        signature = [signature.as_str(), phone].join(delimiter);
    }

    Ok((content.trim().to_string(), Some(signature.trim().to_string())))
}
