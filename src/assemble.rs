//! Message and thread assembly
//!
//! Own content goes through forward splitting, quote removal, signature
//! removal and contact-block removal. Forwarded content is never stripped:
//! it comes from outside the thread and exists nowhere else.

use crate::contact::strip_trailing_contact_block_with;
use crate::diagnostics::{HeuristicLog, TracingLog};
use crate::forward::split_forwarded;
use crate::html::{clean_html, html_to_markdown_with};
use crate::quotes::strip_quoted_lines;
use crate::signature::extract_signature_with;
use crate::types::{ExtractOptions, ForwardedMessage, ForwardedSection, ParsedMessage, Thread};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use tracing::{debug, warn};

/// Separator placed before every reattached forwarded message
pub const FORWARD_SEPARATOR: &str = "--- Forwarded message ---";

/// Placed between messages of a thread
pub const MESSAGE_SEPARATOR: &str = "\n---\n\n";

/// Warning recorded when the markdown converter gave up
pub const HTML_FALLBACK_WARNING: &str = "HTML conversion failed, used basic tag stripping";

/// Warning recorded for a message with neither body nor forwarded content
pub const NO_BODY_WARNING: &str = "Message has no body content";

/// Bodies are only cut mid-way when more than this many characters fit
const MIN_PARTIAL_BODY: usize = 100;

/// Marker appended where a thread was cut
#[must_use]
pub fn truncation_marker(max_length: usize) -> String {
    format!("\n\n[... TRUNCATED at {max_length} chars ...]")
}

/// Notice appended when whole messages were left out
#[must_use]
pub fn omitted_messages_notice(shown: usize, total: usize) -> String {
    format!("\n\n[... TRUNCATED: showing {shown} of {total} messages ...]")
}

/// Remove quoted lines, the signature and a trailing contact block
#[must_use]
pub fn strip_signature_and_quotes(body: &str) -> String {
    strip_signature_and_quotes_with(body, &TracingLog)
}

/// [`strip_signature_and_quotes`] with an explicit failure sink
#[must_use]
pub fn strip_signature_and_quotes_with(body: &str, log: &dyn HeuristicLog) -> String {
    // Quotes go first: long quoted chains push the signature out of the
    // signature window
    let without_quotes = strip_quoted_lines(body);
    let (content, _) = extract_signature_with(&without_quotes, log);
    strip_trailing_contact_block_with(&content, log)
}

/// Full text pipeline for one body: forwards are split off, own content is
/// cleaned, forwards are reattached verbatim
#[must_use]
pub fn normalize_body(body: &str, options: &ExtractOptions) -> String {
    let (own, sections) = split_forwarded(body);
    let own = if options.strip_signatures {
        strip_signature_and_quotes(&own)
    } else {
        own
    };
    reassemble(&own, &sections)
}

/// Own content followed by each forwarded item under its separator
#[must_use]
pub fn reassemble(own: &str, forwarded: &[ForwardedSection]) -> String {
    let mut out = own.trim_end().to_string();

    for section in forwarded {
        if section.attribution.is_empty() && section.body.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(FORWARD_SEPARATOR);
        if !section.attribution.is_empty() {
            out.push('\n');
            out.push_str(&section.attribution);
        }
        if !section.body.is_empty() {
            out.push_str("\n\n");
            out.push_str(&section.body);
        }
    }

    out.trim().to_string()
}

/// Clean text for a single message.
///
/// Replaces `message.warnings` with the warnings of this call.
pub fn extract_message_content(message: &mut ParsedMessage, options: &ExtractOptions) -> String {
    let (content, warnings) = render_message(message, options, &TracingLog);
    message.warnings = warnings;
    content
}

fn render_message(
    message: &ParsedMessage,
    options: &ExtractOptions,
    log: &dyn HeuristicLog,
) -> (String, Vec<String>) {
    let mut warnings = message.payload_issues.clone();

    let body = if let Some(text) = message.body_text.as_deref().filter(|t| !t.is_empty()) {
        text.to_string()
    } else if let Some(html) = message.body_html.as_deref().filter(|h| !h.is_empty()) {
        let converted = html_to_markdown_with(&clean_html(html), log);
        if converted.used_fallback {
            warnings.push(HTML_FALLBACK_WARNING.to_string());
        }
        converted.markdown
    } else {
        if message.forwarded_messages.is_empty() {
            warnings.push(NO_BODY_WARNING.to_string());
        }
        String::new()
    };

    let (own, mut sections) = split_forwarded(&body);
    let own = if options.strip_signatures {
        strip_signature_and_quotes_with(&own, log)
    } else {
        own
    };

    for forwarded in &message.forwarded_messages {
        sections.push(forwarded_section(forwarded, log, &mut warnings));
    }

    debug!(
        "Rendered message {} with {} forwarded section(s)",
        message.message_id,
        sections.len()
    );

    (reassemble(&own, &sections), warnings)
}

fn forwarded_section(
    forwarded: &ForwardedMessage,
    log: &dyn HeuristicLog,
    warnings: &mut Vec<String>,
) -> ForwardedSection {
    let body = if !forwarded.body_text.trim().is_empty() {
        forwarded.body_text.trim().to_string()
    } else if let Some(html) = forwarded.body_html.as_deref() {
        let converted = html_to_markdown_with(&clean_html(html), log);
        if converted.used_fallback {
            warnings.push(format!("Forwarded message: {HTML_FALLBACK_WARNING}"));
        }
        converted.markdown
    } else {
        String::new()
    };

    ForwardedSection {
        attribution: forwarded.attribution(),
        body,
    }
}

/// `[i/N] From: ... | Date: ... | Subject: ...`, subject on the first only
#[must_use]
pub fn format_message_header(message: &ParsedMessage, position: usize, total: usize) -> String {
    let mut parts = vec![format!("From: {}", message.from_address)];

    if let Some(date) = message.date {
        parts.push(format!("Date: {}", date.format("%Y-%m-%d %H:%M")));
    }

    if position == 1 && !message.subject.is_empty() {
        parts.push(format!("Subject: {}", message.subject));
    }

    format!("[{position}/{total}] {}", parts.join(" | "))
}

/// Attachment and linked-file lists shown under a message body
#[must_use]
pub fn format_artifacts_summary(message: &ParsedMessage) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !message.attachments.is_empty() {
        let mut lines = vec!["**Attachments:**".to_string()];
        lines.extend(message.attachments.iter().map(|a| {
            format!("- {} ({}, {})", a.filename, a.mime_type, a.size_label())
        }));
        parts.push(lines.join("\n"));
    }

    if !message.drive_links.is_empty() {
        let mut seen = HashSet::new();
        let mut lines = vec!["**Linked files:**".to_string()];
        lines.extend(
            message
                .drive_links
                .iter()
                .filter(|link| seen.insert(link.file_id.as_str()))
                .map(|link| format!("- [{}]({})", link.file_id, link.url)),
        );
        parts.push(lines.join("\n"));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("\n\n{}", parts.join("\n\n"))
    }
}

/// Render every message, concurrently, in their original order.
///
/// At most `available_parallelism` threads run at once. A message whose
/// thread cannot be spawned is rendered on the calling thread.
fn render_all(messages: &[ParsedMessage], options: &ExtractOptions) -> Vec<(String, Vec<String>)> {
    if messages.len() < 2 {
        return messages
            .iter()
            .map(|m| render_message(m, options, &TracingLog))
            .collect();
    }

    let workers = std::thread::available_parallelism().map_or(4, NonZeroUsize::get);
    let mut rendered = Vec::with_capacity(messages.len());

    for chunk in messages.chunks(workers) {
        std::thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|m| {
                    std::thread::Builder::new()
                        .spawn_scoped(scope, move || render_message(m, options, &TracingLog))
                        .map_err(|e| warn!("could not spawn renderer for {}: {}", m.message_id, e))
                        .ok()
                })
                .collect();

            // Joined in spawn order, so results line up with message indices
            for (handle, message) in handles.into_iter().zip(chunk) {
                let result = match handle {
                    Some(handle) => handle.join().unwrap_or_else(|_| {
                        tracing::error!("rendering message {} panicked", message.message_id);
                        (
                            message.body_text.clone().unwrap_or_default(),
                            vec!["Message processing failed, showing raw text".to_string()],
                        )
                    }),
                    None => render_message(message, options, &TracingLog),
                };
                rendered.push(result);
            }
        });
    }

    rendered
}

/// Cut `text` to `max` chars and append the truncation marker
fn cut_to_limit(text: &str, max: usize, warnings: &mut Vec<String>) -> String {
    let mut out: String = text.chars().take(max).collect();
    out.truncate(out.trim_end().len());
    out.push_str(&truncation_marker(max));
    warnings.push(format!("Content truncated at {max} characters"));
    debug!("Thread output cut at {} chars", max);
    out.trim().to_string()
}

fn exceeds(limit: Option<usize>, length: usize) -> bool {
    limit.is_some_and(|max| length > max)
}

/// Markdown for a whole thread.
///
/// Messages are numbered `[i/N]` in their listed order. With a
/// `max_length` the output is cut and a marker appended. Replaces
/// `thread.warnings` and every message's `warnings`.
pub fn extract_thread_content(thread: &mut Thread, options: &ExtractOptions) -> String {
    thread.warnings.clear();

    let rendered = render_all(&thread.messages, options);
    let total = thread.messages.len();

    for (message, (_, warnings)) in thread.messages.iter_mut().zip(&rendered) {
        message.warnings.clone_from(warnings);
    }

    let mut out = format!("# {}\n\n", thread.subject);
    let mut used = out.chars().count();

    if let Some(max) = options.max_length.filter(|&max| used > max) {
        return cut_to_limit(&out, max, &mut thread.warnings);
    }

    let mut shown = 0;
    let mut cut_short = false;

    for (idx, (message, (body, warnings))) in thread.messages.iter().zip(&rendered).enumerate() {
        let position = idx + 1;
        let separator = if position > 1 { MESSAGE_SEPARATOR } else { "" };

        let header = format!(
            "{separator}{}\n\n",
            format_message_header(message, position, total)
        );
        let header_len = header.chars().count();
        if exceeds(options.max_length, used + header_len) {
            // Not even the first header fits: cut by characters instead
            if let (0, Some(max)) = (shown, options.max_length) {
                out.push_str(&header);
                return cut_to_limit(&out, max, &mut thread.warnings);
            }
            cut_short = true;
            break;
        }
        out.push_str(&header);
        used += header_len;
        shown = position;

        thread
            .warnings
            .extend(warnings.iter().map(|w| format!("Message {position}: {w}")));

        let block = format!("{body}{}\n", format_artifacts_summary(message));
        let block_len = block.chars().count();

        if let Some(max) = options.max_length {
            let remaining = max.saturating_sub(used);
            if block_len > remaining {
                if remaining > MIN_PARTIAL_BODY {
                    out.push_str(&block);
                }
                return cut_to_limit(&out, max, &mut thread.warnings);
            }
        }

        out.push_str(&block);
        used += block_len;
    }

    if cut_short {
        out.truncate(out.trim_end().len());
        out.push_str(&omitted_messages_notice(shown, total));
        if let Some(max) = options.max_length {
            thread
                .warnings
                .push(format!("Content truncated at {max} characters"));
        }
    }

    out.trim().to_string()
}
