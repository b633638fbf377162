//! Payload tree traversal and message construction

use crate::error::{ExtractError, Result};
use crate::filters::AttachmentFilter;
use crate::links::extract_drive_links;
use crate::types::{
    EmailAttachment, ForwardedMessage, MessageId, ParsedMessage, RawMessage, RawPayload,
    RawThread, Thread,
};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use mailparse::{MailAddr, MailHeaderMap, SingleInfo};
use std::collections::VecDeque;
use tracing::{debug, warn};

// Gmail sends base64url, sometimes padded and sometimes not
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Everything pulled out of one payload tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkedPayload {
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub attachments: Vec<EmailAttachment>,

    /// `message/rfc822` parts in document order
    pub forwarded: Vec<ForwardedMessage>,

    /// Bodies that could not be decoded
    pub issues: Vec<String>,
}

/// Decode a base64url body into text, replacing invalid UTF-8
pub fn decode_body(data: &str) -> Result<String> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = URL_SAFE_LENIENT
        .decode(cleaned)
        .map_err(|e| ExtractError::Decode(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Walk a payload tree for bodies, attachments and forwarded messages.
///
/// Never fails. Missing data counts as empty and undecodable bodies are
/// reported in [`WalkedPayload::issues`].
#[must_use]
pub fn walk_payload(payload: &RawPayload) -> WalkedPayload {
    let mut walked = WalkedPayload::default();

    let (text, html) = find_bodies(&[payload], &mut walked.issues);
    walked.body_text = text;
    walked.body_html = html;

    collect_parts(payload, true, &mut walked);
    walked
}

/// Breadth-first search for the first plain and HTML bodies, so the
/// shallowest match wins. Attachments and nested messages are not bodies.
fn find_bodies(roots: &[&RawPayload], issues: &mut Vec<String>) -> (Option<String>, Option<String>) {
    let mut text: Option<String> = None;
    let mut html: Option<String> = None;
    let mut queue: VecDeque<&RawPayload> = roots.iter().copied().collect();

    while let Some(node) = queue.pop_front() {
        if text.is_some() && html.is_some() {
            break;
        }
        if node.is_forwarded_message() || node.is_attachment() {
            continue;
        }

        if node.parts.is_empty() {
            let slot = if node.mime_is("text/plain") {
                &mut text
            } else if node.mime_is("text/html") {
                &mut html
            } else {
                continue;
            };
            if slot.is_none() {
                *slot = decode_leaf(node, issues);
            }
        } else {
            queue.extend(node.parts.iter());
        }
    }

    (text, html)
}

fn decode_leaf(node: &RawPayload, issues: &mut Vec<String>) -> Option<String> {
    let data = node.body.data.as_deref().filter(|d| !d.is_empty())?;
    match decode_body(data) {
        Ok(decoded) if !decoded.is_empty() => Some(decoded),
        Ok(_) => None,
        Err(e) => {
            warn!(mime_type = %node.mime_type, %e, "undecodable body part");
            issues.push(format!("Could not decode {} body: {e}", node.mime_type));
            None
        }
    }
}

/// Depth-first, document-order pass for attachments and nested messages
fn collect_parts(node: &RawPayload, is_root: bool, walked: &mut WalkedPayload) {
    if node.is_attachment() && node.parts.is_empty() {
        walked.attachments.push(EmailAttachment {
            filename: node.filename.clone(),
            mime_type: if node.mime_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                node.mime_type.clone()
            },
            size: node.body.size,
            attachment_id: node.body.attachment_id.clone().unwrap_or_default(),
        });
    }

    if !is_root && node.is_forwarded_message() {
        walked
            .forwarded
            .push(forwarded_message(node, &mut walked.issues));
    }

    for part in &node.parts {
        collect_parts(part, false, walked);
    }
}

/// Build a forwarded message from a `message/rfc822` part
fn forwarded_message(part: &RawPayload, issues: &mut Vec<String>) -> ForwardedMessage {
    if part.parts.is_empty() {
        return inline_rfc822(part, issues);
    }

    // The nested headers sit on the part itself or on its first child
    let header = |name: &str| {
        part.header(name)
            .or_else(|| part.parts.first().and_then(|child| child.header(name)))
            .unwrap_or_default()
            .to_string()
    };

    let children: Vec<&RawPayload> = part.parts.iter().collect();
    let (text, html) = find_bodies(&children, issues);

    ForwardedMessage {
        from_address: header("From"),
        date: header("Date"),
        subject: header("Subject"),
        body_html: if text.is_none() { html } else { None },
        body_text: text.unwrap_or_default(),
    }
}

/// A `message/rfc822` part delivered as one raw inline message
fn inline_rfc822(part: &RawPayload, issues: &mut Vec<String>) -> ForwardedMessage {
    let Some(raw) = decode_leaf(part, issues) else {
        return ForwardedMessage::default();
    };

    let parsed = match mailparse::parse_mail(raw.as_bytes()) {
        Ok(parsed) => parsed,
        Err(e) => {
            issues.push(format!("Could not parse forwarded message: {e}"));
            return ForwardedMessage::default();
        }
    };

    let headers = parsed.get_headers();
    let header = |name: &str| headers.get_first_value(name).unwrap_or_default();

    let mut text = String::new();
    let mut html: Option<String> = None;
    extract_mail_bodies(&parsed, &mut text, &mut html);

    ForwardedMessage {
        from_address: header("From"),
        date: header("Date"),
        subject: header("Subject"),
        body_html: if text.is_empty() { html } else { None },
        body_text: text,
    }
}

fn extract_mail_bodies(parsed: &mailparse::ParsedMail, text: &mut String, html: &mut Option<String>) {
    if parsed.subparts.is_empty() {
        let content_type = parsed.ctype.mimetype.to_lowercase();
        if let Ok(body) = parsed.get_body() {
            if content_type.contains("text/html") {
                if html.is_none() {
                    *html = Some(body);
                }
            } else if content_type.contains("text/plain") && text.is_empty() {
                *text = body;
            }
        }
        return;
    }

    for part in &parsed.subparts {
        extract_mail_bodies(part, text, html);
    }
}

/// Build a [`ParsedMessage`] from a fetched message
#[must_use]
pub fn parse_message(raw: &RawMessage, filter: &AttachmentFilter) -> ParsedMessage {
    let payload = &raw.payload;
    let walked = walk_payload(payload);

    let drive_links = walked
        .body_text
        .as_deref()
        .map(extract_drive_links)
        .filter(|links| !links.is_empty())
        .or_else(|| walked.body_html.as_deref().map(extract_drive_links))
        .unwrap_or_default();

    let message = ParsedMessage {
        message_id: MessageId::new(raw.id.clone()),
        from_address: payload.header("From").unwrap_or_default().to_string(),
        to_addresses: extract_addresses(payload, "To"),
        cc_addresses: extract_addresses(payload, "Cc"),
        subject: payload.header("Subject").unwrap_or_default().to_string(),
        date: extract_date(payload, raw.internal_date.as_deref()),
        body_text: walked.body_text,
        body_html: walked.body_html,
        attachments: filter.apply(walked.attachments),
        forwarded_messages: walked.forwarded,
        drive_links,
        payload_issues: walked.issues,
        warnings: Vec::new(),
    };

    debug!(
        "Parsed message {} from {} ({} forwarded)",
        message.message_id,
        message.from_address,
        message.forwarded_messages.len()
    );

    message
}

/// Build a [`Thread`] from a listing; messages keep their listed order
#[must_use]
pub fn parse_thread(raw: &RawThread, filter: &AttachmentFilter) -> Thread {
    let messages: Vec<ParsedMessage> = raw
        .messages
        .iter()
        .map(|m| parse_message(m, filter))
        .collect();

    let subject = messages
        .first()
        .map(|m| m.subject.clone())
        .unwrap_or_default();

    Thread {
        thread_id: raw.id.clone(),
        subject,
        messages,
        warnings: Vec::new(),
    }
}

fn extract_addresses(payload: &RawPayload, header_name: &str) -> Vec<String> {
    let Some(value) = payload.header(header_name) else {
        return Vec::new();
    };

    match mailparse::addrparse(value) {
        Ok(list) => list
            .iter()
            .flat_map(|addr| match addr {
                MailAddr::Single(info) => vec![format_address(info)],
                MailAddr::Group(group) => group.addrs.iter().map(format_address).collect(),
            })
            .collect(),
        Err(_) => value
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from)
            .collect(),
    }
}

fn format_address(info: &SingleInfo) -> String {
    match &info.display_name {
        Some(name) if !name.is_empty() => format!("{name} <{}>", info.addr),
        _ => info.addr.clone(),
    }
}

fn extract_date(payload: &RawPayload, internal_date: Option<&str>) -> Option<DateTime<Utc>> {
    payload
        .header("Date")
        .and_then(|d| mailparse::dateparse(d).ok())
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .or_else(|| {
            internal_date
                .and_then(|ms| ms.trim().parse::<i64>().ok())
                .and_then(DateTime::from_timestamp_millis)
        })
}
