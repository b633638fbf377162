//! Core types: raw payload trees in, parsed messages and threads out

use crate::error::{ExtractError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Treat an explicit JSON `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A single header line. Names are not guaranteed unique.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Header {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub value: String,
}

/// Body of a payload node: inline base64url data or a reference to a
/// separately fetched attachment
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PartBody {
    /// Inline content, base64url encoded
    pub data: Option<String>,

    /// Set when the content lives in a separate attachment
    pub attachment_id: Option<String>,

    /// Decoded size in bytes
    #[serde(deserialize_with = "null_as_default")]
    pub size: u64,
}

/// One node of a MIME-like payload tree
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPayload {
    #[serde(deserialize_with = "null_as_default")]
    pub mime_type: String,

    #[serde(deserialize_with = "null_as_default")]
    pub filename: String,

    #[serde(deserialize_with = "null_as_default")]
    pub headers: Vec<Header>,

    #[serde(deserialize_with = "null_as_default")]
    pub body: PartBody,

    #[serde(deserialize_with = "null_as_default")]
    pub parts: Vec<Self>,
}

impl RawPayload {
    /// First header with the given name, compared case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    #[must_use]
    pub fn mime_is(&self, mime_type: &str) -> bool {
        self.mime_type.eq_ignore_ascii_case(mime_type)
    }

    /// A nested message carried as a `message/rfc822` part
    #[must_use]
    pub fn is_forwarded_message(&self) -> bool {
        self.mime_is("message/rfc822")
    }

    /// A leaf carrying a named, separately fetched body
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        !self.filename.is_empty() && self.body.attachment_id.is_some()
    }
}

/// A message as delivered by the fetch layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMessage {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,

    #[serde(deserialize_with = "null_as_default")]
    pub thread_id: String,

    /// Milliseconds since the epoch, as a decimal string
    pub internal_date: Option<String>,

    #[serde(deserialize_with = "null_as_default")]
    pub payload: RawPayload,
}

impl RawMessage {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ExtractError::Structure(e.to_string()))
    }
}

/// A thread listing as delivered by the fetch layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawThread {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,

    #[serde(deserialize_with = "null_as_default")]
    pub messages: Vec<RawMessage>,
}

impl RawThread {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ExtractError::Structure(e.to_string()))
    }
}

/// Message ID wrapper type
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attachment metadata; content is fetched separately by `attachment_id`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailAttachment {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub attachment_id: String,
}

impl EmailAttachment {
    /// Human readable size, `240 KB` or `1.5 MB`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_label(&self) -> String {
        let kb = self.size as f64 / 1024.0;
        if kb >= 1024.0 {
            format!("{:.1} MB", kb / 1024.0)
        } else {
            format!("{kb:.0} KB")
        }
    }
}

/// A Google Drive/Docs link found in a message body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriveLink {
    pub file_id: String,
    pub url: String,
}

/// A message forwarded inside another one, either as a `message/rfc822`
/// part or recovered from a forward marker in the body text
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForwardedMessage {
    pub from_address: String,
    pub date: String,
    pub subject: String,
    pub body_text: String,

    /// Raw HTML, kept only when the forwarded part had no plain text
    pub body_html: Option<String>,
}

impl ForwardedMessage {
    /// `From:`/`Date:`/`Subject:` lines for the non-empty fields
    #[must_use]
    pub fn attribution(&self) -> String {
        [
            ("From", &self.from_address),
            ("Date", &self.date),
            ("Subject", &self.subject),
        ]
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// A forwarded chunk split out of a body by its marker line.
/// Transient: consumed immediately when the message is rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardedSection {
    /// Header-like lines (`From:`, `Date:` ...) joined by newlines
    pub attribution: String,

    /// Remaining forwarded text
    pub body: String,
}

/// A parsed message, owned by its [`Thread`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedMessage {
    pub message_id: MessageId,
    pub from_address: String,
    pub to_addresses: Vec<String>,
    pub cc_addresses: Vec<String>,
    pub subject: String,
    pub date: Option<DateTime<Utc>>,

    /// Plain text body, preferred when present
    pub body_text: Option<String>,

    /// HTML body, converted only when there is no plain text
    pub body_html: Option<String>,

    pub attachments: Vec<EmailAttachment>,
    pub forwarded_messages: Vec<ForwardedMessage>,
    pub drive_links: Vec<DriveLink>,

    /// Problems found while walking the payload (bad base64 and the like)
    pub payload_issues: Vec<String>,

    /// Warnings from the last extraction, reset on every call
    pub warnings: Vec<String>,
}

impl ParsedMessage {
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body_text.as_deref().is_some_and(|t| !t.is_empty())
            || self.body_html.as_deref().is_some_and(|h| !h.is_empty())
    }
}

/// A thread of messages in display order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thread {
    pub thread_id: String,
    pub subject: String,

    /// Canonical order, numbered from 1 in the output
    pub messages: Vec<ParsedMessage>,

    /// Warnings from the last extraction, reset on every call
    pub warnings: Vec<String>,
}

impl Thread {
    #[must_use]
    pub const fn message_count(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn has_attachments(&self) -> bool {
        self.messages.iter().any(|m| !m.attachments.is_empty())
    }
}

/// Per-call extraction options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Character limit for the rendered thread
    pub max_length: Option<usize>,

    /// Remove quotes, signatures and contact blocks from own content
    pub strip_signatures: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_length: None,
            strip_signatures: true,
        }
    }
}

impl ExtractOptions {
    #[must_use]
    pub const fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    #[must_use]
    pub const fn keep_signatures(mut self) -> Self {
        self.strip_signatures = false;
        self
    }
}
