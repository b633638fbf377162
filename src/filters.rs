//! Trivial attachment filtering
//!
//! Calendar invites, vCards, GIFs, signature logos and generically named
//! inline images add noise to a thread summary and are hidden.

use crate::error::{ExtractError, Result};
use crate::types::EmailAttachment;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

/// Rules for hiding trivial attachments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentFilter {
    /// MIME types that are always hidden
    pub excluded_mime_types: Vec<String>,

    /// Case-insensitive regexes matched against the start of the filename
    pub excluded_filename_patterns: Vec<String>,

    /// Images smaller than this are treated as logos or inline graphics
    pub image_size_threshold_bytes: u64,
}

impl Default for AttachmentFilter {
    fn default() -> Self {
        Self {
            excluded_mime_types: [
                "text/calendar",
                "application/ics",
                "text/vcard",
                "text/x-vcard",
                "image/gif",
            ]
            .map(String::from)
            .to_vec(),
            excluded_filename_patterns: [
                r"image\d*\.(png|jpe?g|gif|bmp)$",
                r"outlook-\w+\.(png|jpe?g)$",
                r"attachment\d*\.\w+$",
                r"invite\.ics$",
                r"noname$",
            ]
            .map(String::from)
            .to_vec(),
            image_size_threshold_bytes: 200 * 1024,
        }
    }
}

impl AttachmentFilter {
    /// Load an alternative rule set; missing fields take the defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ExtractError::Structure(e.to_string()))
    }

    /// Keep everything
    #[must_use]
    pub const fn allow_all() -> Self {
        Self {
            excluded_mime_types: Vec::new(),
            excluded_filename_patterns: Vec::new(),
            image_size_threshold_bytes: 0,
        }
    }

    #[must_use]
    pub fn is_trivial(&self, filename: &str, mime_type: &str, size: u64) -> bool {
        let name = filename.trim().to_lowercase();
        if name.is_empty() {
            return true;
        }

        if self
            .excluded_mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(mime_type))
        {
            return true;
        }

        let name_excluded = self.excluded_filename_patterns.iter().any(|pattern| {
            // Invalid patterns are skipped rather than rejecting the rule set
            RegexBuilder::new(&format!("^(?:{pattern})"))
                .case_insensitive(true)
                .build()
                .is_ok_and(|re| re.is_match(&name))
        });
        if name_excluded {
            return true;
        }

        mime_type.starts_with("image/") && size < self.image_size_threshold_bytes
    }

    /// Drop trivial attachments, keeping the order of the rest
    #[must_use]
    pub fn apply(&self, attachments: Vec<EmailAttachment>) -> Vec<EmailAttachment> {
        attachments
            .into_iter()
            .filter(|a| !self.is_trivial(&a.filename, &a.mime_type, a.size))
            .collect()
    }
}
