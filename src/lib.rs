// Enforce at crate level
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::significant_drop_tightening)]

//! Email Thread Normalizer
//!
//! Turns Gmail-style payload trees into clean, deterministic markdown for
//! downstream readers. The same input always yields the same output.
//!
//! # Pipeline
//!
//! Per message: payload walk, HTML conversion (only when there is no plain
//! body), forward splitting, quote removal, signature removal, contact
//! block removal, then the forwarded sections are reattached untouched.
//! Threads number their messages `[i/N]`, list attachments and Drive
//! links, and can be cut to a character limit.
//!
//! Every heuristic fails open: when unsure, or on an internal error, the
//! text is left as it was.
//!
//! # Example
//!
//! ```rust
//! use email_normalize::{extract_signature, normalize_body, ExtractOptions};
//!
//! let (content, signature) = extract_signature("Hey!\n\nSee you then.\n\n--\nJohn Doe");
//! assert_eq!(content, "Hey!\n\nSee you then.");
//! assert!(signature.is_some());
//!
//! let text = normalize_body("Sounds good.\n\n> earlier message", &ExtractOptions::default());
//! assert_eq!(text, "Sounds good.");
//! ```

mod assemble;
mod contact;
mod diagnostics;
mod error;
mod filters;
mod forward;
mod html;
mod links;
mod payload;
mod quotes;
mod signature;
mod types;

pub use assemble::*;
pub use contact::*;
pub use diagnostics::{HeuristicLog, RecordingLog, TracingLog};
pub use error::{ExtractError, Result};
pub use filters::AttachmentFilter;
pub use forward::{parse_section, split_forwarded};
pub use html::*;
pub use links::extract_drive_links;
pub use payload::{WalkedPayload, decode_body, parse_message, parse_thread, walk_payload};
pub use quotes::strip_quoted_lines;
pub use signature::*;
pub use types::*;
