//! Error types for email normalization

use thiserror::Error;

/// Errors raised inside the normalization pipeline.
///
/// Only payload deserialization surfaces these to callers. Every text
/// heuristic catches its own errors, reports them through a
/// [`HeuristicLog`](crate::HeuristicLog) and falls back to its input.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Failed to deserialize the payload structure
    #[error("Failed to parse payload structure: {0}")]
    Structure(String),

    /// Failed to decode a base64url body
    #[error("Failed to decode body: {0}")]
    Decode(String),

    /// A computed offset did not land on a valid char boundary
    #[error("Invalid offset {index} in {stage}")]
    Boundary { stage: &'static str, index: usize },

    /// HTML to markdown conversion failed or produced nothing
    #[error("HTML conversion failed: {0}")]
    Conversion(String),
}

/// Result type for normalization operations
pub type Result<T> = std::result::Result<T, ExtractError>;
