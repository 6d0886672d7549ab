//! Error types for obsgrid

use thiserror::Error;

/// Errors that can occur during pipeline processing
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Session log has {count} rows for key {key}; expected exactly one")]
    JoinCardinality { key: String, count: usize },

    #[error("Clock parse error: {0}")]
    ClockParseError(String),

    #[error("Merge error: {0}")]
    MergeError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
