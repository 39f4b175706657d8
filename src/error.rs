//! Centralized error types for the ingestion pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while ingesting mail.
///
/// Per-message failures are isolated at the coordinator boundary: one bad
/// message never aborts the rest of a polling pass.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The mail server is unreachable or rejected our credentials.
    #[error("mailbox connection failed: {0}")]
    Connection(String),

    /// The raw message could not be decoded into a structured form.
    #[error("failed to decode message: {0}")]
    Decode(String),

    /// An attachment payload normalized to zero bytes.
    #[error("attachment payload is empty")]
    EmptyAttachment,

    /// A storage operation failed.
    #[error("storage operation failed: {0}")]
    Persistence(#[from] sqlx::Error),

    /// I/O error with the associated file path.
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// PDF handling failed (text layer and OCR both unusable is NOT an
    /// error; this covers disk verification and tooling failures).
    #[error("pdf processing failed: {0}")]
    Pdf(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;

impl IngestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
