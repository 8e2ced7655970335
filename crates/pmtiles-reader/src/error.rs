//! Error types for reader operations

use pmtiles_formats::{Compression, FormatError};
use std::sync::Arc;
use thiserror::Error;

/// Errors produced while reading an archive
///
/// Errors are `Clone` because a single in-flight directory fetch may be
/// shared by many callers, each of which receives the same outcome.
#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum ReaderError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("HTTP error: {0}")]
    Http(Arc<reqwest::Error>),

    #[error("HTTP status: {0}")]
    HttpStatus(u16),

    #[error("Server does not support byte serving: {0}")]
    ByteServingUnsupported(String),

    #[error("Etag mismatch: expected {expected:?}, got {actual:?}")]
    EtagMismatch {
        /// Version tag the request was made against
        expected: Option<String>,
        /// Version tag the source reported
        actual: Option<String>,
    },

    #[error("Maximum directory depth exceeded after {depth} levels")]
    MaxDepthExceeded {
        /// Number of directories visited
        depth: usize,
    },

    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(Compression),

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Tile lookup is not supported for version {0} archives")]
    UnsupportedLegacy(u8),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),
}

impl ReaderError {
    /// Whether the caller abandoned the operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the archive changed underneath the reader
    pub fn is_etag_mismatch(&self) -> bool {
        matches!(self, Self::EtagMismatch { .. })
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(_) | Self::EtagMismatch { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::HttpStatus(status) => matches!(status, 408 | 429 | 500..=599),
            _ => false,
        }
    }

    /// Whether retrying the same request can never succeed
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Format(_)
            | Self::UnsupportedCompression(_)
            | Self::UnsupportedLegacy(_)
            | Self::MaxDepthExceeded { .. }
            | Self::Decompression(_)
            | Self::ByteServingUnsupported(_)
            | Self::InvalidMetadata(_)
            | Self::InvalidConfig(_)
            | Self::InvalidSource(_) => true,
            Self::HttpStatus(status) => matches!(status, 400..=499) && !matches!(status, 408 | 429),
            _ => false,
        }
    }
}

impl From<std::io::Error> for ReaderError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for ReaderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(Arc::new(err))
    }
}

/// Result type for reader operations
pub type ReaderResult<T> = Result<T, ReaderError>;
