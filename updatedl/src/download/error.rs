//! Error types for the download engine.
//!
//! These cover local failures only. A server refusing a request or a
//! connection dropping mid-stream is an expected per-descriptor result and is
//! reported through [`super::Outcome`] instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for download engine operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors that can occur while downloading or verifying packages.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Failed to read a file or directory.
    #[error("failed to read {}: {source}", .path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// The configured CA certificate could not be parsed.
    #[error("invalid CA certificate {}: {reason}", .path.display())]
    InvalidCertificate { path: PathBuf, reason: String },

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),
}
