//! Resume planning for a single package file.

use std::fs;
use std::io;
use std::path::Path;

use super::error::{DownloadError, DownloadResult};

/// Why an existing file is left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The file already has the expected size.
    AlreadyComplete,
    /// The file is larger than expected; it may belong to another version.
    LargerThanExpected { actual: u64, expected: u64 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyComplete => {
                write!(f, "seems to already be downloaded. Pass --force if not.")
            }
            Self::LargerThanExpected { actual, expected } => write!(
                f,
                "is larger than expected ({} > {} bytes). Pass --force to re-download it.",
                actual, expected
            ),
        }
    }
}

/// What to do with a package file before transferring anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Leave the file untouched.
    Skip(SkipReason),
    /// Download from byte 0, discarding any existing content.
    Restart,
    /// Continue a partial download at `offset`.
    Resume { offset: u64 },
}

/// Decide how to bring a local file up to `expected_size` bytes.
///
/// `existing_length` is `None` when no local file exists. With `overwrite`
/// set the answer is always [`Decision::Restart`]. Oversized files are never
/// truncated without `overwrite`.
pub fn plan(existing_length: Option<u64>, expected_size: u64, overwrite: bool) -> Decision {
    let Some(length) = existing_length else {
        return Decision::Restart;
    };

    if overwrite {
        return Decision::Restart;
    }

    if length == expected_size {
        Decision::Skip(SkipReason::AlreadyComplete)
    } else if length > expected_size {
        Decision::Skip(SkipReason::LargerThanExpected {
            actual: length,
            expected: expected_size,
        })
    } else {
        Decision::Resume { offset: length }
    }
}

/// Current length of a local file, or `None` if it does not exist.
pub fn local_length(path: &Path) -> DownloadResult<Option<u64>> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
        Ok(_) => Err(DownloadError::ReadFailed {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DownloadError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
