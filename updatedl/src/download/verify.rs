//! Integrity verification for downloaded packages.
//!
//! Verification always compares the file length with the descriptor size.
//! Digest comparison is a separate step enabled by [`ChecksumMode::Strict`],
//! because the update server has been seen advertising wrong checksums.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::error::{DownloadError, DownloadResult};
use crate::descriptor::{ChecksumAlgorithm, Descriptor};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Length of the signature block some packages carry after their payload.
pub const SIGNATURE_TRAILER_LEN: u64 = 32;

/// Which checks the verifier runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumMode {
    /// Compare file size only.
    #[default]
    SizeOnly,
    /// Compare file size, then the content digest.
    Strict,
}

/// Result of verifying one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    Ok,
    SizeMismatch {
        expected: u64,
        actual: u64,
    },
    /// Digests are lowercase hex.
    ChecksumMismatch {
        algorithm: ChecksumAlgorithm,
        expected: String,
        actual: String,
    },
}

impl VerificationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl std::fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "verified"),
            Self::SizeMismatch { expected, actual } => write!(
                f,
                "expected a size of {} bytes, got {}",
                expected, actual
            ),
            Self::ChecksumMismatch {
                algorithm,
                expected,
                actual,
            } => write!(
                f,
                "expected {} hash {}, got {}",
                algorithm, expected, actual
            ),
        }
    }
}

/// Title families whose packages end in a signature block.
///
/// Families are title id prefixes (`NPUA`, `BLES01234`); `*` selects every
/// title. Matching is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrailerFamilies {
    prefixes: Vec<String>,
}

impl TrailerFamilies {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut families = Self::default();
        for prefix in prefixes {
            families.insert(prefix.as_ref());
        }
        families
    }

    /// Parse a comma or whitespace separated list of prefixes.
    pub fn parse_list(list: &str) -> Self {
        Self::new(list.split(|c: char| c == ',' || c.is_whitespace()))
    }

    /// Add a prefix; blank prefixes are ignored.
    pub fn insert(&mut self, prefix: &str) {
        let prefix = prefix.trim().to_ascii_uppercase();
        if !prefix.is_empty() && !self.prefixes.contains(&prefix) {
            self.prefixes.push(prefix);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Whether packages of `title_id` carry a signature block.
    pub fn contains(&self, title_id: &str) -> bool {
        let id = title_id.trim().to_ascii_uppercase();
        self.prefixes
            .iter()
            .any(|prefix| prefix == "*" || id.starts_with(prefix.as_str()))
    }
}

/// Checks downloaded files against their descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityVerifier {
    mode: ChecksumMode,
}

impl IntegrityVerifier {
    pub fn new(mode: ChecksumMode) -> Self {
        Self { mode }
    }

    /// Verify `path` against `descriptor`.
    ///
    /// The digest is only computed when the size matches and the verifier
    /// is in strict mode. Descriptors flagged with a signature trailer are
    /// hashed without their final [`SIGNATURE_TRAILER_LEN`] bytes.
    pub fn verify(&self, path: &Path, descriptor: &Descriptor) -> DownloadResult<VerificationResult> {
        let actual = file_size(path)?;
        if actual != descriptor.size() {
            return Ok(VerificationResult::SizeMismatch {
                expected: descriptor.size(),
                actual,
            });
        }

        if self.mode == ChecksumMode::SizeOnly {
            return Ok(VerificationResult::Ok);
        }

        let digest = calculate_file_digest(
            path,
            descriptor.algorithm(),
            descriptor.has_signature_trailer(),
        )?;

        if digest != descriptor.checksum() {
            return Ok(VerificationResult::ChecksumMismatch {
                algorithm: descriptor.algorithm(),
                expected: hex::encode(descriptor.checksum()),
                actual: hex::encode(digest),
            });
        }

        Ok(VerificationResult::Ok)
    }
}

/// Length of the file at `path` in bytes.
pub fn file_size(path: &Path) -> DownloadResult<u64> {
    path.metadata()
        .map(|m| m.len())
        .map_err(|e| DownloadError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Calculate the digest of a file.
///
/// With `exclude_trailer` the last [`SIGNATURE_TRAILER_LEN`] bytes are left
/// out of the digest. The file is only read, never modified.
pub fn calculate_file_digest(
    path: &Path,
    algorithm: ChecksumAlgorithm,
    exclude_trailer: bool,
) -> DownloadResult<Vec<u8>> {
    let file = File::open(path).map_err(|e| DownloadError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let length = file_size(path)?;
    let payload_len = if exclude_trailer {
        length.saturating_sub(SIGNATURE_TRAILER_LEN)
    } else {
        length
    };

    let reader = file.take(payload_len);
    let digest = match algorithm {
        ChecksumAlgorithm::Sha1 => digest_reader::<Sha1>(reader),
        ChecksumAlgorithm::Sha256 => digest_reader::<Sha256>(reader),
    };

    digest.map_err(|e| DownloadError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

fn digest_reader<D: Digest>(mut reader: impl Read) -> std::io::Result<Vec<u8>> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_vec())
}
