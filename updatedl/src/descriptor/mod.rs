//! Update package descriptors.
//!
//! A [`Descriptor`] is the validated, typed form of one `package` entry from
//! the update metadata. Descriptors are built either programmatically with
//! [`Descriptor::new`] or from loosely-typed attribute values with
//! [`Descriptor::from_raw`]; both paths run the same validation so a
//! descriptor that exists is always usable by the download engine.

mod naming;

pub use naming::{local_file_name, sanitize_component};

use thiserror::Error;
use url::Url;

/// Result type for descriptor construction.
pub type DescriptorResult<T> = Result<T, DescriptorError>;

/// Errors raised while validating a package descriptor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// A required attribute was absent.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// The version string was empty.
    #[error("version must not be empty")]
    EmptyVersion,

    /// The size attribute was not a non-negative integer.
    #[error("invalid size '{value}'")]
    InvalidSize { value: String },

    /// The checksum was not valid hexadecimal.
    #[error("invalid checksum '{value}': {reason}")]
    InvalidChecksum { value: String, reason: String },

    /// The checksum does not have the digest length of its algorithm.
    #[error("{algorithm} checksum must be {expected} bytes, got {actual}")]
    ChecksumLength {
        algorithm: ChecksumAlgorithm,
        expected: usize,
        actual: usize,
    },

    /// The URL could not be parsed.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The URL has no final path segment to name the local file after.
    #[error("url '{url}' has no file name")]
    NoFileName { url: String },
}

/// Digest algorithm used for a descriptor's checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChecksumAlgorithm {
    /// SHA-1, as published by the update server.
    #[default]
    Sha1,
    /// SHA-256.
    Sha256,
}

impl ChecksumAlgorithm {
    /// Output length of the digest in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// Algorithm implied by the length of a hex-encoded digest.
    ///
    /// 64 hex characters select SHA-256; anything else is taken as SHA-1
    /// and left for length validation to reject.
    pub fn from_hex_digest(hex: &str) -> Self {
        if hex.trim().len() == Self::Sha256.digest_len() * 2 {
            Self::Sha256
        } else {
            Self::Sha1
        }
    }

    /// Human-readable algorithm name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
        }
    }
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Unvalidated descriptor fields as they appear in metadata.
///
/// Every field is optional so that parsers can collect whatever attributes
/// are present and leave the decision about what is missing to
/// [`Descriptor::from_raw`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDescriptor {
    pub version: Option<String>,
    pub size: Option<String>,
    pub system_version: Option<String>,
    pub url: Option<String>,
    pub checksum: Option<String>,
}

/// One downloadable update package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    version: String,
    size: u64,
    system_version_requirement: String,
    url: Url,
    basename: String,
    checksum: Vec<u8>,
    algorithm: ChecksumAlgorithm,
    signature_trailer: bool,
}

impl Descriptor {
    /// Create a descriptor with a SHA-1 checksum.
    pub fn new(
        version: impl Into<String>,
        size: u64,
        url: &str,
        checksum: Vec<u8>,
    ) -> DescriptorResult<Self> {
        Self::with_algorithm(version, size, url, checksum, ChecksumAlgorithm::Sha1)
    }

    /// Create a descriptor whose checksum uses the given algorithm.
    pub fn with_algorithm(
        version: impl Into<String>,
        size: u64,
        url: &str,
        checksum: Vec<u8>,
        algorithm: ChecksumAlgorithm,
    ) -> DescriptorResult<Self> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(DescriptorError::EmptyVersion);
        }

        if checksum.len() != algorithm.digest_len() {
            return Err(DescriptorError::ChecksumLength {
                algorithm,
                expected: algorithm.digest_len(),
                actual: checksum.len(),
            });
        }

        let (url, basename) = parse_url(url)?;

        Ok(Self {
            version,
            size,
            system_version_requirement: String::new(),
            url,
            basename,
            checksum,
            algorithm,
            signature_trailer: false,
        })
    }

    /// Validate raw metadata fields into a descriptor.
    pub fn from_raw(raw: RawDescriptor, algorithm: ChecksumAlgorithm) -> DescriptorResult<Self> {
        let version = raw.version.ok_or(DescriptorError::MissingField("version"))?;
        let size_text = raw.size.ok_or(DescriptorError::MissingField("size"))?;
        let url = raw.url.ok_or(DescriptorError::MissingField("url"))?;
        let checksum_text = raw
            .checksum
            .ok_or(DescriptorError::MissingField("checksum"))?;

        let size = size_text
            .trim()
            .parse::<u64>()
            .map_err(|_| DescriptorError::InvalidSize {
                value: size_text.clone(),
            })?;

        let checksum =
            hex::decode(checksum_text.trim()).map_err(|e| DescriptorError::InvalidChecksum {
                value: checksum_text.clone(),
                reason: e.to_string(),
            })?;

        let descriptor = Self::with_algorithm(version, size, url.trim(), checksum, algorithm)?;
        Ok(match raw.system_version {
            Some(system_version) => descriptor.with_system_version(system_version),
            None => descriptor,
        })
    }

    /// Set the minimum system software version (informational only).
    pub fn with_system_version(mut self, system_version: impl Into<String>) -> Self {
        self.system_version_requirement = system_version.into();
        self
    }

    /// Mark this descriptor's family as carrying a trailing signature block.
    pub fn with_signature_trailer(mut self, enabled: bool) -> Self {
        self.signature_trailer = enabled;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Expected total size of the package in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn system_version_requirement(&self) -> &str {
        &self.system_version_requirement
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Final path segment of the URL.
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Expected digest of the complete file.
    pub fn checksum(&self) -> &[u8] {
        &self.checksum
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Whether the final 32 bytes are a signature excluded from the digest.
    pub fn has_signature_trailer(&self) -> bool {
        self.signature_trailer
    }

    /// Local file name: `v<version> - <basename>`.
    pub fn file_name(&self) -> String {
        local_file_name(&self.version, &self.basename)
    }
}

fn parse_url(url: &str) -> DescriptorResult<(Url, String)> {
    let parsed = Url::parse(url).map_err(|e| DescriptorError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let basename = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DescriptorError::NoFileName {
            url: url.to_string(),
        })?;

    Ok((parsed, basename))
}
