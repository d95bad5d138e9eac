//! Configuration for downloads and networking.
//!
//! Settings come from three places, later ones winning:
//! 1. Built-in defaults
//! 2. The INI configuration file (`<config dir>/updatedl/config.ini`)
//! 3. Command-line flags, applied by the CLI
//!
//! # File format
//!
//! ```ini
//! [download]
//! base_dir = /games/updates
//! chunk_size = 65536
//!
//! [verify]
//! ; size-only or strict
//! checksum = size-only
//! ; continue or abort
//! on_failure = continue
//! ; title id prefixes whose packages end in a 32-byte signature block
//! signature_trailer = NPUA, BLES01234
//!
//! [network]
//! timeout_secs = 300
//! user_agent = updatedl/0.1.0
//! ca_certificate = /etc/updatedl/playstation-ca.pem
//! accept_invalid_certs = false
//! metadata_url = https://a0.ww.np.dl.playstation.net/tpl/np/{id}/{id}-ver.xml
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::download::{ChecksumMode, TrailerFamilies, VerificationPolicy, DEFAULT_CHUNK_SIZE};
use crate::metadata::{normalize_title_id, DEFAULT_METADATA_URL};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Default timeout for establishing a connection in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading configuration or title lists.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    /// A key holds a value of the wrong shape.
    #[error("invalid value '{value}' for {section}.{key}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },
}

/// Settings for the download engine.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Buffer size used when streaming response bodies.
    pub chunk_size: usize,

    /// Re-download files even when they look complete.
    pub overwrite: bool,

    /// Which integrity checks to run after a download.
    pub checksum: ChecksumMode,

    /// What a verification failure does to the rest of the batch.
    pub on_verification_failure: VerificationPolicy,

    /// Title families whose packages carry a trailing signature block that
    /// the checksum does not cover.
    pub signature_trailer: TrailerFamilies,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overwrite: false,
            checksum: ChecksumMode::SizeOnly,
            on_verification_failure: VerificationPolicy::Continue,
            signature_trailer: TrailerFamilies::default(),
        }
    }
}

impl DownloadConfig {
    /// Set the streaming buffer size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Enable or disable overwriting existing files.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Select size-only or strict verification.
    pub fn with_checksum(mut self, checksum: ChecksumMode) -> Self {
        self.checksum = checksum;
        self
    }

    /// Set the verification failure policy.
    pub fn with_verification_policy(mut self, policy: VerificationPolicy) -> Self {
        self.on_verification_failure = policy;
        self
    }

    /// Select the title families whose packages end in a signature block.
    pub fn with_signature_trailer(mut self, families: TrailerFamilies) -> Self {
        self.signature_trailer = families;
        self
    }
}

/// Settings for the shared HTTP session.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// HTTP request timeout.
    pub timeout: Duration,

    /// Connection establishment timeout.
    pub connect_timeout: Duration,

    /// `User-Agent` header sent with every request.
    pub user_agent: String,

    /// Extra PEM root certificate to trust (the update server uses its own CA).
    pub ca_certificate: Option<PathBuf>,

    /// Skip certificate validation entirely.
    ///
    /// The update server presents certificates that fail modern hostname
    /// checks; this is the only relaxation available to the TLS backend.
    pub accept_invalid_certs: bool,

    /// Metadata URL template; `{id}` is replaced by the title id.
    pub metadata_url: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            user_agent: format!("updatedl/{}", env!("CARGO_PKG_VERSION")),
            ca_certificate: None,
            accept_invalid_certs: false,
            metadata_url: DEFAULT_METADATA_URL.to_string(),
        }
    }
}

impl NetworkConfig {
    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Trust an additional PEM root certificate.
    pub fn with_ca_certificate(mut self, path: PathBuf) -> Self {
        self.ca_certificate = Some(path);
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Set the metadata URL template.
    pub fn with_metadata_url(mut self, template: impl Into<String>) -> Self {
        self.metadata_url = template.into();
        self
    }
}

/// Contents of the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    /// Default output directory when none is given on the command line.
    pub base_dir: Option<PathBuf>,
    pub download: DownloadConfig,
    pub network: NetworkConfig,
}

impl ConfigFile {
    /// Load the default configuration file, or defaults if it does not exist.
    pub fn load() -> ConfigResult<Self> {
        match config_file_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let ini = Ini::load_from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_ini(&ini)
    }

    /// Build configuration from parsed INI data; missing keys keep defaults.
    pub fn from_ini(ini: &Ini) -> ConfigResult<Self> {
        let mut config = Self::default();
        let get = |section: &str, key: &str| {
            ini.section(Some(section))
                .and_then(|s| s.get(key))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        if let Some(dir) = get("download", "base_dir") {
            config.base_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = get("download", "chunk_size") {
            let size: usize = parse_value("download", "chunk_size", value)?;
            if size == 0 {
                return Err(invalid("download", "chunk_size", value));
            }
            config.download.chunk_size = size;
        }

        if let Some(value) = get("verify", "checksum") {
            config.download.checksum = match value.to_ascii_lowercase().as_str() {
                "size-only" | "size" | "off" => ChecksumMode::SizeOnly,
                "strict" | "on" => ChecksumMode::Strict,
                _ => return Err(invalid("verify", "checksum", value)),
            };
        }
        if let Some(value) = get("verify", "on_failure") {
            config.download.on_verification_failure = match value.to_ascii_lowercase().as_str() {
                "continue" => VerificationPolicy::Continue,
                "abort" => VerificationPolicy::AbortBatch,
                _ => return Err(invalid("verify", "on_failure", value)),
            };
        }
        if let Some(value) = get("verify", "signature_trailer") {
            config.download.signature_trailer = TrailerFamilies::parse_list(value);
        }

        if let Some(value) = get("network", "timeout_secs") {
            let secs: u64 = parse_value("network", "timeout_secs", value)?;
            config.network.timeout = Duration::from_secs(secs);
        }
        if let Some(value) = get("network", "user_agent") {
            config.network.user_agent = value.to_string();
        }
        if let Some(value) = get("network", "ca_certificate") {
            config.network.ca_certificate = Some(PathBuf::from(value));
        }
        if let Some(value) = get("network", "accept_invalid_certs") {
            config.network.accept_invalid_certs =
                parse_bool("network", "accept_invalid_certs", value)?;
        }
        if let Some(value) = get("network", "metadata_url") {
            if !value.contains("{id}") {
                return Err(invalid("network", "metadata_url", value));
            }
            config.network.metadata_url = value.to_string();
        }

        Ok(config)
    }
}

/// Path of the default configuration file.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("updatedl").join("config.ini"))
}

/// Read title ids from a list file.
///
/// One id per line; blank lines and lines starting with `#` are ignored.
/// Malformed ids are returned separately so the caller can report them.
pub fn read_title_ids(path: &Path) -> ConfigResult<(Vec<String>, Vec<String>)> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(parse_title_ids(&text))
}

/// Split list-file text into valid (normalized) and invalid ids.
pub fn parse_title_ids(text: &str) -> (Vec<String>, Vec<String>) {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match normalize_title_id(line) {
            Some(id) => valid.push(id),
            None => invalid.push(line.to_string()),
        }
    }

    (valid, invalid)
}

fn parse_value<T: FromStr>(section: &'static str, key: &'static str, value: &str) -> ConfigResult<T> {
    value.parse().map_err(|_| invalid(section, key, value))
}

fn parse_bool(section: &'static str, key: &'static str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(section, key, value)),
    }
}

fn invalid(section: &'static str, key: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section,
        key,
        value: value.to_string(),
    }
}
