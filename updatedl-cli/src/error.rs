//! CLI error types.

use std::fmt;

use updatedl::config::ConfigError;
use updatedl::download::DownloadError;

/// Errors that end the program with a nonzero exit status.
#[derive(Debug)]
pub enum CliError {
    /// Invalid combination of arguments or settings.
    Config(String),
    /// The configuration or title list file could not be loaded.
    ConfigFile(ConfigError),
    /// The HTTP session could not be set up.
    Session(DownloadError),
    /// Writing to the terminal failed.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "{}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Session(e) => write!(f, "Failed to set up HTTP session: {}", e),
            CliError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(_) => None,
            CliError::ConfigFile(e) => Some(e),
            CliError::Session(e) => Some(e),
            CliError::Io(e) => Some(e),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<DownloadError> for CliError {
    fn from(e: DownloadError) -> Self {
        CliError::Session(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}
