//! Title update metadata.
//!
//! The download engine only needs an ordered list of descriptors per title,
//! so it depends on the [`MetadataSource`] trait rather than on any wire
//! format. [`UpdateMetadataClient`] is the production source: it fetches the
//! update server's XML document for a title and validates every package
//! entry into a [`Descriptor`].

mod client;
mod xml;

pub use client::{normalize_title_id, UpdateMetadataClient, DEFAULT_METADATA_URL};

use thiserror::Error;

use crate::descriptor::Descriptor;
use crate::session::TransportError;

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;

/// Errors that prevent a title's packages from being listed.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The identifier is not a well-formed title id.
    #[error("invalid title id \"{title_id}\"")]
    InvalidTitleId { title_id: String },

    /// The server does not know the title.
    #[error("unknown title id \"{title_id}\" (HTTP {status})")]
    UnknownTitle { title_id: String, status: u16 },

    /// The server answered with a document that could not be used.
    #[error("unparsable update metadata for \"{title_id}\": {reason}")]
    Unparsable { title_id: String, reason: String },

    /// The server failed or could not be reached.
    #[error("failed to fetch update metadata for \"{title_id}\": {reason}")]
    Unavailable { title_id: String, reason: String },

    #[error("failed to fetch update metadata for \"{title_id}\": {source}")]
    Transport {
        title_id: String,
        #[source]
        source: TransportError,
    },
}

/// The packages published for one title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleCollection {
    pub title_id: String,
    /// Localized title names as published; the first is the display title.
    pub titles: Vec<String>,
    /// Packages in publication order.
    pub descriptors: Vec<Descriptor>,
}

impl TitleCollection {
    pub fn new(
        title_id: impl Into<String>,
        titles: Vec<String>,
        descriptors: Vec<Descriptor>,
    ) -> Self {
        Self {
            title_id: title_id.into(),
            titles,
            descriptors,
        }
    }

    /// Name used for the title's output directory.
    ///
    /// Falls back to the title id when the metadata carries no names.
    pub fn display_title(&self) -> &str {
        self.titles
            .first()
            .map(String::as_str)
            .unwrap_or(&self.title_id)
    }
}

/// Source of update descriptors for a title.
pub trait MetadataSource {
    /// List the packages published for `title_id`, in order.
    fn fetch_descriptors(&self, title_id: &str) -> MetadataResult<TitleCollection>;
}
