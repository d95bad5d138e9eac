//! HTTP client for the update metadata service.

use std::io::Read;

use tracing::debug;

use super::xml::parse_title_patch;
use super::{MetadataError, MetadataResult, MetadataSource, TitleCollection};
use crate::config::NetworkConfig;
use crate::descriptor::{ChecksumAlgorithm, Descriptor};
use crate::session::Transport;

/// Default location of a title's update document; `{id}` is replaced by
/// the title id.
pub const DEFAULT_METADATA_URL: &str =
    "https://a0.ww.np.dl.playstation.net/tpl/np/{id}/{id}-ver.xml";

/// Normalize a user-supplied title id.
///
/// Ids are trimmed and upper-cased. Returns `None` unless the result is a
/// non-empty run of ASCII letters and digits.
pub fn normalize_title_id(raw: &str) -> Option<String> {
    let id = raw.trim().to_ascii_uppercase();
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(id)
    } else {
        None
    }
}

/// Fetches and parses update documents from the update server.
pub struct UpdateMetadataClient<'a> {
    transport: &'a dyn Transport,
    url_template: String,
}

impl<'a> UpdateMetadataClient<'a> {
    /// Create a client using the metadata URL template from `config`.
    pub fn new(transport: &'a dyn Transport, config: &NetworkConfig) -> Self {
        Self {
            transport,
            url_template: config.metadata_url.clone(),
        }
    }

    /// Metadata URL for a normalized title id.
    pub fn metadata_url(&self, title_id: &str) -> String {
        self.url_template.replace("{id}", title_id)
    }

    fn fetch_document(&self, title_id: &str) -> MetadataResult<String> {
        let url = self.metadata_url(title_id);
        debug!(url = %url, "fetching update metadata");

        let response = self
            .transport
            .get(&url, None)
            .map_err(|e| MetadataError::Transport {
                title_id: title_id.to_string(),
                source: e,
            })?;

        let status = response.status;
        if status.is_client_error() {
            return Err(MetadataError::UnknownTitle {
                title_id: title_id.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(MetadataError::Unavailable {
                title_id: title_id.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let mut document = String::new();
        let mut body = response.body;
        body.read_to_string(&mut document)
            .map_err(|e| MetadataError::Unavailable {
                title_id: title_id.to_string(),
                reason: format!("failed to read response: {}", e),
            })?;

        Ok(document)
    }
}

impl MetadataSource for UpdateMetadataClient<'_> {
    fn fetch_descriptors(&self, title_id: &str) -> MetadataResult<TitleCollection> {
        let id = normalize_title_id(title_id).ok_or_else(|| MetadataError::InvalidTitleId {
            title_id: title_id.to_string(),
        })?;

        let document = self.fetch_document(&id)?;
        let unparsable = |reason: String| MetadataError::Unparsable {
            title_id: id.clone(),
            reason,
        };

        let patch = parse_title_patch(&document).map_err(unparsable)?;

        let descriptors = patch
            .packages
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let algorithm = raw
                    .checksum
                    .as_deref()
                    .map(ChecksumAlgorithm::from_hex_digest)
                    .unwrap_or_default();
                Descriptor::from_raw(raw, algorithm)
                    .map_err(|e| unparsable(format!("package {}: {}", index + 1, e)))
            })
            .collect::<MetadataResult<Vec<_>>>()?;

        debug!(
            title_id = %id,
            packages = descriptors.len(),
            "update metadata parsed"
        );

        Ok(TitleCollection::new(id, patch.titles, descriptors))
    }
}
