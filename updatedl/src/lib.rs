//! updatedl - resumable, verified downloads of title update packages
//!
//! This library fetches the list of update packages published for a title,
//! then downloads every package into a per-title directory. Interrupted
//! downloads are resumed with HTTP range requests on the next run, and each
//! finished file is checked against the size (and optionally the digest)
//! advertised by the update server.
//!
//! # Architecture
//!
//! ```text
//! BatchOrchestrator
//!         │
//!         ├── MetadataSource (trait)  ── UpdateMetadataClient (XML over HTTPS)
//!         │
//!         ├── plan()                  ── Skip / Restart / Resume
//!         │
//!         ├── HttpDownloader          ── full or ranged transfer via Transport
//!         │
//!         └── IntegrityVerifier       ── size, then optional digest
//! ```
//!
//! Networking goes through a single [`session::Session`] built once from
//! [`config::NetworkConfig`] and handed to every component that needs it.

pub mod config;
pub mod descriptor;
pub mod download;
pub mod logging;
pub mod metadata;
pub mod session;

pub use descriptor::{ChecksumAlgorithm, Descriptor};
pub use download::{BatchOrchestrator, BatchReport, Interrupt, TitleReport};
pub use metadata::{MetadataSource, TitleCollection};
pub use session::{Session, Transport};
