//! Resumable, verified package downloads.
//!
//! This module provides the download engine:
//! - Resume planning from the local file state (`planner`)
//! - Full and ranged HTTP transfers (`http`)
//! - Size and digest verification (`verify`)
//! - Progress reporting (`progress`)
//! - Cooperative cancellation (`interrupt`)
//! - Title-level orchestration (`orchestrator`)
//!
//! # Architecture
//!
//! ```text
//! BatchOrchestrator
//!         │
//!         ├── MetadataSource ──► TitleCollection
//!         │
//!         └── per Descriptor:
//!                 plan() ──► HttpDownloader::execute() ──► IntegrityVerifier::verify()
//!                  │                │                               │
//!               Decision         Outcome                  VerificationResult
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use updatedl::config::{DownloadConfig, NetworkConfig};
//! use updatedl::download::BatchOrchestrator;
//! use updatedl::metadata::UpdateMetadataClient;
//! use updatedl::session::Session;
//!
//! let network = NetworkConfig::default();
//! let session = Session::new(&network)?;
//! let metadata = UpdateMetadataClient::new(&session, &network);
//!
//! let orchestrator = BatchOrchestrator::new(&metadata, &session, DownloadConfig::default());
//! let report = orchestrator.run(&["NPUA80662"], Path::new("/games/updates"));
//! println!("{} downloaded, {} skipped", report.downloaded(), report.skipped());
//! ```

mod error;
mod http;
mod interrupt;
mod orchestrator;
mod planner;
mod progress;
mod verify;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{DownloadError, DownloadResult};
pub use http::{HttpDownloader, Outcome, DEFAULT_CHUNK_SIZE};
pub use interrupt::Interrupt;
pub use orchestrator::{
    BatchOrchestrator, BatchReport, DescriptorOutcome, DescriptorReport, TitleOutcome,
    TitleReport, VerificationPolicy,
};
pub use planner::{local_length, plan, Decision, SkipReason};
pub use progress::{CallbackProgress, DownloadProgress, NoProgress, ProgressCallback};
pub use verify::{
    calculate_file_digest, file_size, ChecksumMode, IntegrityVerifier, TrailerFamilies,
    VerificationResult, SIGNATURE_TRAILER_LEN,
};
