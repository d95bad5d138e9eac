//! Batch download orchestration.
//!
//! This module drives whole titles: it asks the metadata source for a
//! title's packages, creates the title directory, and runs plan, transfer
//! and verification for each package in order. One failing package never
//! stops its siblings; only an interrupt or the
//! [`VerificationPolicy::AbortBatch`] policy ends a batch early.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, info_span, warn};

use super::error::DownloadError;
use super::http::{HttpDownloader, Outcome};
use super::interrupt::Interrupt;
use super::planner::{local_length, plan, Decision, SkipReason};
use super::progress::{DownloadProgress, NoProgress};
use super::verify::{IntegrityVerifier, VerificationResult};
use crate::config::DownloadConfig;
use crate::descriptor::{sanitize_component, Descriptor};
use crate::metadata::{MetadataError, MetadataSource};
use crate::session::Transport;

/// What to do when a downloaded file fails verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationPolicy {
    /// Report the failure and move on to the next package.
    #[default]
    Continue,
    /// Report the failure and stop the whole batch.
    AbortBatch,
}

/// Final state of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorOutcome {
    /// The existing file was left alone.
    Skipped(SkipReason),
    /// Downloaded (fully or by resuming) and verified.
    Downloaded { bytes_written: u64 },
    /// Downloaded, but the result did not verify.
    VerificationFailed(VerificationResult),
    /// The transfer did not complete.
    Failed { reason: String },
    /// The user interrupted the transfer.
    Interrupted,
}

/// Report for one package of a title.
#[derive(Debug, Clone)]
pub struct DescriptorReport {
    pub version: String,
    pub path: PathBuf,
    pub outcome: DescriptorOutcome,
}

/// Final state of one title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleOutcome {
    /// Every package was attempted.
    Completed,
    /// The title could not be processed at all.
    Failed { reason: String },
    /// A verification failure stopped the batch.
    Aborted,
    /// The user interrupted the batch.
    Interrupted,
}

/// Report for one title.
#[derive(Debug, Clone)]
pub struct TitleReport {
    pub title_id: String,
    /// Display title, when metadata was fetched.
    pub title: Option<String>,
    /// Output directory, when it was created.
    pub directory: Option<PathBuf>,
    pub outcome: TitleOutcome,
    pub descriptors: Vec<DescriptorReport>,
}

impl TitleReport {
    fn failed(title_id: &str, reason: String) -> Self {
        Self {
            title_id: title_id.to_string(),
            title: None,
            directory: None,
            outcome: TitleOutcome::Failed { reason },
            descriptors: Vec::new(),
        }
    }

    /// Whether processing should stop after this title.
    pub fn stops_batch(&self) -> bool {
        matches!(
            self.outcome,
            TitleOutcome::Aborted | TitleOutcome::Interrupted
        )
    }

    fn count(&self, predicate: impl Fn(&DescriptorOutcome) -> bool) -> usize {
        self.descriptors
            .iter()
            .filter(|d| predicate(&d.outcome))
            .count()
    }
}

/// Reports for every title processed in a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub titles: Vec<TitleReport>,
}

impl BatchReport {
    /// Titles whose metadata or directory could not be obtained.
    pub fn failed_titles(&self) -> usize {
        self.titles
            .iter()
            .filter(|t| matches!(t.outcome, TitleOutcome::Failed { .. }))
            .count()
    }

    pub fn downloaded(&self) -> usize {
        self.sum(|d| matches!(d, DescriptorOutcome::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.sum(|d| matches!(d, DescriptorOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.sum(|d| matches!(d, DescriptorOutcome::Failed { .. }))
    }

    pub fn verification_failures(&self) -> usize {
        self.sum(|d| matches!(d, DescriptorOutcome::VerificationFailed(_)))
    }

    pub fn was_interrupted(&self) -> bool {
        self.titles
            .iter()
            .any(|t| t.outcome == TitleOutcome::Interrupted)
    }

    pub fn was_aborted(&self) -> bool {
        self.titles.iter().any(|t| t.outcome == TitleOutcome::Aborted)
    }

    fn sum(&self, predicate: impl Fn(&DescriptorOutcome) -> bool + Copy) -> usize {
        self.titles.iter().map(|t| t.count(predicate)).sum()
    }
}

/// Downloads every package of one or more titles.
pub struct BatchOrchestrator<'a> {
    metadata: &'a dyn MetadataSource,
    downloader: HttpDownloader<'a>,
    verifier: IntegrityVerifier,
    progress: &'a dyn DownloadProgress,
    config: DownloadConfig,
    interrupt: Interrupt,
}

impl<'a> BatchOrchestrator<'a> {
    /// Create an orchestrator using `transport` for package downloads.
    pub fn new(
        metadata: &'a dyn MetadataSource,
        transport: &'a dyn Transport,
        config: DownloadConfig,
    ) -> Self {
        Self {
            metadata,
            downloader: HttpDownloader::new(transport).with_chunk_size(config.chunk_size),
            verifier: IntegrityVerifier::new(config.checksum),
            progress: &NoProgress,
            config,
            interrupt: Interrupt::default(),
        }
    }

    /// Report per-file progress to `progress`.
    pub fn with_progress(mut self, progress: &'a dyn DownloadProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Stop at the next safe point once `interrupt` is triggered.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.downloader = self.downloader.with_interrupt(interrupt.clone());
        self.interrupt = interrupt;
        self
    }

    /// Process every title in order, using the configured overwrite flag.
    ///
    /// Stops early only when a title is interrupted or aborted by the
    /// verification policy.
    pub fn run<S: AsRef<str>>(&self, title_ids: &[S], output_base_dir: &Path) -> BatchReport {
        let mut report = BatchReport::default();

        for title_id in title_ids {
            if self.interrupt.is_triggered() {
                break;
            }

            let title = self.process(title_id.as_ref(), output_base_dir, self.config.overwrite);
            let stop = title.stops_batch();
            report.titles.push(title);
            if stop {
                break;
            }
        }

        report
    }

    /// Download all packages of `title_id` into `<output_base_dir>/<title>`.
    ///
    /// Never fails: metadata and directory errors are logged and returned
    /// in the report so that the caller can carry on with other titles.
    pub fn process(&self, title_id: &str, output_base_dir: &Path, overwrite: bool) -> TitleReport {
        let span = info_span!("title", id = title_id);
        let _enter = span.enter();

        let mut collection = match self.metadata.fetch_descriptors(title_id) {
            Ok(collection) => collection,
            Err(e @ MetadataError::Unparsable { .. }) => {
                warn!("No updates available for \"{}\" ({})", title_id, e);
                return TitleReport {
                    title_id: title_id.to_string(),
                    title: None,
                    directory: None,
                    outcome: TitleOutcome::Completed,
                    descriptors: Vec::new(),
                };
            }
            Err(e) => {
                error!(
                    "Error downloading \"{}\". Make sure it's a valid title ID. ({})",
                    title_id, e
                );
                return TitleReport::failed(title_id, e.to_string());
            }
        };

        if self.config.signature_trailer.contains(&collection.title_id) {
            debug!("packages end in a signature block");
            collection.descriptors = collection
                .descriptors
                .into_iter()
                .map(|d| d.with_signature_trailer(true))
                .collect();
        }

        let title = collection.display_title().to_string();
        let directory = output_base_dir.join(sanitize_component(&title));
        if let Err(e) = fs::create_dir_all(&directory) {
            let e = DownloadError::CreateDirFailed {
                path: directory,
                source: e,
            };
            error!("Error downloading \"{}\": {}", title_id, e);
            return TitleReport::failed(title_id, e.to_string());
        }

        info!("Downloading \"{}\" [{}]...", title, title_id);
        if collection.descriptors.is_empty() {
            info!("No updates available for \"{}\"", title);
        }

        let mut report = TitleReport {
            title_id: title_id.to_string(),
            title: Some(title),
            directory: Some(directory.clone()),
            outcome: TitleOutcome::Completed,
            descriptors: Vec::with_capacity(collection.descriptors.len()),
        };

        let total = collection.descriptors.len();
        for (index, descriptor) in collection.descriptors.iter().enumerate() {
            if self.interrupt.is_triggered() {
                report.outcome = TitleOutcome::Interrupted;
                break;
            }

            info!("[{}/{}] {}", index + 1, total, descriptor.file_name());
            let outcome = self.process_descriptor(&directory, descriptor, overwrite);
            let stop = match &outcome {
                DescriptorOutcome::Interrupted => Some(TitleOutcome::Interrupted),
                DescriptorOutcome::VerificationFailed(_)
                    if self.config.on_verification_failure == VerificationPolicy::AbortBatch =>
                {
                    Some(TitleOutcome::Aborted)
                }
                _ => None,
            };

            report.descriptors.push(DescriptorReport {
                version: descriptor.version().to_string(),
                path: directory.join(descriptor.file_name()),
                outcome,
            });

            if let Some(outcome) = stop {
                report.outcome = outcome;
                break;
            }
        }

        report
    }

    /// Plan, transfer and verify one package.
    fn process_descriptor(
        &self,
        directory: &Path,
        descriptor: &Descriptor,
        overwrite: bool,
    ) -> DescriptorOutcome {
        let file_name = descriptor.file_name();
        let path = directory.join(&file_name);

        let existing = match local_length(&path) {
            Ok(existing) => existing,
            Err(e) => {
                error!("{}", e);
                return DescriptorOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let start_offset = match plan(existing, descriptor.size(), overwrite) {
            Decision::Skip(reason) => {
                info!("{} {}", file_name, reason);
                return DescriptorOutcome::Skipped(reason);
            }
            Decision::Restart => 0,
            Decision::Resume { offset } => offset,
        };

        let outcome = self.downloader.execute(
            descriptor.url().as_str(),
            &path,
            start_offset,
            descriptor.size(),
            self.progress,
        );

        let bytes_written = match outcome {
            Ok(Outcome::Completed { bytes_written, .. }) => bytes_written,
            Ok(Outcome::ServerRejectedResume { status }) => {
                return DescriptorOutcome::Failed {
                    reason: format!("server rejected resume (HTTP {})", status),
                }
            }
            Ok(Outcome::NetworkFailure { reason }) => return DescriptorOutcome::Failed { reason },
            Ok(Outcome::Interrupted { position }) => {
                warn!(
                    "Interrupted; {} kept at {} of {} bytes",
                    file_name,
                    position,
                    descriptor.size()
                );
                return DescriptorOutcome::Interrupted;
            }
            Err(e) => {
                error!("{}", e);
                return DescriptorOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        match self.verifier.verify(&path, descriptor) {
            Ok(VerificationResult::Ok) => DescriptorOutcome::Downloaded { bytes_written },
            Ok(mismatch) => {
                error!("{}: {}", path.display(), mismatch);
                DescriptorOutcome::VerificationFailed(mismatch)
            }
            Err(e) => {
                error!("{}", e);
                DescriptorOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
