//! HTTP package downloader with resume support.
//!
//! This module performs the byte transfer for one package:
//! - Full downloads into a freshly truncated file
//! - Resumed downloads via HTTP Range requests
//! - Fallback to a full rewrite when the server ignores the range
//! - Per-chunk progress callbacks and interrupt checks

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use reqwest::StatusCode;
use tracing::{debug, warn};

use super::error::{DownloadError, DownloadResult};
use super::interrupt::Interrupt;
use super::progress::DownloadProgress;
use crate::session::{ByteRange, Transport};

/// Default buffer size for streaming response bodies (64KB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Result of one transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The response body was written completely.
    Completed {
        /// Bytes written during this call.
        bytes_written: u64,
        /// The server ignored the range and the file was rewritten from 0.
        restarted: bool,
    },
    /// The server refused the requested range (HTTP 416).
    ServerRejectedResume { status: u16 },
    /// The request failed or the server answered with an unusable status.
    NetworkFailure { reason: String },
    /// The user interrupted the transfer; the partial file was kept.
    Interrupted { position: u64 },
}

/// Downloads package files through a [`Transport`].
pub struct HttpDownloader<'a> {
    transport: &'a dyn Transport,
    chunk_size: usize,
    interrupt: Interrupt,
}

impl<'a> HttpDownloader<'a> {
    /// Create a downloader with the default chunk size.
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self {
            transport,
            chunk_size: DEFAULT_CHUNK_SIZE,
            interrupt: Interrupt::default(),
        }
    }

    /// Set the streaming buffer size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Stop transfers when `interrupt` is triggered.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Download `url` into `dest`, starting at `start_offset`.
    ///
    /// With `start_offset == 0` the file is truncated and fetched in full.
    /// Otherwise bytes `[start_offset, expected_size]` are requested and
    /// appended. Server refusals and connection failures are returned as
    /// [`Outcome`] values; only local I/O failures are errors.
    pub fn execute(
        &self,
        url: &str,
        dest: &Path,
        start_offset: u64,
        expected_size: u64,
        progress: &dyn DownloadProgress,
    ) -> DownloadResult<Outcome> {
        let label = file_label(dest);
        let mut file = open_destination(dest, start_offset)?;

        let range = (start_offset > 0).then(|| ByteRange::new(start_offset, expected_size));
        let response = match self.transport.get(url, range) {
            Ok(response) => response,
            Err(e) => {
                warn!("Download failed for {}: {}. Skipping.", label, e);
                return Ok(Outcome::NetworkFailure {
                    reason: format!("{}: {}", label, e),
                });
            }
        };

        let (position, restarted) = match response.status {
            StatusCode::OK => {
                if start_offset > 0 {
                    // Server wants to give us the whole file
                    debug!(file = %label, "range ignored by server, rewriting from start");
                    file.set_len(0).map_err(|e| write_failed(dest, e))?;
                    file.seek(SeekFrom::Start(0))
                        .map_err(|e| write_failed(dest, e))?;
                }
                (0, start_offset > 0)
            }
            StatusCode::PARTIAL_CONTENT => (start_offset, false),
            StatusCode::RANGE_NOT_SATISFIABLE => {
                warn!(
                    "Server refused to resume {} at byte {}. Pass --force to re-download it.",
                    label, start_offset
                );
                return Ok(Outcome::ServerRejectedResume {
                    status: response.status.as_u16(),
                });
            }
            status => {
                warn!("Download failed for {} (HTTP {}). Skipping.", label, status);
                return Ok(Outcome::NetworkFailure {
                    reason: format!("{}: unexpected HTTP status {}", label, status),
                });
            }
        };

        self.stream_body(
            response.body,
            file,
            dest,
            &label,
            position,
            expected_size,
            restarted,
            progress,
        )
    }

    /// Stream the response body to the destination file.
    #[allow(clippy::too_many_arguments)]
    fn stream_body(
        &self,
        mut body: Box<dyn Read + Send>,
        file: File,
        dest: &Path,
        label: &str,
        start: u64,
        expected_size: u64,
        restarted: bool,
        progress: &dyn DownloadProgress,
    ) -> DownloadResult<Outcome> {
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut buffer = vec![0u8; self.chunk_size];
        let mut position = start;

        progress.begin(label, expected_size, position);

        let outcome = loop {
            if self.interrupt.is_triggered() {
                debug!(file = %label, position, "interrupted");
                break Outcome::Interrupted { position };
            }

            let bytes_read = match body.read(&mut buffer) {
                Ok(0) => {
                    break Outcome::Completed {
                        bytes_written: position - start,
                        restarted,
                    }
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Download of {} stopped at byte {}: {}", label, position, e);
                    break Outcome::NetworkFailure {
                        reason: format!("{}: read error at byte {}: {}", label, position, e),
                    };
                }
            };

            if let Err(e) = writer.write_all(&buffer[..bytes_read]) {
                progress.finish();
                return Err(write_failed(dest, e));
            }

            position += bytes_read as u64;
            progress.update(position);
        };

        progress.finish();
        writer.flush().map_err(|e| write_failed(dest, e))?;

        Ok(outcome)
    }
}

/// Open the destination file positioned for writing at `start_offset`.
fn open_destination(dest: &Path, start_offset: u64) -> DownloadResult<File> {
    if start_offset == 0 {
        return File::create(dest).map_err(|e| write_failed(dest, e));
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(dest)
        .map_err(|e| write_failed(dest, e))?;
    file.seek(SeekFrom::Start(start_offset))
        .map_err(|e| write_failed(dest, e))?;
    Ok(file)
}

fn write_failed(dest: &Path, source: io::Error) -> DownloadError {
    DownloadError::WriteFailed {
        path: dest.to_path_buf(),
        source,
    }
}

fn file_label(dest: &Path) -> String {
    dest.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::progress::{CallbackProgress, NoProgress};
    use crate::download::test_support::{body, FakeTransport, RangeMode};
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const URL: &str = "http://updates.example/pkg.bin";

    #[test]
    fn test_full_download() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg.bin");
        let transport = FakeTransport::new(RangeMode::Honour).with_file(URL, body(1000));

        let outcome = HttpDownloader::new(&transport)
            .with_chunk_size(64)
            .execute(URL, &dest, 0, 1000, &NoProgress)
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Completed {
                bytes_written: 1000,
                restarted: false
            }
        );
        assert_eq!(fs::read(&dest).unwrap(), body(1000));
        assert_eq!(transport.requests(), vec![(URL.to_string(), None)]);
    }

    #[test]
    fn test_full_download_truncates_existing_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg.bin");
        fs::write(&dest, vec![0xFFu8; 4000]).unwrap();
        let transport = FakeTransport::new(RangeMode::Honour).with_file(URL, body(1000));

        HttpDownloader::new(&transport)
            .execute(URL, &dest, 0, 1000, &NoProgress)
            .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), body(1000));
    }

    #[test]
    fn test_resume_with_partial_content() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg.bin");
        let prefix = vec![0xAAu8; 500];
        fs::write(&dest, &prefix).unwrap();

        let full = body(1000);
        let transport = FakeTransport::new(RangeMode::Honour).with_file(URL, full.clone());

        let outcome = HttpDownloader::new(&transport)
            .with_chunk_size(128)
            .execute(URL, &dest, 500, 1000, &NoProgress)
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Completed {
                bytes_written: 500,
                restarted: false
            }
        );
        let written = fs::read(&dest).unwrap();
        assert_eq!(written.len(), 1000);
        assert_eq!(&written[..500], &prefix[..]);
        assert_eq!(&written[500..], &full[500..]);
        assert_eq!(
            transport.requests(),
            vec![(URL.to_string(), Some(ByteRange::new(500, 1000)))]
        );
    }

    #[test]
    fn test_resume_ignored_by_server_rewrites_from_start() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg.bin");
        fs::write(&dest, vec![0xAAu8; 500]).unwrap();

        let full = body(1000);
        let transport = FakeTransport::new(RangeMode::Ignore).with_file(URL, full.clone());

        let outcome = HttpDownloader::new(&transport)
            .execute(URL, &dest, 500, 1000, &NoProgress)
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Completed {
                bytes_written: 1000,
                restarted: true
            }
        );
        let written = fs::read(&dest).unwrap();
        assert_eq!(written.len(), 1000);
        assert_eq!(written, full);
    }

    #[test]
    fn test_range_not_satisfiable() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg.bin");
        fs::write(&dest, vec![1u8; 10]).unwrap();

        let transport = FakeTransport::new(RangeMode::Status(StatusCode::RANGE_NOT_SATISFIABLE))
            .with_file(URL, body(100));

        let outcome = HttpDownloader::new(&transport)
            .execute(URL, &dest, 10, 100, &NoProgress)
            .unwrap();

        assert_eq!(outcome, Outcome::ServerRejectedResume { status: 416 });
        assert_eq!(fs::read(&dest).unwrap(), vec![1u8; 10]);
    }

    #[test]
    fn test_unexpected_status_is_network_failure() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg.bin");
        let transport = FakeTransport::new(RangeMode::Honour);

        let outcome = HttpDownloader::new(&transport)
            .execute(URL, &dest, 0, 100, &NoProgress)
            .unwrap();

        match outcome {
            Outcome::NetworkFailure { reason } => {
                assert!(reason.contains("pkg.bin"));
                assert!(reason.contains("404"));
            }
            other => panic!("expected NetworkFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_connection_failure_is_network_failure() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg.bin");
        let transport = FakeTransport::new(RangeMode::Unreachable);

        let outcome = HttpDownloader::new(&transport)
            .execute(URL, &dest, 0, 100, &NoProgress)
            .unwrap();

        match outcome {
            Outcome::NetworkFailure { reason } => assert!(reason.starts_with("pkg.bin: ")),
            other => panic!("expected NetworkFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_dropped_connection_keeps_partial_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg.bin");
        let full = body(1000);
        let transport = FakeTransport::new(RangeMode::DropAfter(300)).with_file(URL, full.clone());

        let outcome = HttpDownloader::new(&transport)
            .with_chunk_size(100)
            .execute(URL, &dest, 0, 1000, &NoProgress)
            .unwrap();

        match outcome {
            Outcome::NetworkFailure { reason } => {
                assert!(reason.contains("pkg.bin"));
                assert!(reason.contains("byte 300"));
            }
            other => panic!("expected NetworkFailure, got {:?}", other),
        }
        assert_eq!(fs::read(&dest).unwrap(), &full[..300]);
    }

    #[test]
    fn test_interrupt_stops_before_transfer() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg.bin");
        let transport = FakeTransport::new(RangeMode::Honour).with_file(URL, body(1000));
        let interrupt = Interrupt::new();
        interrupt.trigger();

        let outcome = HttpDownloader::new(&transport)
            .with_interrupt(interrupt)
            .execute(URL, &dest, 0, 1000, &NoProgress)
            .unwrap();

        assert_eq!(outcome, Outcome::Interrupted { position: 0 });
    }

    #[test]
    fn test_progress_reports_cumulative_bytes() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg.bin");
        fs::write(&dest, vec![0u8; 200]).unwrap();
        let transport = FakeTransport::new(RangeMode::Honour).with_file(URL, body(1000));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let progress = CallbackProgress::new(Box::new(move |bytes, total| {
            seen_clone.lock().unwrap().push((bytes, total));
        }));

        HttpDownloader::new(&transport)
            .with_chunk_size(400)
            .execute(URL, &dest, 200, 1000, &progress)
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&(200, 1000)));
        assert_eq!(seen.last(), Some(&(1000, 1000)));
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn test_chunk_size_minimum() {
        let transport = FakeTransport::new(RangeMode::Honour);
        let downloader = HttpDownloader::new(&transport).with_chunk_size(0);
        assert_eq!(downloader.chunk_size(), 1);
    }
}
