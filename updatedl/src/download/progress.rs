//! Progress reporting for package downloads.
//!
//! The download loop calls a [`DownloadProgress`] implementation
//! synchronously after every chunk. Positions are absolute byte offsets in
//! the destination file, so a resumed download starts reporting at its
//! resume offset rather than at zero.

use std::sync::atomic::{AtomicU64, Ordering};

/// Progress callback receiving `(bytes_downloaded, total_bytes)`.
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Receiver for per-file download progress.
pub trait DownloadProgress {
    /// A transfer of `label` has started at `position` of `total` bytes.
    fn begin(&self, label: &str, total: u64, position: u64);

    /// `position` bytes of the file are now on disk.
    fn update(&self, position: u64);

    /// The transfer ended, successfully or not.
    fn finish(&self);
}

/// Progress sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {
    fn begin(&self, _label: &str, _total: u64, _position: u64) {}

    fn update(&self, _position: u64) {}

    fn finish(&self) {}
}

/// Adapts a [`ProgressCallback`] to [`DownloadProgress`].
pub struct CallbackProgress {
    callback: ProgressCallback,
    total: AtomicU64,
}

impl CallbackProgress {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback,
            total: AtomicU64::new(0),
        }
    }
}

impl DownloadProgress for CallbackProgress {
    fn begin(&self, _label: &str, total: u64, position: u64) {
        self.total.store(total, Ordering::Relaxed);
        (self.callback)(position, total);
    }

    fn update(&self, position: u64) {
        let total = self.total.load(Ordering::Relaxed);
        (self.callback)(position, total);
    }

    fn finish(&self) {}
}
