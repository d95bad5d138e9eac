//! Console output: per-file progress bars and the end-of-run summary.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use updatedl::download::{DownloadProgress, TitleOutcome};
use updatedl::BatchReport;

const BAR_TEMPLATE: &str =
    "{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} eta {eta}";

/// Shows one `indicatif` bar per package transfer.
pub struct ConsoleProgress {
    hidden: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleProgress {
    /// Create a progress display; `hidden` suppresses all drawing.
    pub fn new(hidden: bool) -> Self {
        Self {
            hidden,
            bar: Mutex::new(None),
        }
    }
}

impl DownloadProgress for ConsoleProgress {
    fn begin(&self, label: &str, total: u64, position: u64) {
        let bar = if self.hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total)
        };
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.set_message(label.to_string());
        // Resumed transfers start part-way; the rate is measured from here.
        bar.set_position(position);
        bar.reset_eta();

        if let Ok(mut slot) = self.bar.lock() {
            if let Some(previous) = slot.replace(bar) {
                previous.abandon();
            }
        }
    }

    fn update(&self, position: u64) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                bar.set_position(position);
            }
        }
    }

    fn finish(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.abandon();
            }
        }
    }
}

/// Render the end-of-run summary.
pub fn format_summary(report: &BatchReport) -> String {
    let mut lines = vec![format!(
        "{} downloaded, {} skipped, {} failed, {} failed verification",
        report.downloaded(),
        report.skipped(),
        report.failed(),
        report.verification_failures()
    )];

    for title in &report.titles {
        if let TitleOutcome::Failed { reason } = &title.outcome {
            lines.push(format!("  {}: {}", title.title_id, reason));
        }
    }

    if report.was_interrupted() {
        lines.push("Interrupted. Partial files will be resumed on the next run.".to_string());
    } else if report.was_aborted() {
        lines.push("Stopped after a verification failure.".to_string());
    }

    lines.join("\n")
}

/// Print the end-of-run summary to stdout.
pub fn print_summary(report: &BatchReport) {
    println!("{}", format_summary(report));
}
