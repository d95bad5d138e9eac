//! updatedl CLI - download every update package for the given titles.
//!
//! ```text
//! updatedl -o BASE_DIR TITLE_ID_1 [TITLE_ID_2...]
//! ```
//!
//! A subdirectory of the base directory is created for each title. Files
//! left partially downloaded by an earlier run are resumed.

mod error;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, CommandFactory, Parser};
use tracing::{info, warn};
use updatedl::config::{read_title_ids, ConfigFile, DownloadConfig, NetworkConfig};
use updatedl::download::{ChecksumMode, VerificationPolicy};
use updatedl::metadata::{normalize_title_id, UpdateMetadataClient};
use updatedl::{logging, BatchOrchestrator, Interrupt, Session};

use crate::error::CliError;
use crate::output::{print_summary, ConsoleProgress};

/// Download all updates for all given titles to the given base directory.
#[derive(Parser, Debug)]
#[command(name = "updatedl")]
#[command(version)]
#[command(about = "Download all updates for all given titles to the given base directory.")]
#[command(long_about = "Download all updates for all given titles to the given base directory.\n\
    A subdirectory inside the base directory will be created for each title.\n\n\
    Interrupted downloads are resumed on the next run. Press Ctrl+C once to\n\
    stop after the current chunk, twice to exit immediately.")]
struct Cli {
    /// The directory that all titles will be downloaded to. It must exist.
    #[arg(short = 'o', long = "base-dir", value_name = "BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Overwrite existing files
    #[arg(short = 'f', long)]
    force: bool,

    /// File listing additional title ids, one per line
    #[arg(short = 'i', long = "id-file", value_name = "PATH")]
    id_file: Option<PathBuf>,

    /// Configuration file (default: <config dir>/updatedl/config.ini)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Check SHA-1 digests after download, not just sizes
    #[arg(long)]
    verify_checksum: bool,

    /// Stop the whole batch when a file fails verification
    #[arg(long)]
    abort_on_verify_failure: bool,

    /// Title id prefix whose packages end in a 32-byte signature block
    /// (repeatable, `*` for all titles)
    #[arg(long = "signature-trailer", value_name = "PREFIX")]
    signature_trailer: Vec<String>,

    /// Additional PEM root certificate to trust
    #[arg(long, value_name = "PATH")]
    ca_certificate: Option<PathBuf>,

    /// Skip TLS certificate validation
    #[arg(long)]
    insecure: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Only print warnings, errors and the summary
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,

    /// Title ids to download updates for
    #[arg(value_name = "TITLE_ID")]
    title_ids: Vec<String>,
}

/// Settings resolved from the command line and the configuration file.
#[derive(Debug)]
struct Settings {
    base_dir: PathBuf,
    title_ids: Vec<String>,
    download: DownloadConfig,
    network: NetworkConfig,
}

impl Cli {
    /// Title ids from the positional arguments and the id file, in order.
    ///
    /// Malformed ids are reported and dropped.
    fn collect_title_ids(&self) -> Result<Vec<String>, CliError> {
        let mut ids = Vec::new();
        let mut invalid = Vec::new();

        for raw in &self.title_ids {
            match normalize_title_id(raw) {
                Some(id) => ids.push(id),
                None => invalid.push(raw.clone()),
            }
        }

        if let Some(path) = &self.id_file {
            let (from_file, bad) = read_title_ids(path)?;
            ids.extend(from_file);
            invalid.extend(bad);
        }

        for raw in invalid {
            warn!("Skipping \"{}\": not a valid title ID", raw);
        }

        Ok(ids)
    }

    /// Apply command-line flags on top of the configuration file.
    fn resolve(&self, file: ConfigFile, title_ids: Vec<String>) -> Result<Settings, CliError> {
        let base_dir = self.base_dir.clone().or(file.base_dir).ok_or_else(|| {
            CliError::Config(
                "Must specify -o/--base-dir (or base_dir in the [download] section of config.ini)"
                    .to_string(),
            )
        })?;
        if !base_dir.is_dir() {
            return Err(CliError::Config(format!(
                "Base directory {} does not exist",
                base_dir.display()
            )));
        }

        let mut download = file.download;
        if self.force {
            download = download.with_overwrite(true);
        }
        if self.verify_checksum {
            download = download.with_checksum(ChecksumMode::Strict);
        }
        if self.abort_on_verify_failure {
            download = download.with_verification_policy(VerificationPolicy::AbortBatch);
        }
        for prefix in &self.signature_trailer {
            download.signature_trailer.insert(prefix);
        }

        let mut network = file.network;
        if let Some(path) = &self.ca_certificate {
            network = network.with_ca_certificate(path.clone());
        }
        if self.insecure {
            network = network.with_accept_invalid_certs(true);
        }

        Ok(Settings {
            base_dir,
            title_ids,
            download,
            network,
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let title_ids = cli.collect_title_ids()?;
    if title_ids.is_empty() {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    }

    let file = match &cli.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    let settings = cli.resolve(file, title_ids)?;

    let interrupt = Interrupt::new();
    let handler = interrupt.clone();
    ctrlc::set_handler(move || {
        if escalate_interrupt(&handler) {
            std::process::exit(0);
        }
        eprintln!();
        eprintln!("Stopping after the current chunk (press Ctrl+C again to quit now)...");
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let session = Session::new(&settings.network)?;
    let metadata = UpdateMetadataClient::new(&session, &settings.network);
    let progress = ConsoleProgress::new(cli.quiet);

    info!(
        "Downloading updates for {} title(s) to {}",
        settings.title_ids.len(),
        settings.base_dir.display()
    );

    let orchestrator = BatchOrchestrator::new(&metadata, &session, settings.download)
        .with_progress(&progress)
        .with_interrupt(interrupt);
    let report = orchestrator.run(&settings.title_ids, &settings.base_dir);

    print_summary(&report);

    if report.was_aborted() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Raise the interrupt; returns true when it was already raised and the
/// process should quit without waiting for the current chunk.
///
/// Interrupts are not failures, so both paths end with exit status 0.
fn escalate_interrupt(interrupt: &Interrupt) -> bool {
    if interrupt.is_triggered() {
        return true;
    }
    interrupt.trigger();
    false
}
