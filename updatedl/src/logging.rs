//! Diagnostic logging setup.
//!
//! Log lines go to stderr so they never interleave with the summary printed
//! on stdout. `RUST_LOG` overrides the verbosity flags when set.

use tracing_subscriber::EnvFilter;

/// Filter directive used when `RUST_LOG` is not set.
///
/// `verbose` raises this crate's level (`-v` debug, `-vv` trace); `quiet`
/// limits output to warnings and errors.
pub fn default_filter(verbose: u8, quiet: bool) -> String {
    let level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    format!("updatedl={level},updatedl_cli={level},warn")
}

/// Install the global tracing subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose, quiet)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}
