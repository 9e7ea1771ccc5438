//! ABP CLI Library
//!
//! Shared functionality for the ABP command-line tools.

pub mod batch;
pub mod config;
pub mod output;
pub mod stats;

pub use batch::{run_batch, run_batch_with, BatchError, BatchRun, BatchSummary};
pub use config::{BatchSettings, Config, ConfigError, EmulatorSettings};
pub use output::{log_format, write_log, write_report, RUN_SEPARATOR};
pub use stats::{display_run_stats, format_duration, format_run_summary};

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber on stderr
///
/// `RUST_LOG` wins over the default level when set.
pub fn init_tracing(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
