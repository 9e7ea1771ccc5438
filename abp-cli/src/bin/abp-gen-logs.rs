//! ABP Gen Logs - batch trace generation
//!
//! Runs the emulator once per sender timeout and collects all runs into a
//! sender trace file and a receiver trace file.

use abp_cli::{init_tracing, run_batch, Config};
use anyhow::{bail, Context};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "abp-gen-logs")]
#[command(about = "Run the alternating bit protocol emulator and produce logs", long_about = None)]
struct Args {
    /// Approximate desired total runtime in seconds [default: 10]
    #[arg(short = 't', long)]
    runtime: Option<f64>,

    /// Sender log file [default: trace_s.txt]
    #[arg(short = 's', long)]
    sender_log: Option<PathBuf>,

    /// Receiver log file [default: trace_r.txt]
    #[arg(short = 'r', long)]
    receiver_log: Option<PathBuf>,

    /// Sender timeouts to explore, in seconds
    #[arg(long, value_delimiter = ',')]
    timeouts: Vec<f64>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut settings = Config::load(args.config.as_deref())
        .context("Failed to load configuration")?
        .batch;
    if let Some(runtime) = args.runtime {
        settings.runtime = runtime;
    }
    if let Some(path) = args.sender_log {
        settings.sender_log = path;
    }
    if let Some(path) = args.receiver_log {
        settings.receiver_log = path;
    }
    if !args.timeouts.is_empty() {
        settings.timeouts = args.timeouts;
    }
    if settings.sender_log == settings.receiver_log {
        bail!(
            "Sender and receiver logs must be different files: {}",
            settings.sender_log.display()
        );
    }

    tracing::info!(
        runtime = settings.runtime,
        sender_log = %settings.sender_log.display(),
        receiver_log = %settings.receiver_log.display(),
        "Running with {} timeouts",
        settings.timeouts.len()
    );

    let mut sender_out = BufWriter::new(
        File::create(&settings.sender_log)
            .with_context(|| format!("Failed to create {}", settings.sender_log.display()))?,
    );
    let mut receiver_out = BufWriter::new(
        File::create(&settings.receiver_log)
            .with_context(|| format!("Failed to create {}", settings.receiver_log.display()))?,
    );

    let summary = run_batch(&settings, &mut sender_out, &mut receiver_out)?;
    print!("{}", summary);
    if summary.skipped() > 0 {
        tracing::warn!("{} of {} runs produced no log", summary.skipped(), summary.runs.len());
    }

    Ok(())
}
