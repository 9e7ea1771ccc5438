//! ABP Emulate - single emulator run
//!
//! Runs one sender and one receiver for a while and prints both event logs
//! on stdout.

use abp::emulate_with;
use abp_cli::{display_run_stats, init_tracing, log_format, write_report, Config};
use anyhow::Context;
use clap::Parser;
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "abp-emulate")]
#[command(about = "Alternating bit protocol emulator", long_about = None)]
struct Args {
    /// Sender timeout waiting for an ack, in seconds [default: 0.5]
    #[arg(short = 's', long)]
    sender_timeout: Option<f64>,

    /// Emulator runtime in seconds [default: 10]
    #[arg(short = 't', long)]
    runtime: Option<f64>,

    /// Delay before the receiver starts, in seconds
    #[arg(long)]
    receiver_delay: Option<f64>,

    /// Pause between engine steps in seconds [default: sender timeout / 4]
    #[arg(long)]
    tick: Option<f64>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print event labels without timestamps
    #[arg(long)]
    plain: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut settings = Config::load(args.config.as_deref())
        .context("Failed to load configuration")?
        .emulator;
    if let Some(timeout) = args.sender_timeout {
        settings.sender_timeout = timeout;
    }
    if let Some(runtime) = args.runtime {
        settings.runtime = runtime;
    }
    if let Some(delay) = args.receiver_delay {
        settings.receiver_delay = delay;
    }
    if args.tick.is_some() {
        settings.tick = args.tick;
    }
    if args.plain {
        settings.timestamps = false;
    }

    let config = settings.to_emulator_config()?;
    tracing::info!(
        "Running with sender timeout {}s for {}s",
        settings.sender_timeout,
        settings.runtime
    );

    let report = emulate_with(&config).context("Emulation failed")?;
    display_run_stats(&report);

    let stdout = io::stdout();
    write_report(
        &mut stdout.lock(),
        &report.sender_log,
        &report.receiver_log,
        log_format(settings.timestamps),
    )?;

    Ok(())
}
