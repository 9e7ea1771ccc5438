//! Batch trace generation
//!
//! Runs the emulator once per sender timeout and appends the logs of every
//! run to a sender and a receiver trace, separated by [`RUN_SEPARATOR`]
//! lines. Runs that produced an empty log on either side are left out; this
//! happens when the per-run time is shorter than a thread needs to start.
//!
//! [`RUN_SEPARATOR`]: crate::output::RUN_SEPARATOR

use crate::config::{BatchSettings, ConfigError};
use crate::output::{log_format, write_log};
use abp_emulator::{emulate_with, EmulatorConfig, EmulatorError, RunReport};
use abp_protocol::EventLog;
use std::fmt;
use std::io::{self, Write};
use thiserror::Error;

/// Batch errors
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Run with sender timeout {timeout}s failed: {source}")]
    Emulator {
        timeout: f64,
        #[source]
        source: EmulatorError,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// One emulator run of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRun {
    /// Position in the list of timeouts
    pub index: usize,
    /// Sender timeout in seconds
    pub sender_timeout: f64,
    /// Runtime in seconds
    pub runtime: f64,
    /// Entries in the sender's log
    pub sender_entries: usize,
    /// Entries in the receiver's log
    pub receiver_entries: usize,
    /// Whether the run made it into the traces
    pub written: bool,
}

/// Outcome of a whole batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub runs: Vec<BatchRun>,
}

impl BatchSummary {
    /// Runs appended to the traces
    pub fn written(&self) -> usize {
        self.runs.iter().filter(|run| run.written).count()
    }

    /// Runs dropped for an empty log
    pub fn skipped(&self) -> usize {
        self.runs.len() - self.written()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run s-timeout emulator-runtime")?;
        for run in &self.runs {
            write!(f, "{} {} {}", run.index, run.sender_timeout, run.runtime)?;
            if !run.written {
                write!(f, " (skipped)")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Run a batch with the real emulator
pub fn run_batch<S: Write, R: Write>(
    settings: &BatchSettings,
    sender_out: &mut S,
    receiver_out: &mut R,
) -> Result<BatchSummary, BatchError> {
    run_batch_with(settings, sender_out, receiver_out, |config| {
        emulate_with(config).map(RunReport::into_logs)
    })
}

/// Run a batch, producing each run's logs with `run`
pub fn run_batch_with<S, R, F>(
    settings: &BatchSettings,
    sender_out: &mut S,
    receiver_out: &mut R,
    mut run: F,
) -> Result<BatchSummary, BatchError>
where
    S: Write,
    R: Write,
    F: FnMut(&EmulatorConfig) -> Result<(EventLog, EventLog), EmulatorError>,
{
    settings.validate()?;
    let format = log_format(settings.timestamps);
    let runtime = settings.runtime_per_run();
    let mut summary = BatchSummary::default();

    for (index, &timeout) in settings.timeouts.iter().enumerate() {
        let config = settings.run_config(timeout)?;
        tracing::info!(run = index, timeout, runtime, "Starting run");

        let (sender_log, receiver_log) =
            run(&config).map_err(|source| BatchError::Emulator { timeout, source })?;

        let written = !sender_log.is_empty() && !receiver_log.is_empty();
        if written {
            let separator = summary.written() > 0;
            write_log(sender_out, &sender_log, format, separator)?;
            write_log(receiver_out, &receiver_log, format, separator)?;
        } else {
            tracing::warn!(run = index, timeout, "Empty log, skipping run");
        }

        summary.runs.push(BatchRun {
            index,
            sender_timeout: timeout,
            runtime,
            sender_entries: sender_log.len(),
            receiver_entries: receiver_log.len(),
            written,
        });
    }

    sender_out.flush()?;
    receiver_out.flush()?;
    Ok(summary)
}
