//! Run orchestration and ordered shutdown
//!
//! Shutdown order matters. The sender only stops in a state where its last
//! unit has been acknowledged, which requires a live receiver. So the sender
//! is stopped and joined first; the receiver, which never blocks outside its
//! safe states, is stopped second. Reversing the order can leave the sender
//! waiting forever for an ack nobody will send.
//!
//! After both engines have stopped, whatever is still in flight is drained:
//! the receiver processes leftover data units (typically retransmissions)
//! and acks them, then the sender logs those trailing acks.

use crate::config::{ConfigError, EmulatorConfig};
use abp_io::{channel, Engine, EngineError, EngineStats, StateMachine};
use abp_protocol::{EventLog, ProtocolError, Receiver, ReceiverStats, Sender, SenderStats};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Steps a receiver needs at most to fully handle one queued data unit
const DRAIN_STEPS_PER_UNIT: usize = 3;

/// How often the supervisor checks on engines during shutdown
const SUPERVISOR_POLL: Duration = Duration::from_millis(1);

/// Emulator errors
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Sender engine failed: {0}")]
    Sender(#[source] EngineError<ProtocolError>),

    #[error("Receiver engine failed: {0}")]
    Receiver(#[source] EngineError<ProtocolError>),

    #[error("Protocol error while draining: {0}")]
    Drain(#[from] ProtocolError),

    #[error("Receiver did not settle after {steps} drain steps")]
    DrainStalled { steps: usize },
}

/// Result of one emulator run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Sender's event log
    pub sender_log: EventLog,
    /// Receiver's event log
    pub receiver_log: EventLog,
    /// Sender protocol counters
    pub sender_stats: SenderStats,
    /// Receiver protocol counters
    pub receiver_stats: ReceiverStats,
    /// Sender engine counters
    pub sender_engine: EngineStats,
    /// Receiver engine counters
    pub receiver_engine: EngineStats,
    /// Acks logged by the sender after it stopped
    pub trailing_acks: usize,
    /// Wall-clock time of the whole run, shutdown included
    pub elapsed: Duration,
}

impl RunReport {
    /// Take the two logs, sender first
    pub fn into_logs(self) -> (EventLog, EventLog) {
        (self.sender_log, self.receiver_log)
    }
}

/// Run the emulator with a sender timeout and a run duration in seconds
///
/// Returns `(sender_log, receiver_log)`.
pub fn emulate(timeout_secs: f64, duration_secs: f64) -> Result<(EventLog, EventLog), EmulatorError> {
    let config = EmulatorConfig::from_secs(timeout_secs, duration_secs)?;
    emulate_with(&config).map(RunReport::into_logs)
}

/// Run the emulator with a full configuration
pub fn emulate_with(config: &EmulatorConfig) -> Result<RunReport, EmulatorError> {
    config.validate()?;
    let started = Instant::now();
    tracing::info!(
        timeout = ?config.sender_timeout,
        duration = ?config.run_duration,
        tick = ?config.tick,
        "Starting emulation"
    );

    let (data_tx, data_rx) = channel();
    let (ack_tx, ack_rx) = channel();
    let mut sender = Sender::new(config.sender_timeout, ack_rx);
    let mut receiver = Receiver::new(data_rx);
    sender.connect(data_tx);
    receiver.connect(ack_tx);

    // The receiver goes first: it is safe to stop in its initial state, so a
    // failure to start the sender can still be cleaned up.
    let receiver_engine = Engine::new(receiver, config.receiver_engine())
        .spawn()
        .map_err(EmulatorError::Receiver)?;
    let sender_engine = match Engine::new(sender, config.sender_engine()).spawn() {
        Ok(handle) => handle,
        Err(e) => {
            receiver_engine.terminate();
            report_receiver_cleanup(receiver_engine.join());
            return Err(EmulatorError::Sender(e));
        }
    };

    thread::sleep(config.run_duration);

    tracing::info!("Stopping sender");
    sender_engine.terminate();
    while !sender_engine.is_finished() {
        // A sender waiting on a dead receiver never reaches a safe state
        if receiver_engine.is_finished() {
            tracing::warn!("Receiver stopped before sender, aborting sender");
            sender_engine.abort();
            break;
        }
        thread::sleep(SUPERVISOR_POLL);
    }
    let (sender_result, sender_engine_stats) = sender_engine.join_with_stats();

    tracing::info!("Stopping receiver");
    receiver_engine.terminate();
    let (receiver_result, receiver_engine_stats) = receiver_engine.join_with_stats();

    // A receiver failure is the root cause whenever both sides failed
    let mut receiver = receiver_result.map_err(EmulatorError::Receiver)?;
    let mut sender = sender_result.map_err(EmulatorError::Sender)?;

    drain_receiver(&mut receiver)?;
    let trailing_acks = sender.consume_acks()?;

    let report = RunReport {
        sender_stats: sender.stats(),
        receiver_stats: receiver.stats(),
        sender_log: sender.into_log(),
        receiver_log: receiver.into_log(),
        sender_engine: sender_engine_stats,
        receiver_engine: receiver_engine_stats,
        trailing_acks,
        elapsed: started.elapsed(),
    };
    tracing::debug!(
        sender_entries = report.sender_log.len(),
        receiver_entries = report.receiver_log.len(),
        retransmissions = report.sender_stats.retransmissions,
        duplicates = report.receiver_stats.duplicates,
        "Emulation finished"
    );
    Ok(report)
}

/// Report the outcome of a receiver stopped because the sender never started
fn report_receiver_cleanup(result: Result<Receiver, EngineError<ProtocolError>>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("Receiver failed while aborting startup: {}", e);
            false
        }
    }
}

/// Step a stopped receiver until its inbox is empty and it is idle again
fn drain_receiver(receiver: &mut Receiver) -> Result<usize, EmulatorError> {
    let limit = DRAIN_STEPS_PER_UNIT * (receiver.pending() + 1);
    let mut steps = 0;

    while receiver.has_pending() || !receiver.is_safe_terminal() {
        if steps >= limit {
            tracing::warn!(steps, pending = receiver.pending(), "Receiver drain stalled");
            return Err(EmulatorError::DrainStalled { steps });
        }
        receiver.transition()?;
        steps += 1;
    }

    if steps > 0 {
        tracing::debug!(steps, "Drained receiver");
    }
    Ok(steps)
}
