//! Per-process bookkeeping shared by both endpoints
//!
//! A [`ProcessCore`] bundles what every endpoint owns privately: its state,
//! its vector clock and its event log. Recording an event always ticks the
//! clock first, so the local slot strictly increases from one log entry to
//! the next.

use crate::clock::{ProcessId, Timestamp, VectorClock};
use crate::log::{Event, EventLog, LogEntry};
use crate::message::Message;
use crate::state::{ProcessState, ProtocolError};

/// Clock, state and log of one process
#[derive(Debug, Clone)]
pub struct ProcessCore {
    id: ProcessId,
    state: ProcessState,
    clock: VectorClock,
    log: EventLog,
}

impl ProcessCore {
    /// Create a core in the initial state with a zeroed clock
    pub fn new(id: ProcessId) -> Self {
        ProcessCore {
            id,
            state: ProcessState::INITIAL,
            clock: VectorClock::new(id),
            log: EventLog::new(id),
        }
    }

    /// Current state
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Move to a new state given as a raw index
    pub fn goto(&mut self, state: u8) -> Result<(), ProtocolError> {
        self.state = ProcessState::new(state)?;
        Ok(())
    }

    /// Current clock snapshot
    pub fn now(&self) -> Timestamp {
        self.clock.snapshot()
    }

    /// Log so far
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Consume the core and return its log
    pub fn into_log(self) -> EventLog {
        self.log
    }

    /// Count a local event and log it
    ///
    /// Returns the timestamp the event was logged with.
    pub fn record(&mut self, event: Event) -> Timestamp {
        self.clock.tick();
        let timestamp = self.clock.snapshot();
        tracing::trace!(process = %self.id, %timestamp, %event, "Event");
        self.log.push(LogEntry { timestamp, event });
        timestamp
    }

    /// Merge the timestamp of a received message, then log the receipt
    pub fn record_receive(
        &mut self,
        msg: &Message,
        event: Event,
    ) -> Result<Timestamp, ProtocolError> {
        self.clock.merge(&msg.timestamp)?;
        Ok(self.record(event))
    }
}
