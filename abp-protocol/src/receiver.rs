//! Receiving half of the alternating bit protocol
//!
//! | state | action                                         | next   |
//! |-------|------------------------------------------------|--------|
//! | 0     | poll: `m0` is expected, `m1` is a stale copy   | 1 or 5 |
//! | 1     | deliver to upper layer (`recv_m`)              | 2      |
//! | 2     | send `a0` (`A!a0`)                             | 3      |
//! | 3     | poll: `m1` is expected, `m0` is a stale copy   | 4 or 2 |
//! | 4     | deliver to upper layer (`recv_m`)              | 5      |
//! | 5     | send `a1` (`A!a1`)                             | 0      |
//!
//! A stale data unit skips delivery and goes straight to re-sending the
//! previous ack, which makes the sender's retransmissions idempotent here.
//! The receiver never times out; it waits for data passively.

use crate::clock::{ProcessId, Timestamp};
use crate::log::{Event, EventLog};
use crate::message::{Message, Tag};
use crate::process::ProcessCore;
use crate::state::{ProcessState, ProtocolError};
use abp_io::{ChannelRx, ChannelTx, StateMachine};

/// States in which the receiver may be stopped: idle, waiting for data, with
/// the ack for the previous unit already sent.
pub const SAFE_TERMINAL_STATES: [u8; 2] = [0, 3];

/// Receiver statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Units delivered to the upper layer
    pub delivered: u64,
    /// Stale data units re-acknowledged without delivery
    pub duplicates: u64,
    /// Acks sent, including re-sent ones
    pub acks_sent: u64,
}

/// Alternating bit receiver
#[derive(Debug)]
pub struct Receiver {
    core: ProcessCore,
    inbox: ChannelRx<Message>,
    outbox: Option<ChannelTx<Message>>,
    stats: ReceiverStats,
}

impl Receiver {
    /// Create a receiver reading data from `inbox`
    pub fn new(inbox: ChannelRx<Message>) -> Self {
        Receiver {
            core: ProcessCore::new(ProcessId::Receiver),
            inbox,
            outbox: None,
            stats: ReceiverStats::default(),
        }
    }

    /// Attach the sender's ack channel
    pub fn connect(&mut self, outbox: ChannelTx<Message>) {
        self.outbox = Some(outbox);
    }

    /// Check if a peer channel is attached
    pub fn is_connected(&self) -> bool {
        self.outbox.is_some()
    }

    /// Current state
    pub fn state(&self) -> ProcessState {
        self.core.state()
    }

    /// Current clock snapshot
    pub fn clock(&self) -> Timestamp {
        self.core.now()
    }

    /// Log so far
    pub fn log(&self) -> &EventLog {
        self.core.log()
    }

    /// Consume the receiver and return its log
    pub fn into_log(self) -> EventLog {
        self.core.into_log()
    }

    /// Get statistics
    pub fn stats(&self) -> ReceiverStats {
        self.stats.clone()
    }

    /// Check if data units are waiting to be read
    pub fn has_pending(&self) -> bool {
        !self.inbox.is_empty()
    }

    /// Number of data units waiting to be read
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Execute one protocol step
    pub fn transition(&mut self) -> Result<(), ProtocolError> {
        let state = self.core.state();
        match state.get() {
            0 | 3 => self.poll_data(state),
            1 | 4 => self.deliver(state),
            2 | 5 => self.acknowledge(state),
            other => Err(ProtocolError::IllegalState(other)),
        }
    }

    fn poll_data(&mut self, state: ProcessState) -> Result<(), ProtocolError> {
        let Some(msg) = self.inbox.try_receive() else {
            return Ok(());
        };

        let next = next_on_data(state, msg.tag).ok_or(ProtocolError::UnexpectedTag {
            process: ProcessId::Receiver,
            state,
            tag: msg.tag,
        })?;
        self.core
            .record_receive(&msg, Event::DataReceived(msg.tag))?;

        if msg.tag.bit() != state.round_bit() {
            tracing::debug!(state = state.get(), tag = %msg.tag, "Stale data unit, re-acking");
            self.stats.duplicates += 1;
        }
        self.core.goto(next)
    }

    fn deliver(&mut self, state: ProcessState) -> Result<(), ProtocolError> {
        self.core.record(Event::RecvM);
        self.stats.delivered += 1;
        self.core.goto(state.get() + 1)
    }

    fn acknowledge(&mut self, state: ProcessState) -> Result<(), ProtocolError> {
        let outbox = self
            .outbox
            .as_ref()
            .ok_or(ProtocolError::NotConnected(ProcessId::Receiver))?;
        let tag = Tag::ack(state.round_bit());

        let timestamp = self.core.record(Event::AckSent(tag));
        outbox.send(Message::new(timestamp, tag))?;

        self.stats.acks_sent += 1;
        self.core.goto((state.get() + 1) % 6)
    }
}

/// Data transition table for the two polling states
fn next_on_data(state: ProcessState, tag: Tag) -> Option<u8> {
    match (state.get(), tag) {
        (0, Tag::M0) => Some(1),
        (0, Tag::M1) => Some(5),
        (3, Tag::M1) => Some(4),
        (3, Tag::M0) => Some(2),
        _ => None,
    }
}

impl StateMachine for Receiver {
    type Error = ProtocolError;

    fn name(&self) -> &'static str {
        "receiver"
    }

    fn transition(&mut self) -> Result<(), ProtocolError> {
        Receiver::transition(self)
    }

    fn is_safe_terminal(&self) -> bool {
        self.core.state().is_one_of(&SAFE_TERMINAL_STATES)
    }

    fn state_index(&self) -> u8 {
        self.core.state().get()
    }
}
