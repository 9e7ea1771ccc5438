//! Sending half of the alternating bit protocol
//!
//! | state | action                                   | next            |
//! |-------|------------------------------------------|-----------------|
//! | 0     | take unit from upper layer (`send_m`)    | 1               |
//! | 1     | transmit `m0`, arm timer (`M!m0`)         | 2               |
//! | 2     | wait: `a0` advances, `a1` is stale       | 3, or 2; 1 on timeout |
//! | 3     | take unit from upper layer (`send_m`)    | 4               |
//! | 4     | transmit `m1`, arm timer (`M!m1`)         | 5               |
//! | 5     | wait: `a1` advances, `a0` is stale       | 0, or 5; 4 on timeout |
//!
//! A stale ack belongs to the previous round. It is logged and absorbed as a
//! self-loop, so a late ack never disturbs progress in the current round.

use crate::clock::{ProcessId, Timestamp};
use crate::log::{Event, EventLog};
use crate::message::{Message, Tag};
use crate::process::ProcessCore;
use crate::state::{ProcessState, ProtocolError};
use abp_io::{ChannelRx, ChannelTx, StateMachine, Timer};
use std::time::Duration;

/// States in which the sender may be stopped: right before a new unit is
/// taken from the upper layer, with the previous one fully acknowledged.
pub const SAFE_TERMINAL_STATES: [u8; 2] = [0, 3];

/// Sender statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Units taken from the upper layer
    pub units_generated: u64,
    /// Data transmissions, including retransmissions
    pub transmissions: u64,
    /// Transmissions that repeated a unit after a timeout
    pub retransmissions: u64,
    /// Timeouts fired
    pub timeouts: u64,
    /// Acks that advanced the round
    pub acks_received: u64,
    /// Acks absorbed as stale
    pub stale_acks: u64,
}

/// Alternating bit sender
#[derive(Debug)]
pub struct Sender {
    core: ProcessCore,
    timer: Timer,
    inbox: ChannelRx<Message>,
    outbox: Option<ChannelTx<Message>>,
    retransmit_pending: bool,
    stats: SenderStats,
}

impl Sender {
    /// Create a sender reading acks from `inbox`
    pub fn new(timeout: Duration, inbox: ChannelRx<Message>) -> Self {
        Sender {
            core: ProcessCore::new(ProcessId::Sender),
            timer: Timer::new(timeout),
            inbox,
            outbox: None,
            retransmit_pending: false,
            stats: SenderStats::default(),
        }
    }

    /// Attach the receiver's data channel
    pub fn connect(&mut self, outbox: ChannelTx<Message>) {
        self.outbox = Some(outbox);
    }

    /// Check if a peer channel is attached
    pub fn is_connected(&self) -> bool {
        self.outbox.is_some()
    }

    /// Retransmission timeout
    pub fn timeout(&self) -> Duration {
        self.timer.interval()
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

    /// Consume the sender and return its log
    pub fn into_log(self) -> EventLog {
        self.core.into_log()
    }

    /// Get statistics
    pub fn stats(&self) -> SenderStats {
        self.stats.clone()
    }

    /// Check if acks are waiting to be read
    pub fn has_pending(&self) -> bool {
        !self.inbox.is_empty()
    }

    /// Number of acks waiting to be read
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Execute one protocol step
    pub fn transition(&mut self) -> Result<(), ProtocolError> {
        let state = self.core.state();
        match state.get() {
            0 | 3 => self.generate(state),
            1 | 4 => self.transmit(state),
            2 | 5 => self.await_ack(state),
            other => Err(ProtocolError::IllegalState(other)),
        }
    }

    /// Log every ack still queued, without changing state
    ///
    /// Used after the sender has stopped, so acks for the final round still
    /// show up in the log. Returns the number of acks consumed.
    pub fn consume_acks(&mut self) -> Result<usize, ProtocolError> {
        let mut consumed = 0;
        while let Some(msg) = self.inbox.try_receive() {
            if !msg.tag.is_ack() {
                return Err(self.unexpected(msg.tag));
            }
            self.core
                .record_receive(&msg, Event::AckReceived(msg.tag))?;
            consumed += 1;
        }
        if consumed > 0 {
            tracing::debug!(consumed, "Drained trailing acks");
        }
        Ok(consumed)
    }

    fn generate(&mut self, state: ProcessState) -> Result<(), ProtocolError> {
        self.core.record(Event::SendM);
        self.stats.units_generated += 1;
        self.core.goto(state.get() + 1)
    }

    fn transmit(&mut self, state: ProcessState) -> Result<(), ProtocolError> {
        let outbox = self
            .outbox
            .as_ref()
            .ok_or(ProtocolError::NotConnected(ProcessId::Sender))?;
        let tag = Tag::data(state.round_bit());

        self.timer.arm();
        let timestamp = self.core.record(Event::DataSent(tag));
        outbox.send(Message::new(timestamp, tag))?;

        self.stats.transmissions += 1;
        if self.retransmit_pending {
            self.retransmit_pending = false;
            self.stats.retransmissions += 1;
        }
        self.core.goto(state.get() + 1)
    }

    fn await_ack(&mut self, state: ProcessState) -> Result<(), ProtocolError> {
        let Some(msg) = self.inbox.try_receive() else {
            if self.timer.expired() {
                tracing::debug!(state = state.get(), elapsed = ?self.timer.elapsed(), "Ack timeout");
                self.core.record(Event::Timeout);
                self.stats.timeouts += 1;
                self.retransmit_pending = true;
                return self.core.goto(state.get() - 1);
            }
            return Ok(());
        };

        let next = next_on_ack(state, msg.tag).ok_or_else(|| self.unexpected(msg.tag))?;
        self.core
            .record_receive(&msg, Event::AckReceived(msg.tag))?;

        if next == state.get() {
            tracing::debug!(state = state.get(), tag = %msg.tag, "Stale ack absorbed");
            self.stats.stale_acks += 1;
        } else {
            self.stats.acks_received += 1;
        }
        self.core.goto(next)
    }

    fn unexpected(&self, tag: Tag) -> ProtocolError {
        ProtocolError::UnexpectedTag {
            process: ProcessId::Sender,
            state: self.core.state(),
            tag,
        }
    }
}

/// Ack transition table for the two waiting states
fn next_on_ack(state: ProcessState, tag: Tag) -> Option<u8> {
    match (state.get(), tag) {
        (2, Tag::A0) => Some(3),
        (2, Tag::A1) => Some(2),
        (5, Tag::A1) => Some(0),
        (5, Tag::A0) => Some(5),
        _ => None,
    }
}

impl StateMachine for Sender {
    type Error = ProtocolError;

    fn name(&self) -> &'static str {
        "sender"
    }

    fn transition(&mut self) -> Result<(), ProtocolError> {
        Sender::transition(self)
    }

    fn is_safe_terminal(&self) -> bool {
        self.core.state().is_one_of(&SAFE_TERMINAL_STATES)
    }

    fn state_index(&self) -> u8 {
        self.core.state().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abp_io::channel;
    use std::thread;

    struct Harness {
        sender: Sender,
        to_receiver: ChannelRx<Message>,
        acks: ChannelTx<Message>,
    }

    fn harness(timeout: Duration) -> Harness {
        let (ack_tx, ack_rx) = channel();
        let (data_tx, data_rx) = channel();
        let mut sender = Sender::new(timeout, ack_rx);
        sender.connect(data_tx);
        Harness {
            sender,
            to_receiver: data_rx,
            acks: ack_tx,
        }
    }

    fn step(sender: &mut Sender, n: usize) {
        for _ in 0..n {
            sender.transition().unwrap();
        }
    }

    #[test]
    fn test_first_transmission() {
        let mut h = harness(Duration::from_secs(60));
        step(&mut h.sender, 2);

        assert_eq!(h.sender.log().labels(), ["send_m", "M!m0"]);
        assert_eq!(h.sender.state().get(), 2);

        let msg = h.to_receiver.try_receive().unwrap();
        assert_eq!(msg.tag, Tag::M0);
        assert_eq!(msg.timestamp, Timestamp::new([2, 0]));
        assert_eq!(msg.timestamp, h.sender.log().entries()[1].timestamp);
    }

    #[test]
    fn test_waits_without_ack() {
        let mut h = harness(Duration::from_secs(60));
        step(&mut h.sender, 2);
        step(&mut h.sender, 10);

        assert_eq!(h.sender.state().get(), 2);
        assert_eq!(h.sender.log().len(), 2);
        assert_eq!(h.sender.clock(), Timestamp::new([2, 0]));
    }

    #[test]
    fn test_ack_advances_round() {
        let mut h = harness(Duration::from_secs(60));
        step(&mut h.sender, 2);

        h.acks
            .send(Message::new(Timestamp::new([2, 3]), Tag::A0))
            .unwrap();
        step(&mut h.sender, 1);

        assert_eq!(h.sender.state().get(), 3);
        let last = h.sender.log().last().unwrap();
        assert_eq!(last.label(), "A?a0");
        assert_eq!(last.timestamp, Timestamp::new([3, 3]));
        assert_eq!(h.sender.stats().acks_received, 1);
    }

    #[test]
    fn test_full_cycle_returns_to_initial_state() {
        let mut h = harness(Duration::from_secs(60));
        step(&mut h.sender, 2);
        h.acks
            .send(Message::new(Timestamp::new([2, 3]), Tag::A0))
            .unwrap();
        step(&mut h.sender, 3);
        assert_eq!(h.sender.state().get(), 5);

        h.acks
            .send(Message::new(Timestamp::new([5, 7]), Tag::A1))
            .unwrap();
        step(&mut h.sender, 1);

        assert_eq!(h.sender.state(), ProcessState::INITIAL);
        assert_eq!(
            h.sender.log().labels(),
            ["send_m", "M!m0", "A?a0", "send_m", "M!m1", "A?a1"]
        );
        assert_eq!(h.sender.stats().units_generated, 2);
    }

    #[test]
    fn test_stale_ack_is_self_loop() {
        let mut h = harness(Duration::from_secs(60));
        step(&mut h.sender, 2);

        h.acks
            .send(Message::new(Timestamp::new([0, 3]), Tag::A1))
            .unwrap();
        step(&mut h.sender, 1);

        assert_eq!(h.sender.state().get(), 2);
        assert_eq!(h.sender.log().last().unwrap().label(), "A?a1");
        assert_eq!(h.sender.stats().stale_acks, 1);
    }

    #[test]
    fn test_duplicate_ack_after_advancing() {
        let mut h = harness(Duration::from_secs(60));
        let first_ack = Message::new(Timestamp::new([2, 3]), Tag::A0);

        step(&mut h.sender, 2);
        h.acks.send(first_ack).unwrap();
        step(&mut h.sender, 3);
        assert_eq!(h.sender.state().get(), 5);
        let before = h.sender.clock();

        // Same ack arrives again while waiting for a1
        h.acks.send(first_ack).unwrap();
        step(&mut h.sender, 1);

        let after = h.sender.clock();
        assert_eq!(h.sender.state().get(), 5);
        assert_eq!(h.sender.log().last().unwrap().label(), "A?a0");
        assert_eq!(after.get(ProcessId::Sender), before.get(ProcessId::Sender) + 1);
        assert!(after.get(ProcessId::Receiver) >= before.get(ProcessId::Receiver));
    }

    #[test]
    fn test_timeout_triggers_retransmission() {
        let mut h = harness(Duration::from_millis(1));
        step(&mut h.sender, 2);

        thread::sleep(Duration::from_millis(5));
        step(&mut h.sender, 1);
        assert_eq!(h.sender.state().get(), 1);
        assert_eq!(h.sender.log().last().unwrap().label(), "timeout");

        step(&mut h.sender, 1);
        assert_eq!(h.sender.state().get(), 2);
        assert_eq!(h.sender.log().labels(), ["send_m", "M!m0", "timeout", "M!m0"]);

        let stats = h.sender.stats();
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.transmissions, 2);
        assert_eq!(stats.retransmissions, 1);
        assert_eq!(h.to_receiver.len(), 2);
    }

    #[test]
    fn test_data_tag_on_ack_channel() {
        let mut h = harness(Duration::from_secs(60));
        step(&mut h.sender, 2);
        h.acks
            .send(Message::new(Timestamp::new([2, 0]), Tag::M0))
            .unwrap();

        let err = h.sender.transition().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnexpectedTag {
                process: ProcessId::Sender,
                tag: Tag::M0,
                ..
            }
        ));
        assert_eq!(h.sender.log().len(), 2);
    }

    #[test]
    fn test_causality_violation() {
        let mut h = harness(Duration::from_secs(60));
        step(&mut h.sender, 2);
        h.acks
            .send(Message::new(Timestamp::new([9, 1]), Tag::A0))
            .unwrap();

        let err = h.sender.transition().unwrap_err();
        assert!(matches!(err, ProtocolError::Causality(_)));
    }

    #[test]
    fn test_transmit_requires_peer() {
        let (_ack_tx, ack_rx) = channel();
        let mut sender = Sender::new(Duration::from_secs(1), ack_rx);
        assert!(!sender.is_connected());

        sender.transition().unwrap();
        assert_eq!(
            sender.transition(),
            Err(ProtocolError::NotConnected(ProcessId::Sender))
        );
        assert_eq!(sender.log().labels(), ["send_m"]);
    }

    #[test]
    fn test_consume_acks_keeps_state() {
        let mut h = harness(Duration::from_secs(60));
        step(&mut h.sender, 2);
        h.acks
            .send(Message::new(Timestamp::new([2, 3]), Tag::A0))
            .unwrap();
        step(&mut h.sender, 1);

        h.acks
            .send(Message::new(Timestamp::new([2, 6]), Tag::A0))
            .unwrap();
        assert!(h.sender.has_pending());
        assert_eq!(h.sender.consume_acks().unwrap(), 1);

        assert_eq!(h.sender.state().get(), 3);
        assert_eq!(h.sender.log().labels(), ["send_m", "M!m0", "A?a0", "A?a0"]);
        assert_eq!(h.sender.clock(), Timestamp::new([4, 6]));
        assert_eq!(h.sender.consume_acks().unwrap(), 0);
    }

    #[test]
    fn test_safe_terminal_states() {
        let mut h = harness(Duration::from_secs(60));
        assert!(h.sender.is_safe_terminal());
        step(&mut h.sender, 1);
        assert!(!h.sender.is_safe_terminal());
        step(&mut h.sender, 1);
        assert!(!h.sender.is_safe_terminal());
        assert_eq!(h.sender.state_index(), 2);
        assert_eq!(StateMachine::name(&h.sender), "sender");
    }
}
