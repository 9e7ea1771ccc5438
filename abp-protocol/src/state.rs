//! Process state and protocol errors
//!
//! Both endpoints cycle through six states, three per round. States 0..=2
//! handle sequence bit 0, states 3..=5 mirror them for bit 1.

use crate::clock::{CausalityError, ProcessId};
use crate::message::Tag;
use abp_io::ChannelError;
use std::fmt;
use thiserror::Error;

/// Number of states in each endpoint's machine
pub const NUM_STATES: u8 = 6;

/// Protocol errors
///
/// All of these are fatal to a run. Timeouts are not errors; they are the
/// protocol's own recovery path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Causality violation: {0}")]
    Causality(#[from] CausalityError),

    #[error("Illegal process state {0}")]
    IllegalState(u8),

    #[error("Unexpected message {tag} for {process} in state {state}")]
    UnexpectedTag {
        process: ProcessId,
        state: ProcessState,
        tag: Tag,
    },

    #[error("{0} has no peer endpoint connected")]
    NotConnected(ProcessId),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Protocol phase of one endpoint, always in `0..6`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProcessState(u8);

impl ProcessState {
    /// Initial state of both endpoints
    pub const INITIAL: ProcessState = ProcessState(0);

    /// Create a state, rejecting values outside `0..6`
    pub fn new(value: u8) -> Result<Self, ProtocolError> {
        if value < NUM_STATES {
            Ok(ProcessState(value))
        } else {
            Err(ProtocolError::IllegalState(value))
        }
    }

    /// Raw state index
    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Sequence bit of the round this state belongs to
    #[inline]
    pub fn round_bit(self) -> u8 {
        self.0 / 3
    }

    /// Check membership in a set of state indices
    #[inline]
    pub fn is_one_of(self, states: &[u8]) -> bool {
        states.contains(&self.0)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for ProcessState {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ProcessState::new(value)
    }
}
