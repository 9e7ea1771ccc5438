//! Two-process vector clocks
//!
//! Each endpoint owns a [`VectorClock`] with one slot per process. The
//! owner's slot counts its own logged events; the peer slot is learned from
//! timestamps carried on received messages.
//!
//! Merging is deliberately not the usual componentwise maximum. With exactly
//! two processes and FIFO channels, a message always carries the sender's
//! latest view of its own slot, so the peer slot is adopted as-is. What must
//! hold instead is that the remote never claims more about the local slot
//! than the local side itself has counted; anything else means messages were
//! reordered or clocks were cloned incorrectly, and is reported as a
//! [`CausalityError`]. This shortcut does not generalize past two processes.

use std::fmt;
use thiserror::Error;

/// Number of processes sharing a clock
pub const NUM_PROCESSES: usize = 2;

/// Identity of a protocol endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessId {
    /// Data sender, clock slot 0
    Sender,
    /// Data receiver, clock slot 1
    Receiver,
}

impl ProcessId {
    /// Slot owned by this process
    #[inline]
    pub fn index(self) -> usize {
        match self {
            ProcessId::Sender => 0,
            ProcessId::Receiver => 1,
        }
    }

    /// The other endpoint
    #[inline]
    pub fn peer(self) -> ProcessId {
        match self {
            ProcessId::Sender => ProcessId::Receiver,
            ProcessId::Receiver => ProcessId::Sender,
        }
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Sender => write!(f, "sender"),
            ProcessId::Receiver => write!(f, "receiver"),
        }
    }
}

/// Immutable snapshot of a vector clock
///
/// Rendered as `v0,v1`, the prefix used by timestamped log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Timestamp([u64; NUM_PROCESSES]);

impl Timestamp {
    /// Create a timestamp from raw slot values
    pub const fn new(slots: [u64; NUM_PROCESSES]) -> Self {
        Timestamp(slots)
    }

    /// Value of one process's slot
    #[inline]
    pub fn get(&self, process: ProcessId) -> u64 {
        self.0[process.index()]
    }

    /// Raw slot values
    #[inline]
    pub fn as_array(&self) -> [u64; NUM_PROCESSES] {
        self.0
    }

    /// Check if this timestamp happens-before another
    pub fn happens_before(&self, other: &Timestamp) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a <= b) && self.0 != other.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.0[0], self.0[1])
    }
}

impl From<[u64; NUM_PROCESSES]> for Timestamp {
    fn from(slots: [u64; NUM_PROCESSES]) -> Self {
        Timestamp(slots)
    }
}

/// Causality errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CausalityError {
    #[error("{owner} clock at {local} is behind remote timestamp {remote} in its own slot")]
    RemoteAhead {
        owner: ProcessId,
        local: Timestamp,
        remote: Timestamp,
    },
}

/// Vector clock owned by one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorClock {
    owner: ProcessId,
    slots: [u64; NUM_PROCESSES],
}

impl VectorClock {
    /// Create a zeroed clock for a process
    pub fn new(owner: ProcessId) -> Self {
        VectorClock {
            owner,
            slots: [0; NUM_PROCESSES],
        }
    }

    /// Process owning this clock
    pub fn owner(&self) -> ProcessId {
        self.owner
    }

    /// Value of the owner's own slot
    #[inline]
    pub fn local(&self) -> u64 {
        self.slots[self.owner.index()]
    }

    /// Value of the peer's slot as last learned
    #[inline]
    pub fn remote(&self) -> u64 {
        self.slots[self.owner.peer().index()]
    }

    /// Increment the owner's slot
    #[inline]
    pub fn tick(&mut self) {
        let own = self.owner.index();
        self.slots[own] += 1;
    }

    /// Take a snapshot of the current clock
    #[inline]
    pub fn snapshot(&self) -> Timestamp {
        Timestamp(self.slots)
    }

    /// Merge a timestamp received from the peer
    ///
    /// Fails if the remote claims a larger own-slot value than the owner has
    /// counted. On success the peer slot is copied from the remote as is.
    pub fn merge(&mut self, remote: &Timestamp) -> Result<(), CausalityError> {
        let own = self.owner;
        let peer = own.peer();

        if self.slots[own.index()] < remote.get(own) {
            return Err(CausalityError::RemoteAhead {
                owner: own,
                local: self.snapshot(),
                remote: *remote,
            });
        }

        self.slots[peer.index()] = remote.get(peer);
        Ok(())
    }
}
