//! ABP Protocol Core Implementation
//!
//! This crate implements the two halves of the alternating bit protocol
//! (a stop-and-wait ARQ with a one-bit sequence number): the six-state
//! sender and receiver machines, the two-process vector clock that
//! timestamps their events, and the append-only event logs they produce.

pub mod clock;
pub mod log;
pub mod message;
pub mod process;
pub mod receiver;
pub mod sender;
pub mod state;

pub use clock::{CausalityError, ProcessId, Timestamp, VectorClock};
pub use log::{Event, EventLog, LogEntry, LogFormat, UnknownEvent};
pub use message::{Message, Tag};
pub use receiver::{Receiver, ReceiverStats};
pub use sender::{Sender, SenderStats};
pub use state::{ProcessState, ProtocolError};
