//! ABP - Alternating Bit Protocol emulator
//!
//! High-level Rust API for running the alternating bit protocol between a
//! threaded sender and receiver and collecting their causally timestamped
//! event logs.

pub use abp_emulator as emulator;
pub use abp_io as io;
pub use abp_protocol as protocol;

// Re-export commonly used types
pub use emulator::{emulate, emulate_with, EmulatorConfig, EmulatorError, RunReport};
pub use protocol::{Event, EventLog, LogEntry, LogFormat, Tag, Timestamp};
