//! ABP I/O and Scheduling Abstraction
//!
//! This crate provides the plumbing the protocol halves run on: simulated
//! one-way channels, retransmission timers, and the generic engine loop that
//! drives a state machine on its own thread.

pub mod channel;
pub mod engine;
pub mod time;

pub use channel::{channel, ChannelError, ChannelRx, ChannelTx};
pub use engine::{Engine, EngineConfig, EngineError, EngineHandle, EngineStats, StateMachine};
pub use time::Timer;
