//! ABP Emulator
//!
//! Wires one sender and one receiver into a duplex link, runs both on their
//! own engines for a configured duration, and shuts them down in an order
//! that cannot leave either side waiting forever.

pub mod config;
pub mod orchestrator;

pub use config::{ConfigError, EmulatorConfig};
pub use orchestrator::{emulate, emulate_with, EmulatorError, RunReport};
