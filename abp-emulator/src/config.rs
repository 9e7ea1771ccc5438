//! Emulator configuration
//!
//! Timeouts and durations arrive from callers as real-valued seconds. They
//! are validated here, before any engine is started.

use abp_io::EngineConfig;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Sender timeout must be a positive number of seconds, got {0}")]
    NonPositiveTimeout(f64),

    #[error("Run duration must be a positive number of seconds, got {0}")]
    NonPositiveDuration(f64),

    #[error("{name} of {value} seconds is out of range")]
    OutOfRange { name: &'static str, value: f64 },
}

/// Emulator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmulatorConfig {
    /// How long the sender waits for an ack before retransmitting
    pub sender_timeout: Duration,
    /// How long both engines run before shutdown starts
    pub run_duration: Duration,
    /// Pause between two engine steps
    pub tick: Duration,
    /// Delay before the receiver takes its first step
    pub receiver_start_delay: Duration,
}

impl EmulatorConfig {
    /// Create a validated configuration
    ///
    /// The tick defaults to a quarter of the timeout, so a missing ack is
    /// polled about four times before the timeout fires.
    pub fn new(sender_timeout: Duration, run_duration: Duration) -> Result<Self, ConfigError> {
        let config = EmulatorConfig {
            sender_timeout,
            run_duration,
            tick: sender_timeout / 4,
            receiver_start_delay: Duration::ZERO,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a validated configuration from seconds
    pub fn from_secs(timeout_secs: f64, duration_secs: f64) -> Result<Self, ConfigError> {
        if !(timeout_secs > 0.0) {
            return Err(ConfigError::NonPositiveTimeout(timeout_secs));
        }
        if !(duration_secs > 0.0) {
            return Err(ConfigError::NonPositiveDuration(duration_secs));
        }
        Self::new(
            secs("sender timeout", timeout_secs)?,
            secs("run duration", duration_secs)?,
        )
    }

    /// Override the engine tick
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Delay the receiver's first step
    pub fn with_receiver_start_delay(mut self, delay: Duration) -> Self {
        self.receiver_start_delay = delay;
        self
    }

    /// Check that timeout and duration are positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sender_timeout.is_zero() {
            return Err(ConfigError::NonPositiveTimeout(0.0));
        }
        if self.run_duration.is_zero() {
            return Err(ConfigError::NonPositiveDuration(0.0));
        }
        Ok(())
    }

    /// Engine settings for the sender
    pub fn sender_engine(&self) -> EngineConfig {
        EngineConfig::with_tick(self.tick)
    }

    /// Engine settings for the receiver
    pub fn receiver_engine(&self) -> EngineConfig {
        EngineConfig {
            tick: self.tick,
            start_delay: self.receiver_start_delay,
        }
    }
}

/// Convert non-negative seconds to a duration
pub fn secs(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::OutOfRange { name, value })
}
