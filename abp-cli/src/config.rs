//! Configuration file support for ABP CLI tools

use abp_emulator::EmulatorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Single-run emulator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulatorSettings {
    /// Sender timeout waiting for an ack, in seconds
    #[serde(default = "default_sender_timeout")]
    pub sender_timeout: f64,
    /// Total runtime in seconds
    #[serde(default = "default_runtime")]
    pub runtime: f64,
    /// Engine tick in seconds (defaults to a quarter of the sender timeout)
    pub tick: Option<f64>,
    /// Delay before the receiver starts, in seconds
    #[serde(default)]
    pub receiver_delay: f64,
    /// Prefix log lines with vector timestamps
    #[serde(default = "default_timestamps")]
    pub timestamps: bool,
}

fn default_sender_timeout() -> f64 {
    0.5
}

fn default_runtime() -> f64 {
    10.0
}

fn default_timestamps() -> bool {
    true
}

impl Default for EmulatorSettings {
    fn default() -> Self {
        EmulatorSettings {
            sender_timeout: default_sender_timeout(),
            runtime: default_runtime(),
            tick: None,
            receiver_delay: 0.0,
            timestamps: default_timestamps(),
        }
    }
}

impl EmulatorSettings {
    /// Build a validated emulator configuration
    pub fn to_emulator_config(&self) -> Result<EmulatorConfig, ConfigError> {
        build_config(self.sender_timeout, self.runtime, self.tick, self.receiver_delay)
    }
}

/// Batch trace generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Approximate total runtime across all runs, in seconds
    #[serde(default = "default_runtime")]
    pub runtime: f64,
    /// Sender timeouts to explore, one run each
    #[serde(default = "default_timeouts")]
    pub timeouts: Vec<f64>,
    /// Sender trace file
    #[serde(default = "default_sender_log")]
    pub sender_log: PathBuf,
    /// Receiver trace file
    #[serde(default = "default_receiver_log")]
    pub receiver_log: PathBuf,
    /// Engine tick in seconds (defaults to a quarter of each timeout)
    pub tick: Option<f64>,
    /// Prefix log lines with vector timestamps
    #[serde(default = "default_timestamps")]
    pub timestamps: bool,
}

fn default_timeouts() -> Vec<f64> {
    vec![0.01, 0.02, 0.03]
}

fn default_sender_log() -> PathBuf {
    PathBuf::from("trace_s.txt")
}

fn default_receiver_log() -> PathBuf {
    PathBuf::from("trace_r.txt")
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            runtime: default_runtime(),
            timeouts: default_timeouts(),
            sender_log: default_sender_log(),
            receiver_log: default_receiver_log(),
            tick: None,
            timestamps: default_timestamps(),
        }
    }
}

impl BatchSettings {
    /// Runtime given to each individual run
    pub fn runtime_per_run(&self) -> f64 {
        self.runtime / self.timeouts.len().max(1) as f64
    }

    /// Build the emulator configuration for one sender timeout
    pub fn run_config(&self, sender_timeout: f64) -> Result<EmulatorConfig, ConfigError> {
        build_config(sender_timeout, self.runtime_per_run(), self.tick, 0.0)
    }

    /// Check that there is something to run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeouts.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one sender timeout is required".to_string(),
            ));
        }
        for &timeout in &self.timeouts {
            self.run_config(timeout)?;
        }
        Ok(())
    }
}

fn build_config(
    sender_timeout: f64,
    runtime: f64,
    tick: Option<f64>,
    receiver_delay: f64,
) -> Result<EmulatorConfig, ConfigError> {
    let mut config = EmulatorConfig::from_secs(sender_timeout, runtime)?;
    if let Some(tick) = tick {
        config = config.with_tick(abp_emulator::config::secs("tick", tick)?);
    }
    if receiver_delay != 0.0 {
        let delay = abp_emulator::config::secs("receiver delay", receiver_delay)?;
        config = config.with_receiver_start_delay(delay);
    }
    Ok(config)
}

/// Combined configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Single-run settings
    #[serde(default)]
    pub emulator: EmulatorSettings,
    /// Batch settings
    #[serde(default)]
    pub batch: BatchSettings,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Load from an optional path, falling back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Config::default()),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid emulator settings: {0}")]
    Emulator(#[from] abp_emulator::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
