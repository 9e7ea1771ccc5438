//! Event logs
//!
//! Every process keeps an append-only log of the protocol events it
//! performed. A log line is either the bare event label or, when causal
//! timestamps are requested, `v0,v1 label`:
//!
//! ```text
//! 1,0 send_m
//! 2,0 M!m0
//! 3,3 A?a0
//! ```
//!
//! Entries are only ever appended by the owning process, with a strictly
//! increasing own clock slot. Once a process stops, its log is handed over
//! and read but never modified.

use crate::clock::{ProcessId, Timestamp};
use crate::message::Tag;
use std::fmt;
use std::str::FromStr;

/// A logged protocol event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Sender pulled a new unit from the upper layer (`send_m`)
    SendM,
    /// Sender transmitted a data unit (`M!m0`, `M!m1`)
    DataSent(Tag),
    /// Sender gave up waiting for an ack (`timeout`)
    Timeout,
    /// Sender received an ack (`A?a0`, `A?a1`)
    AckReceived(Tag),
    /// Receiver received a data unit (`M?m0`, `M?m1`)
    DataReceived(Tag),
    /// Receiver delivered a unit to the upper layer (`recv_m`)
    RecvM,
    /// Receiver sent an ack (`A!a0`, `A!a1`)
    AckSent(Tag),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::SendM => f.write_str("send_m"),
            Event::DataSent(tag) => write!(f, "M!{}", tag),
            Event::Timeout => f.write_str("timeout"),
            Event::AckReceived(tag) => write!(f, "A?{}", tag),
            Event::DataReceived(tag) => write!(f, "M?{}", tag),
            Event::RecvM => f.write_str("recv_m"),
            Event::AckSent(tag) => write!(f, "A!{}", tag),
        }
    }
}

/// Error returned when a label is not a known event
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown event label: {0:?}")]
pub struct UnknownEvent(pub String);

impl FromStr for Event {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let event = match s {
            "send_m" => Event::SendM,
            "timeout" => Event::Timeout,
            "recv_m" => Event::RecvM,
            "M!m0" => Event::DataSent(Tag::M0),
            "M!m1" => Event::DataSent(Tag::M1),
            "A?a0" => Event::AckReceived(Tag::A0),
            "A?a1" => Event::AckReceived(Tag::A1),
            "M?m0" => Event::DataReceived(Tag::M0),
            "M?m1" => Event::DataReceived(Tag::M1),
            "A!a0" => Event::AckSent(Tag::A0),
            "A!a1" => Event::AckSent(Tag::A1),
            other => return Err(UnknownEvent(other.to_string())),
        };
        Ok(event)
    }
}

/// One log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    /// Owner's clock right after the event was counted
    pub timestamp: Timestamp,
    /// What happened
    pub event: Event,
}

impl LogEntry {
    /// Event label without the timestamp
    pub fn label(&self) -> String {
        self.event.to_string()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.timestamp, self.event)
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Event label only
    Plain,
    /// `v0,v1 label`
    #[default]
    Timestamped,
}

/// Append-only event log of one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    owner: ProcessId,
    entries: Vec<LogEntry>,
}

impl EventLog {
    /// Create an empty log
    pub fn new(owner: ProcessId) -> Self {
        EventLog {
            owner,
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, entry: LogEntry) {
        debug_assert!(
            self.entries
                .last()
                .map_or(true, |last| last.timestamp.get(self.owner)
                    < entry.timestamp.get(self.owner)),
            "log entries must have strictly increasing local timestamps"
        );
        self.entries.push(entry);
    }

    /// Process that wrote this log
    pub fn owner(&self) -> ProcessId {
        self.owner
    }

    /// All entries, oldest first
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Iterate over entries
    pub fn iter(&self) -> std::slice::Iter<'_, LogEntry> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was logged
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// Labels of all entries, oldest first
    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(LogEntry::label).collect()
    }

    /// Number of occurrences of an event
    pub fn count(&self, event: Event) -> usize {
        self.entries.iter().filter(|e| e.event == event).count()
    }

    /// Render the log, one line per entry
    pub fn render(&self, format: LogFormat) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match format {
                LogFormat::Plain => out.push_str(&entry.label()),
                LogFormat::Timestamped => out.push_str(&entry.to_string()),
            }
            out.push('\n');
        }
        out
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a LogEntry;
    type IntoIter = std::slice::Iter<'a, LogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
