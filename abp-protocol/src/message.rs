//! Protocol messages
//!
//! Data units carry a one-bit sequence number (`m0`/`m1`), acknowledgements
//! echo it back (`a0`/`a1`). Every message is stamped with the vector clock
//! of its sender at the moment it was sent.

use crate::clock::Timestamp;
use std::fmt;

/// Message tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Data unit, sequence bit 0
    M0,
    /// Data unit, sequence bit 1
    M1,
    /// Acknowledgement, sequence bit 0
    A0,
    /// Acknowledgement, sequence bit 1
    A1,
}

impl Tag {
    /// Data tag for a sequence bit
    #[inline]
    pub fn data(bit: u8) -> Tag {
        if bit & 1 == 0 {
            Tag::M0
        } else {
            Tag::M1
        }
    }

    /// Acknowledgement tag for a sequence bit
    #[inline]
    pub fn ack(bit: u8) -> Tag {
        if bit & 1 == 0 {
            Tag::A0
        } else {
            Tag::A1
        }
    }

    /// Sequence bit carried by this tag
    #[inline]
    pub fn bit(self) -> u8 {
        match self {
            Tag::M0 | Tag::A0 => 0,
            Tag::M1 | Tag::A1 => 1,
        }
    }

    /// Check if this is a data tag (sender to receiver)
    #[inline]
    pub fn is_data(self) -> bool {
        matches!(self, Tag::M0 | Tag::M1)
    }

    /// Check if this is an acknowledgement tag (receiver to sender)
    #[inline]
    pub fn is_ack(self) -> bool {
        !self.is_data()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tag::M0 => "m0",
            Tag::M1 => "m1",
            Tag::A0 => "a0",
            Tag::A1 => "a1",
        };
        f.write_str(s)
    }
}

/// A timestamped message in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    /// Clock of the sending process when the message left
    pub timestamp: Timestamp,
    /// Message tag
    pub tag: Tag,
}

impl Message {
    /// Create a new message
    pub fn new(timestamp: Timestamp, tag: Tag) -> Self {
        Message { timestamp, tag }
    }
}
