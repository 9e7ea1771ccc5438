//! Simulated one-way channels
//!
//! A channel models an infinitely buffered, lossless link in one direction.
//! Messages are delivered in FIFO order and are never reordered in flight.
//! Each channel has exactly one writer and one reader: neither endpoint is
//! `Clone`, so a second writer or reader cannot be created.

use crossbeam::channel::{self as cb, TryRecvError};
use std::fmt;
use thiserror::Error;

/// Channel errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Channel peer endpoint has been dropped")]
    Disconnected,
}

/// Create a new unbounded one-way channel
pub fn channel<T>() -> (ChannelTx<T>, ChannelRx<T>) {
    let (tx, rx) = cb::unbounded();
    (ChannelTx { inner: tx }, ChannelRx { inner: rx })
}

/// Writing half of a channel
pub struct ChannelTx<T> {
    inner: cb::Sender<T>,
}

impl<T> ChannelTx<T> {
    /// Append a message to the channel
    ///
    /// Never blocks. Fails only if the reading endpoint no longer exists.
    pub fn send(&self, msg: T) -> Result<(), ChannelError> {
        self.inner.send(msg).map_err(|_| ChannelError::Disconnected)
    }

    /// Number of messages queued and not yet read
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if no messages are in flight
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T> fmt::Debug for ChannelTx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelTx").field("queued", &self.len()).finish()
    }
}

/// Reading half of a channel
pub struct ChannelRx<T> {
    inner: cb::Receiver<T>,
}

impl<T> ChannelRx<T> {
    /// Pop the oldest message, or `None` if the channel is empty
    ///
    /// A disconnected writer is not an error here: whatever it sent before
    /// going away is still delivered, after which the channel reads as empty.
    pub fn try_receive(&self) -> Option<T> {
        match self.inner.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Number of messages waiting to be read
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if there is nothing to read
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T> fmt::Debug for ChannelRx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRx").field("queued", &self.len()).finish()
    }
}
