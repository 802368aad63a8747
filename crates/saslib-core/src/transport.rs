//! Transport trait for SAS communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a gaming
//! machine. The production implementation is the serial port in
//! `saslib-transport`; `saslib-test-harness` provides a scripted mock.
//!
//! Unlike a plain byte pipe, a SAS line is reconfigured between phases of
//! a single exchange (MARK parity for the wake-up byte, SPACE for the data
//! phase, NONE with two stop bits for general polls), so line control is
//! part of the trait.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::types::{LineSettings, Parity, StopBits};

/// Asynchronous half-duplex byte transport to a gaming machine.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the underlying channel.
    ///
    /// Opening an already open transport is a no-op. Returns
    /// [`Error::Open`](crate::error::Error::Open) if the channel cannot be
    /// opened.
    async fn open(&mut self) -> Result<()>;

    /// Send raw bytes, returning once they have been handed to the line.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes into the provided buffer.
    ///
    /// Returns the number of bytes read. Waits up to `timeout` for data to
    /// arrive; returns [`Error::Timeout`](crate::error::Error::Timeout) if
    /// nothing is received within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Drain pending output to the line.
    async fn flush(&mut self) -> Result<()>;

    /// Discard everything in both the input and output buffers.
    async fn clear_buffers(&mut self) -> Result<()>;

    /// Change the parity mode. Takes effect for the next byte sent.
    fn set_parity(&mut self, parity: Parity) -> Result<()>;

    /// Change the number of stop bits.
    fn set_stop_bits(&mut self, stop_bits: StopBits) -> Result<()>;

    /// Close the channel. Closing a closed transport is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// Drop the channel at once, without draining pending output.
    ///
    /// For places that cannot await [`close`](Transport::close), such as a
    /// `Drop` impl.
    fn release(&mut self);

    /// Check whether the channel is currently open.
    fn is_connected(&self) -> bool;

    /// Apply the parity and stop bits of a line profile.
    ///
    /// The profile's timeout is carried by the caller and passed to each
    /// [`receive`](Transport::receive).
    fn apply(&mut self, settings: &LineSettings) -> Result<()> {
        self.set_parity(settings.parity)?;
        self.set_stop_bits(settings.stop_bits)
    }
}
