//! Transport traits for module communication.
//!
//! The [`Transport`] trait abstracts over the physical link to the module.
//! The engine reads and writes concurrently (a dedicated line-reader task
//! pulls bytes while the command loop writes), so a transport is consumed
//! by [`Transport::split`] into an independent [`TransportReader`] and
//! [`TransportWriter`].
//!
//! Opening and configuring the link (baud rate, parity, port naming) is the
//! implementation's business; `rylr-transport` provides a serial port and
//! `rylr-test-harness` a scripted mock.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Read half of a transport.
#[async_trait]
pub trait TransportReader: Send {
    /// Receive bytes from the module into the provided buffer.
    ///
    /// Returns the number of bytes read (never zero). Waits up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing arrived. End of stream is reported as
    /// [`Error::ConnectionLost`](crate::error::Error::ConnectionLost).
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;
}

/// Write half of a transport.
#[async_trait]
pub trait TransportWriter: Send {
    /// Send raw bytes to the module, returning once all bytes are written.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Flush and close the write side.
    ///
    /// After calling `close()`, subsequent `send()` calls should return
    /// [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;
}

/// A duplex byte-level link to the module.
pub trait Transport: Send {
    /// Consume the transport and return its independent read and write halves.
    fn split(self: Box<Self>) -> (Box<dyn TransportReader>, Box<dyn TransportWriter>);

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
