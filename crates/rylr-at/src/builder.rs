//! RadioBuilder -- fluent builder for constructing [`Radio`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! the serial port, engine timing, queue sizes, and the module settings to
//! apply before the engine starts.
//!
//! # Example
//!
//! ```no_run
//! use rylr_at::{RadioBuilder, RadioConfig};
//! use rylr_core::types::band;
//! use std::time::Duration;
//!
//! # async fn example() -> rylr_core::Result<()> {
//! let radio = RadioBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .baud_rate(115_200)
//!     .command_timeout(Duration::from_secs(5))
//!     .config(RadioConfig::new().address(1).network_id(18).band(band::USA))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tracing::warn;

use rylr_core::error::{Error, Result};
use rylr_core::transport::Transport;
use rylr_core::types::DEFAULT_BAUD_RATE;

use crate::config::RadioConfig;
use crate::io::IoConfig;
use crate::radio::Radio;

/// Default depth of the unsolicited event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 32;

/// Fluent builder for [`Radio`].
///
/// Every option has a default, so the simplest usage is:
///
/// ```ignore
/// let radio = RadioBuilder::new()
///     .serial_port("/dev/ttyUSB0")
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct RadioBuilder {
    serial_port: Option<String>,
    baud_rate: u32,
    io: IoConfig,
    event_capacity: usize,
    config: RadioConfig,
}

impl RadioBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        RadioBuilder {
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            io: IoConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            config: RadioConfig::default(),
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Set the host-side baud rate (default: 115200).
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Set how long a command waits for its reply (default: 10s).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.io.command_timeout = timeout;
        self
    }

    /// Set the pause after each reply (default: 4ms).
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.io.settle_delay = delay;
        self
    }

    /// Set how many commands may wait behind the in-flight one before
    /// submitters block (default: 10).
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.io.queue_capacity = capacity;
        self
    }

    /// Set how many received lines may wait between the line reader and
    /// the engine before the reader stops pulling bytes (default: 10).
    pub fn line_capacity(mut self, capacity: usize) -> Self {
        self.io.line_capacity = capacity;
        self
    }

    /// Set how many unsolicited events a subscriber may fall behind before
    /// losing the oldest (default: 32).
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Settings to apply to the module once the engine is running.
    pub fn config(mut self, config: RadioConfig) -> Self {
        self.config = config;
        self
    }

    /// Build a [`Radio`] with a caller-provided transport.
    ///
    /// This is the entry point for testing (pass a `MockTransport` from
    /// `rylr-test-harness`). If a [`RadioConfig`] was supplied it is applied
    /// before returning; on failure the engine is shut down and the setting
    /// error returned.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<Radio> {
        if self.io.queue_capacity == 0 {
            return Err(Error::InvalidParameter(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.io.line_capacity == 0 {
            return Err(Error::InvalidParameter(
                "line_capacity must be at least 1".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidParameter(
                "event_capacity must be at least 1".into(),
            ));
        }
        if !transport.is_connected() {
            return Err(Error::NotConnected);
        }

        let radio = Radio::new(transport, self.io, self.event_capacity);

        if !self.config.is_empty() {
            if let Err(e) = radio.apply_config(&self.config).await {
                warn!(error = %e, "failed to apply configuration, shutting down");
                let _ = radio.shutdown().await;
                return Err(e);
            }
        }

        Ok(radio)
    }

    /// Build a [`Radio`] on a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<Radio> {
        let port = self
            .serial_port
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;

        let transport = rylr_transport::SerialTransport::open(port, self.baud_rate).await?;
        self.build_with_transport(Box::new(transport)).await
    }
}

impl Default for RadioBuilder {
    fn default() -> Self {
        Self::new()
    }
}
