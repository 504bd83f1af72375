//! Serial port transport for module communication.
//!
//! This module provides [`SerialTransport`], which implements the [`Transport`]
//! trait for the module's UART, typically reached through a USB-to-TTL
//! adapter. RYLR modules ship at 115200 baud, 8 data bits, no parity, one
//! stop bit, no flow control; `AT+IPR` can change the rate.
//!
//! # Example
//!
//! ```no_run
//! use rylr_transport::SerialTransport;
//!
//! # async fn example() -> rylr_core::Result<()> {
//! let transport = SerialTransport::open("/dev/ttyUSB0", 115_200).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use rylr_core::error::{Error, Result};
use rylr_core::transport::{Transport, TransportReader, TransportWriter};
use rylr_core::types::DEFAULT_BAUD_RATE;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Serial port configuration.
///
/// Defaults match the module's factory settings:
/// - 115200 baud
/// - 8 data bits
/// - 1 stop bit
/// - No parity
/// - No flow control
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate (e.g., 9600, 57600, 115200)
    pub baud_rate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Number of stop bits (typically 1)
    pub stop_bits: StopBits,
    /// Parity checking (typically None)
    pub parity: Parity,
    /// Flow control (the module has no RTS/CTS lines)
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
        }
    }
}

/// Serial port transport for module communication.
pub struct SerialTransport {
    port: SerialStream,
    port_name: String,
}

impl SerialTransport {
    /// Open a serial port with the given baud rate and default 8N1 settings.
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
    /// * `baud_rate` - Baud rate (the module defaults to 115200)
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(port, config).await
    }

    /// Open a serial port with full configuration control.
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        tracing::debug!(
            port = %port,
            baud_rate = config.baud_rate,
            data_bits = ?config.data_bits,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            flow_control = ?config.flow_control,
            "Opening serial port"
        );

        let serial_stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(config.flow_control.into())
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %port, error = %e, "Failed to open serial port");
                Error::Transport(format!("Failed to open serial port {}: {}", port, e))
            })?;

        tracing::info!(port = %port, baud_rate = config.baud_rate, "Serial port opened successfully");

        Ok(Self {
            port: serial_stream,
            port_name: port.to_string(),
        })
    }

    /// Get the name of the serial port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl Transport for SerialTransport {
    fn split(self: Box<Self>) -> (Box<dyn TransportReader>, Box<dyn TransportWriter>) {
        let SerialTransport { port, port_name } = *self;
        let (read_half, write_half) = tokio::io::split(port);
        let reader = SerialReader {
            half: read_half,
            port_name: port_name.clone(),
        };
        let writer = SerialWriter {
            half: Some(write_half),
            port_name,
        };
        (Box::new(reader), Box::new(writer))
    }

    /// Always `true`: [`open`](Self::open) fails rather than returning an
    /// unopened port, and `split` consumes the transport. A serial line has
    /// no link state to query, so a lost device shows up as a read or write
    /// error on the halves.
    fn is_connected(&self) -> bool {
        true
    }
}

/// Map an I/O error to the library error, singling out lost links.
fn map_io_error(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::BrokenPipe
        || e.kind() == std::io::ErrorKind::NotConnected
        || e.kind() == std::io::ErrorKind::UnexpectedEof
    {
        Error::ConnectionLost
    } else {
        Error::Io(e)
    }
}

/// Read half of a [`SerialTransport`].
pub struct SerialReader {
    half: ReadHalf<SerialStream>,
    port_name: String,
}

#[async_trait]
impl TransportReader for SerialReader {
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        match tokio::time::timeout(timeout, self.half.read(buf)).await {
            Ok(Ok(0)) => {
                tracing::error!(port = %self.port_name, "Serial port reached end of stream");
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(
                    port = %self.port_name,
                    bytes = n,
                    data = ?&buf[..n],
                    "Received data"
                );
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to receive data"
                );
                Err(map_io_error(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }
}

/// Write half of a [`SerialTransport`].
pub struct SerialWriter {
    half: Option<WriteHalf<SerialStream>>,
    port_name: String,
}

#[async_trait]
impl TransportWriter for SerialWriter {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let half = self.half.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(
            port = %self.port_name,
            bytes = data.len(),
            data = ?data,
            "Sending data"
        );

        half.write_all(data).await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to send data");
            map_io_error(e)
        })?;

        // Flush so the module sees the terminator immediately.
        half.flush().await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to flush serial port");
            map_io_error(e)
        })?;

        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut half) = self.half.take() {
            tracing::debug!(port = %self.port_name, "Closing serial port writer");
            if let Err(e) = half.shutdown().await {
                tracing::warn!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to flush before closing (continuing anyway)"
                );
            }
            tracing::info!(port = %self.port_name, "Serial port closed");
        }
        Ok(())
    }
}
