//! Transport implementations for rylr.
//!
//! This crate provides the concrete [`Transport`](rylr_core::Transport)
//! used to reach an RYLR module over its UART, usually through a USB serial
//! adapter:
//!
//! - [`SerialTransport`]: USB virtual COM ports and TTL serial connections
//!
//! # Example
//!
//! ```no_run
//! use rylr_transport::SerialTransport;
//! use rylr_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> rylr_core::Result<()> {
//! let transport = SerialTransport::open("/dev/ttyUSB0", 115_200).await?;
//! let (mut reader, mut writer) = Box::new(transport).split();
//!
//! writer.send(b"AT\r\n").await?;
//!
//! let mut buf = [0u8; 256];
//! let n = reader.receive(&mut buf, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
