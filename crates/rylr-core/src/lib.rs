//! rylr-core: Core traits, types, and error definitions for rylr.
//!
//! This crate defines the abstractions shared by the AT-command engine, the
//! transports it runs over, and the test harness. Applications that only
//! consume decoded radio traffic can depend on these types without pulling
//! in the engine or a serial stack.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level link, split into reader and writer halves
//! - [`RadioEvent`] -- unsolicited traffic pushed by the module
//! - [`ReceivedMessage`] / [`ErrorCode`] -- decoded module data
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use rylr_core::*`.
pub use error::{Error, Result};
pub use events::RadioEvent;
pub use transport::{Transport, TransportReader, TransportWriter};
pub use types::*;
