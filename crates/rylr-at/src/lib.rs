//! AT-command engine for REYAX RYLR-series LoRa modules.
//!
//! The module speaks a half-duplex, line-oriented dialect over a UART: the
//! host writes one `AT...` command, the module answers with exactly one line
//! (`+OK`, `+ERR=<n>`, or a data reply), and in between it may push
//! unsolicited lines such as received radio frames (`+RCV=...`). This crate
//! provides:
//!
//! - **Line framing and classification** ([`protocol`]) -- split the byte
//!   stream into lines and decide whether each is a reply or unsolicited
//!   traffic.
//! - **Frame codec** ([`frame`]) -- decode `+RCV=` frames whose payload is
//!   raw bytes that may contain commas.
//! - **Engine** ([`io`]) -- one task owning the transport, one command in
//!   flight, a FIFO submission queue, per-command timeout, and a broadcast
//!   stream of unsolicited events.
//! - **Command builders** ([`commands`]) and **configuration** ([`config`])
//!   -- settings to command text.
//! - **Facade** ([`Radio`]) and **builder** ([`RadioBuilder`]).
//!
//! # Example
//!
//! ```
//! use rylr_at::frame::decode_frame;
//! use rylr_at::protocol::{classify_unsolicited, decode_line, DecodeResult};
//! use rylr_core::RadioEvent;
//!
//! let buf = b"+RCV=50,5,HELLO,-99,40\r\n";
//! if let DecodeResult::Line { line, .. } = decode_line(buf) {
//!     match classify_unsolicited(&line) {
//!         RadioEvent::MessageReceived(msg) => assert_eq!(msg.payload, b"HELLO"),
//!         other => panic!("unexpected {other:?}"),
//!     }
//! }
//! assert!(decode_frame(b"50,10,HELLO,-99,40").is_err());
//! ```

pub mod builder;
pub mod commands;
pub mod config;
pub mod frame;
pub mod io;
pub mod protocol;
pub mod radio;

pub use builder::RadioBuilder;
pub use config::RadioConfig;
pub use frame::FrameError;
pub use io::IoConfig;
pub use radio::Radio;
