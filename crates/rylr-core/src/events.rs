//! Unsolicited event types.
//!
//! Any line the module emits while no command is in flight is classified
//! into a [`RadioEvent`] and published through a [`tokio::sync::broadcast`]
//! channel. Delivery is best-effort: a slow subscriber lags and loses the
//! oldest events, and events emitted while nobody is subscribed are dropped.
//! Command outcomes never travel this way.

use crate::types::{ErrorCode, ReceivedMessage};

/// An unsolicited event pushed by the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// A `+RCV=` frame was decoded.
    MessageReceived(ReceivedMessage),

    /// The module reported `+ERR=<code>` outside of any command exchange.
    RadioError(ErrorCode),

    /// A `+RCV=` line could not be decoded. No message was produced.
    MalformedFrame {
        /// The offending line (lossy UTF-8).
        line: String,
        /// Why the decoder rejected it.
        reason: String,
    },

    /// A line that is neither a received frame nor an error code.
    UnrecognizedLine {
        /// The raw line (lossy UTF-8).
        line: String,
    },

    /// The transport failed. This is always the last event the engine emits.
    TransportFault {
        /// Description of the underlying failure.
        reason: String,
    },
}

impl RadioEvent {
    /// Returns `true` for the fault variants (everything except a received message).
    pub fn is_fault(&self) -> bool {
        !matches!(self, RadioEvent::MessageReceived(_))
    }
}
