//! Error types for rylr.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. A submitted command resolves to exactly
//! one of these, so the variants are kept distinguishable: the module said
//! no ([`Error::Radio`]), nobody answered ([`Error::Timeout`]), or the link
//! is dead ([`Error::is_transport_fault`]).

use crate::types::ErrorCode;

/// The error type for all rylr operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port open/read/write failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (unexpected bytes from the module, mock mismatch).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for the reply to a command.
    ///
    /// This typically indicates the module is unpowered, the baud rate is
    /// wrong, or the command was not terminated correctly.
    #[error("timeout waiting for response")]
    Timeout,

    /// The module rejected the command with `+ERR=<code>`.
    #[error("module returned error {0}")]
    Radio(ErrorCode),

    /// An outgoing payload exceeded the module's maximum frame size.
    #[error("payload of {len} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
        /// Largest payload the module accepts.
        max: usize,
    },

    /// An invalid parameter was passed to a builder or command helper.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The engine is not running (never started, shut down, or terminated).
    #[error("not connected")]
    NotConnected,

    /// The connection to the module was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// A configuration command failed while applying settings.
    #[error("failed to set {setting}: {source}")]
    Setting {
        /// Human-readable name of the setting (e.g. `"network ID"`).
        setting: &'static str,
        /// The outcome of the failed command.
        #[source]
        source: Box<Error>,
    },

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this error means the link itself failed, as opposed
    /// to the module refusing a command or not answering in time.
    pub fn is_transport_fault(&self) -> bool {
        match self {
            Error::Transport(_) | Error::ConnectionLost | Error::Io(_) => true,
            Error::Setting { source, .. } => source.is_transport_fault(),
            _ => false,
        }
    }

    /// The module error code carried by this error, if any.
    pub fn radio_code(&self) -> Option<ErrorCode> {
        match self {
            Error::Radio(code) => Some(*code),
            Error::Setting { source, .. } => source.radio_code(),
            _ => None,
        }
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("port busy".into());
        assert_eq!(e.to_string(), "transport error: port busy");
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_display_radio() {
        let e = Error::Radio(ErrorCode::TxOverTime);
        assert_eq!(e.to_string(), "module returned error 10 (transmit over time)");
    }

    #[test]
    fn error_display_payload_too_large() {
        let e = Error::PayloadTooLarge { len: 241, max: 240 };
        assert_eq!(e.to_string(), "payload of 241 bytes exceeds maximum of 240 bytes");
    }

    #[test]
    fn error_display_setting_wraps_source() {
        let e = Error::Setting {
            setting: "band",
            source: Box::new(Error::Radio(ErrorCode::Other(42))),
        };
        assert_eq!(e.to_string(), "failed to set band: module returned error 42");
        assert_eq!(e.radio_code(), Some(ErrorCode::Other(42)));
    }

    #[test]
    fn transport_fault_classification() {
        assert!(Error::ConnectionLost.is_transport_fault());
        assert!(Error::Transport("gone".into()).is_transport_fault());
        assert!(!Error::Timeout.is_transport_fault());
        assert!(!Error::Radio(ErrorCode::UnknownCommand).is_transport_fault());
        assert!(!Error::NotConnected.is_transport_fault());

        let nested = Error::Setting {
            setting: "address",
            source: Box::new(Error::ConnectionLost),
        };
        assert!(nested.is_transport_fault());
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.is_transport_fault());
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
