//! Line framing and response classification for the RYLR AT dialect.
//!
//! Every command, reply, and unsolicited notification is a single line
//! terminated by `\r\n`. Lines are handled as bytes throughout: a `+RCV=`
//! frame carries raw payload bytes that are not guaranteed to be UTF-8.
//!
//! Classification depends on whether a command is in flight. The dialect is
//! strictly half-duplex per command, so while a command is pending the next
//! line is its reply no matter what it looks like ([`classify_reply`]).
//! Otherwise the line is unsolicited ([`classify_unsolicited`]).

use tracing::debug;

use rylr_core::error::{Error, Result};
use rylr_core::events::RadioEvent;
use rylr_core::types::ErrorCode;

use crate::frame;

/// Terminator appended to every outgoing command.
pub const COMMAND_TERMINATOR: &[u8] = b"\r\n";

/// The line-feed byte that ends every incoming line.
pub const LINE_FEED: u8 = b'\n';

/// Prefix of a success reply.
pub const OK_PREFIX: &[u8] = b"+OK";

/// Prefix of an error reply or asynchronous error notification.
pub const ERR_PREFIX: &[u8] = b"+ERR=";

/// Prefix of a received-message frame.
pub const RCV_PREFIX: &[u8] = b"+RCV=";

/// Result of attempting to decode one line from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete line was found.
    Line {
        /// Line content with the trailing `\r\n` (or bare `\n`) removed.
        line: Vec<u8>,
        /// Number of bytes consumed from the input buffer.
        consumed: usize,
    },

    /// The buffer does not yet contain a line feed. More data is needed.
    Incomplete,
}

/// Decode one line-feed-terminated line from a byte buffer.
///
/// Returns the first complete line found, or [`DecodeResult::Incomplete`]
/// if no line feed is present yet.
pub fn decode_line(buf: &[u8]) -> DecodeResult {
    let lf_pos = match buf.iter().position(|&b| b == LINE_FEED) {
        Some(pos) => pos,
        None => return DecodeResult::Incomplete,
    };

    let mut body = &buf[..lf_pos];
    if let Some(stripped) = body.strip_suffix(b"\r") {
        body = stripped;
    }

    DecodeResult::Line {
        line: body.to_vec(),
        consumed: lf_pos + 1,
    }
}

/// Frame a command for the wire by appending `\r\n`.
///
/// # Examples
///
/// ```
/// use rylr_at::protocol::encode_command;
///
/// assert_eq!(encode_command(b"AT+ADDRESS=1"), b"AT+ADDRESS=1\r\n");
/// ```
pub fn encode_command(cmd: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(cmd.len() + COMMAND_TERMINATOR.len());
    framed.extend_from_slice(cmd);
    framed.extend_from_slice(COMMAND_TERMINATOR);
    framed
}

/// Parse `+ERR=<decimal>` into an [`ErrorCode`].
///
/// Returns `None` if the prefix is missing or the remainder is not a
/// decimal integer.
pub fn parse_error_code(line: &[u8]) -> Option<ErrorCode> {
    let digits = line.strip_prefix(ERR_PREFIX)?;
    let code: i64 = std::str::from_utf8(digits).ok()?.parse().ok()?;
    Some(ErrorCode::from_code(code))
}

/// Classify a line received while a command is in flight.
///
/// - `+OK...` resolves to success carrying the raw text.
/// - `+ERR=<n>` resolves to [`Error::Radio`] with that code.
/// - Anything else is a data reply (e.g. `+ADDRESS=1`) and resolves to
///   success carrying the text verbatim.
pub fn classify_reply(line: &[u8]) -> Result<String> {
    if line.starts_with(OK_PREFIX) {
        debug!("parsed as OK reply");
        return Ok(String::from_utf8_lossy(line).into_owned());
    }

    if let Some(code) = parse_error_code(line) {
        debug!(%code, "parsed as error reply");
        return Err(Error::Radio(code));
    }

    let text = String::from_utf8_lossy(line).into_owned();
    debug!(reply = %text, "parsed as data reply");
    Ok(text)
}

/// Classify a line received while no command is in flight.
///
/// - `+RCV=` frames are decoded into [`RadioEvent::MessageReceived`], or
///   [`RadioEvent::MalformedFrame`] if decoding fails.
/// - `+ERR=<n>` becomes [`RadioEvent::RadioError`].
/// - Anything else becomes [`RadioEvent::UnrecognizedLine`].
pub fn classify_unsolicited(line: &[u8]) -> RadioEvent {
    if let Some(body) = line.strip_prefix(RCV_PREFIX) {
        return match frame::decode_frame(body) {
            Ok(message) => RadioEvent::MessageReceived(message),
            Err(e) => RadioEvent::MalformedFrame {
                line: String::from_utf8_lossy(line).into_owned(),
                reason: e.to_string(),
            },
        };
    }

    if let Some(code) = parse_error_code(line) {
        return RadioEvent::RadioError(code);
    }

    RadioEvent::UnrecognizedLine {
        line: String::from_utf8_lossy(line).into_owned(),
    }
}
