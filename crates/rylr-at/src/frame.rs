//! Decoder for the `+RCV=` received-message frame.
//!
//! Frame body grammar (after the `+RCV=` prefix, without the terminator):
//!
//! ```text
//! <address>,<length>,<length raw bytes>,<rssi>,<snr>
//! ```
//!
//! The payload is not escaped and may itself contain commas, so it cannot
//! be found by splitting on delimiters. The decoder splits off `address`
//! and `length` at the first two commas, then takes exactly `length` bytes
//! by position and expects a comma immediately after them. Only the tail
//! is split again, into `rssi` and `snr`.
//!
//! A frame is either decoded completely or rejected; there is no partial
//! result.

use std::str::FromStr;

use rylr_core::types::{ReceivedMessage, MAX_PAYLOAD};

/// Reasons a frame body is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A required comma was not found.
    #[error("missing ',' after {after}")]
    MissingDelimiter {
        /// The field the comma should follow.
        after: &'static str,
    },

    /// A numeric field did not parse or is out of range for its type.
    #[error("invalid {field}: {value:?}")]
    InvalidField {
        /// Field name (`address`, `length`, `rssi`, `snr`).
        field: &'static str,
        /// The offending text (lossy UTF-8).
        value: String,
    },

    /// The declared length exceeds the module's maximum payload.
    #[error("declared length {declared} exceeds maximum of {max}")]
    LengthOutOfRange {
        /// Declared payload length.
        declared: usize,
        /// Largest payload the module supports.
        max: usize,
    },

    /// The declared length runs past the end of the line.
    #[error("declared length {declared} overruns the {available} bytes available")]
    PayloadOverrun {
        /// Declared payload length.
        declared: usize,
        /// Bytes remaining after the length field.
        available: usize,
    },
}

fn find_comma(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b',')
}

fn invalid(field: &'static str, raw: &[u8]) -> FrameError {
    FrameError::InvalidField {
        field,
        value: String::from_utf8_lossy(raw).into_owned(),
    }
}

/// Parse an unsigned decimal field. Signs and whitespace are rejected.
fn parse_unsigned<T: FromStr>(field: &'static str, raw: &[u8]) -> Result<T, FrameError> {
    if raw.is_empty() || !raw.iter().all(u8::is_ascii_digit) {
        return Err(invalid(field, raw));
    }
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid(field, raw))
}

/// Parse a signed decimal field.
fn parse_signed<T: FromStr>(field: &'static str, raw: &[u8]) -> Result<T, FrameError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid(field, raw))
}

/// Decode a frame body (everything after `+RCV=`).
///
/// # Examples
///
/// ```
/// use rylr_at::frame::decode_frame;
///
/// let msg = decode_frame(b"50,5,HELLO,-99,40").unwrap();
/// assert_eq!(msg.address, 50);
/// assert_eq!(msg.payload, b"HELLO");
/// assert_eq!((msg.rssi, msg.snr), (-99, 40));
/// ```
pub fn decode_frame(body: &[u8]) -> Result<ReceivedMessage, FrameError> {
    let addr_end = find_comma(body).ok_or(FrameError::MissingDelimiter { after: "address" })?;
    let address: u16 = parse_unsigned("address", &body[..addr_end])?;

    let len_start = addr_end + 1;
    let len_end = len_start
        + find_comma(&body[len_start..]).ok_or(FrameError::MissingDelimiter { after: "length" })?;
    let declared: u8 = parse_unsigned("length", &body[len_start..len_end])?;
    let declared = usize::from(declared);
    if declared > MAX_PAYLOAD {
        return Err(FrameError::LengthOutOfRange {
            declared,
            max: MAX_PAYLOAD,
        });
    }

    // Payload is read positionally; commas inside it are data.
    let payload_start = len_end + 1;
    let available = body.len() - payload_start;
    if declared > available {
        return Err(FrameError::PayloadOverrun {
            declared,
            available,
        });
    }
    let payload_end = payload_start + declared;

    if body.get(payload_end) != Some(&b',') {
        return Err(FrameError::MissingDelimiter { after: "payload" });
    }

    let tail = &body[payload_end + 1..];
    let rssi_end = find_comma(tail).ok_or(FrameError::MissingDelimiter { after: "rssi" })?;
    let rssi: i8 = parse_signed("rssi", &tail[..rssi_end])?;
    let snr: i8 = parse_signed("snr", &tail[rssi_end + 1..])?;

    Ok(ReceivedMessage {
        address,
        payload: body[payload_start..payload_end].to_vec(),
        rssi,
        snr,
    })
}

/// Encode a message as a frame body, the inverse of [`decode_frame`].
///
/// Used by test harnesses that emulate a module.
pub fn encode_frame(msg: &ReceivedMessage) -> Vec<u8> {
    let mut body = format!("{},{},", msg.address, msg.payload.len()).into_bytes();
    body.extend_from_slice(&msg.payload);
    body.extend_from_slice(format!(",{},{}", msg.rssi, msg.snr).as_bytes());
    body
}
