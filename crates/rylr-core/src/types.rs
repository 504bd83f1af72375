//! Core types used throughout rylr.
//!
//! Decoded module data ([`ReceivedMessage`], [`ErrorCode`]) plus the named
//! constants of the RYLR AT dialect used when building configuration
//! commands.

use std::fmt;
use std::str::FromStr;

/// Largest payload, in bytes, the module sends or receives in one frame.
pub const MAX_PAYLOAD: usize = 240;

/// Default UART baud rate of the module.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// A message received over the air, decoded from a `+RCV=` frame.
///
/// The payload is raw bytes; its length is the frame's declared length
/// field, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceivedMessage {
    /// Address of the transmitting module.
    pub address: u16,
    /// Raw payload bytes (at most [`MAX_PAYLOAD`]).
    pub payload: Vec<u8>,
    /// Received signal strength indicator in dBm.
    pub rssi: i8,
    /// Signal-to-noise ratio in dB.
    pub snr: i8,
}

impl ReceivedMessage {
    /// Declared payload length.
    pub fn length(&self) -> usize {
        self.payload.len()
    }
}

/// Result code reported by the module as `+ERR=<code>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// 1: the command was not terminated by `\r\n`.
    MissingTerminator,
    /// 2: the command does not start with `AT`.
    MissingAt,
    /// 3: the command is missing `=`.
    MissingEquals,
    /// 4: unknown command.
    UnknownCommand,
    /// 10: transmit over time.
    TxOverTime,
    /// 11: receive over time.
    RxOverTime,
    /// 12: CRC error.
    CrcError,
    /// 13: transmit overrun (more than 240 bytes).
    TxOverrun,
    /// 15: unknown error.
    Unknown,
    /// Any code not documented by the vendor.
    Other(i64),
}

impl ErrorCode {
    /// Map a numeric code to its named variant.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ErrorCode::MissingTerminator,
            2 => ErrorCode::MissingAt,
            3 => ErrorCode::MissingEquals,
            4 => ErrorCode::UnknownCommand,
            10 => ErrorCode::TxOverTime,
            11 => ErrorCode::RxOverTime,
            12 => ErrorCode::CrcError,
            13 => ErrorCode::TxOverrun,
            15 => ErrorCode::Unknown,
            n => ErrorCode::Other(n),
        }
    }

    /// The numeric code as sent by the module.
    pub fn code(&self) -> i64 {
        match self {
            ErrorCode::MissingTerminator => 1,
            ErrorCode::MissingAt => 2,
            ErrorCode::MissingEquals => 3,
            ErrorCode::UnknownCommand => 4,
            ErrorCode::TxOverTime => 10,
            ErrorCode::RxOverTime => 11,
            ErrorCode::CrcError => 12,
            ErrorCode::TxOverrun => 13,
            ErrorCode::Unknown => 15,
            ErrorCode::Other(n) => *n,
        }
    }

    fn description(&self) -> Option<&'static str> {
        match self {
            ErrorCode::MissingTerminator => Some("missing CR/LF terminator"),
            ErrorCode::MissingAt => Some("command does not start with AT"),
            ErrorCode::MissingEquals => Some("missing '=' in command"),
            ErrorCode::UnknownCommand => Some("unknown command"),
            ErrorCode::TxOverTime => Some("transmit over time"),
            ErrorCode::RxOverTime => Some("receive over time"),
            ErrorCode::CrcError => Some("CRC error"),
            ErrorCode::TxOverrun => Some("transmit overrun"),
            ErrorCode::Unknown => Some("unknown error"),
            ErrorCode::Other(_) => None,
        }
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        ErrorCode::from_code(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(desc) => write!(f, "{} ({desc})", self.code()),
            None => write!(f, "{}", self.code()),
        }
    }
}

/// RF bandwidth code used in `AT+PARAMETER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bandwidth {
    /// 7.8 kHz (not recommended by the vendor).
    Khz7_8 = 0,
    /// 10.4 kHz (not recommended by the vendor).
    Khz10_4 = 1,
    Khz15_6 = 2,
    Khz20_8 = 3,
    Khz31_25 = 4,
    Khz41_7 = 5,
    Khz62_5 = 6,
    /// 125 kHz, the module default.
    Khz125 = 7,
    Khz250 = 8,
    Khz500 = 9,
}

impl Bandwidth {
    /// The numeric code sent on the wire.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Error returned when a string cannot be parsed into a [`Bandwidth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBandwidthError(String);

impl fmt::Display for ParseBandwidthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown bandwidth: {}", self.0)
    }
}

impl std::error::Error for ParseBandwidthError {}

impl FromStr for Bandwidth {
    type Err = ParseBandwidthError;

    /// Parses either the wire code (`"7"`) or the kHz figure (`"125"`, `"62.5"`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bw = match s.trim().trim_end_matches("kHz").trim() {
            "0" | "7.8" => Bandwidth::Khz7_8,
            "1" | "10.4" => Bandwidth::Khz10_4,
            "2" | "15.6" => Bandwidth::Khz15_6,
            "3" | "20.8" => Bandwidth::Khz20_8,
            "4" | "31.25" => Bandwidth::Khz31_25,
            "5" | "41.7" => Bandwidth::Khz41_7,
            "6" | "62.5" => Bandwidth::Khz62_5,
            "7" | "125" => Bandwidth::Khz125,
            "8" | "250" => Bandwidth::Khz250,
            "9" | "500" => Bandwidth::Khz500,
            _ => return Err(ParseBandwidthError(s.to_string())),
        };
        Ok(bw)
    }
}

/// Work mode set with `AT+MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WorkMode {
    /// Transmit and receive.
    #[default]
    Transceiver = 0,
    /// Sleep.
    Sleep = 1,
}

impl WorkMode {
    /// The numeric code sent on the wire.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// RF parameters set with `AT+PARAMETER=<sf>,<bw>,<cr>,<pp>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RfParameters {
    /// Spreading factor, 7-12.
    pub spreading_factor: u8,
    /// Channel bandwidth.
    pub bandwidth: Bandwidth,
    /// Coding rate, 1-4.
    pub coding_rate: u8,
    /// Programmed preamble, 4-7.
    pub preamble: u8,
}

impl Default for RfParameters {
    fn default() -> Self {
        Self {
            spreading_factor: 12,
            bandwidth: Bandwidth::Khz125,
            coding_rate: 1,
            preamble: 4,
        }
    }
}

/// Regional center frequencies, in hertz, for `AT+BAND`.
pub mod band {
    pub const USA: u32 = 915_000_000;
    pub const EUROPE_868: u32 = 868_000_000;
    pub const EUROPE_433: u32 = 433_000_000;
    pub const CHINA: u32 = 470_000_000;
    pub const ASIA: u32 = 470_000_000;
    pub const AUSTRALIA: u32 = 923_000_000;
    pub const INDIA: u32 = 865_000_000;
    pub const KOREA: u32 = 920_000_000;
    pub const BRAZIL: u32 = 915_000_000;
    pub const JAPAN: u32 = 920_000_000;
}

/// UART baud rates accepted by `AT+IPR`.
pub const SUPPORTED_BAUD_RATES: &[u32] = &[300, 1200, 4800, 9600, 19_200, 38_400, 57_600, 115_200];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_known_values_round_trip() {
        for code in [1, 2, 3, 4, 10, 11, 12, 13, 15] {
            let ec = ErrorCode::from_code(code);
            assert!(!matches!(ec, ErrorCode::Other(_)), "code {code} should be named");
            assert_eq!(ec.code(), code);
        }
    }

    #[test]
    fn error_code_unknown_value_is_other() {
        assert_eq!(ErrorCode::from(7), ErrorCode::Other(7));
        assert_eq!(ErrorCode::Other(7).code(), 7);
    }

    #[test]
    fn error_code_display() {
        assert_eq!(ErrorCode::CrcError.to_string(), "12 (CRC error)");
        assert_eq!(ErrorCode::Other(99).to_string(), "99");
    }

    #[test]
    fn bandwidth_codes() {
        assert_eq!(Bandwidth::Khz7_8.code(), 0);
        assert_eq!(Bandwidth::Khz125.code(), 7);
        assert_eq!(Bandwidth::Khz500.code(), 9);
    }

    #[test]
    fn bandwidth_from_str() {
        assert_eq!("7".parse::<Bandwidth>().unwrap(), Bandwidth::Khz125);
        assert_eq!("125".parse::<Bandwidth>().unwrap(), Bandwidth::Khz125);
        assert_eq!("62.5kHz".parse::<Bandwidth>().unwrap(), Bandwidth::Khz62_5);
        assert!("126".parse::<Bandwidth>().is_err());
    }

    #[test]
    fn work_mode_codes() {
        assert_eq!(WorkMode::Transceiver.code(), 0);
        assert_eq!(WorkMode::Sleep.code(), 1);
        assert_eq!(WorkMode::default(), WorkMode::Transceiver);
    }

    #[test]
    fn received_message_length_tracks_payload() {
        let msg = ReceivedMessage {
            address: 50,
            payload: b"HELLO".to_vec(),
            rssi: -99,
            snr: 40,
        };
        assert_eq!(msg.length(), 5);
    }
}
