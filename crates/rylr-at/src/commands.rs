//! AT command text builders for the RYLR dialect.
//!
//! All functions are pure: they produce command text without the `\r\n`
//! terminator (the engine appends it) and perform no I/O. Arguments are not
//! range-checked against the module's limits; the module answers an
//! out-of-range value with `+ERR=`.
//!
//! Query commands end in `?` and are answered with a data line such as
//! `+ADDRESS=120`. Set commands are answered with `+OK`.

use rylr_core::error::{Error, Result};
use rylr_core::types::{Bandwidth, RfParameters, WorkMode, MAX_PAYLOAD};

// ---------------------------------------------------------------
// Basic
// ---------------------------------------------------------------

/// Test the link (`AT`).
pub fn cmd_test() -> String {
    "AT".to_string()
}

/// Software reset (`AT+RESET`). The module answers `+RESET` then `+READY`.
pub fn cmd_reset() -> String {
    "AT+RESET".to_string()
}

/// Read the firmware version (`AT+VER?`).
pub fn cmd_read_version() -> String {
    "AT+VER?".to_string()
}

/// Restore factory settings (`AT+FACTORY`).
pub fn cmd_factory_reset() -> String {
    "AT+FACTORY".to_string()
}

// ---------------------------------------------------------------
// Identity
// ---------------------------------------------------------------

/// Set the module address (`AT+ADDRESS=<0-65535>`).
pub fn cmd_set_address(address: u16) -> String {
    format!("AT+ADDRESS={address}")
}

/// Read the module address (`AT+ADDRESS?`).
pub fn cmd_read_address() -> String {
    "AT+ADDRESS?".to_string()
}

/// Set the network ID (`AT+NETWORKID=<0-16>`).
pub fn cmd_set_network_id(network_id: u8) -> String {
    format!("AT+NETWORKID={network_id}")
}

/// Read the network ID (`AT+NETWORKID?`).
pub fn cmd_read_network_id() -> String {
    "AT+NETWORKID?".to_string()
}

// ---------------------------------------------------------------
// RF
// ---------------------------------------------------------------

/// Set the center frequency in hertz (`AT+BAND=<hz>`).
///
/// See [`rylr_core::types::band`] for regional values.
pub fn cmd_set_band(freq_hz: u32) -> String {
    format!("AT+BAND={freq_hz}")
}

/// Read the center frequency (`AT+BAND?`).
pub fn cmd_read_band() -> String {
    "AT+BAND?".to_string()
}

/// Set the RF parameters (`AT+PARAMETER=<sf>,<bw>,<cr>,<preamble>`).
///
/// The bandwidth is sent as its wire code, not in kHz.
pub fn cmd_set_parameters(params: &RfParameters) -> String {
    format!(
        "AT+PARAMETER={},{},{},{}",
        params.spreading_factor,
        params.bandwidth.code(),
        params.coding_rate,
        params.preamble
    )
}

/// Read the RF parameters (`AT+PARAMETER?`).
pub fn cmd_read_parameters() -> String {
    "AT+PARAMETER?".to_string()
}

/// Set the RF output power in dBm (`AT+CRFOP=<0-15>`).
pub fn cmd_set_rf_power(dbm: u8) -> String {
    format!("AT+CRFOP={dbm}")
}

/// Read the RF output power (`AT+CRFOP?`).
pub fn cmd_read_rf_power() -> String {
    "AT+CRFOP?".to_string()
}

// ---------------------------------------------------------------
// Mode, UART, security
// ---------------------------------------------------------------

/// Set the work mode (`AT+MODE=<0|1>`).
pub fn cmd_set_mode(mode: WorkMode) -> String {
    format!("AT+MODE={}", mode.code())
}

/// Read the work mode (`AT+MODE?`).
pub fn cmd_read_mode() -> String {
    "AT+MODE?".to_string()
}

/// Set the UART baud rate (`AT+IPR=<rate>`).
///
/// Takes effect immediately; the serial port must be reopened at the new
/// rate to keep talking to the module.
pub fn cmd_set_baud_rate(baud: u32) -> String {
    format!("AT+IPR={baud}")
}

/// Read the UART baud rate (`AT+IPR?`).
pub fn cmd_read_baud_rate() -> String {
    "AT+IPR?".to_string()
}

/// Set the 128-bit network password (`AT+CPIN=<32 hex digits>`).
pub fn cmd_set_password(key: &[u8; 16]) -> String {
    format!("AT+CPIN={}", hex::encode(key))
}

/// Read the network password (`AT+CPIN?`).
pub fn cmd_read_password() -> String {
    "AT+CPIN?".to_string()
}

// ---------------------------------------------------------------
// Data
// ---------------------------------------------------------------

/// Build a transmit command (`AT+SEND=<address>,<length>,<payload>`).
///
/// The payload is copied in raw. Returns bytes because the payload need not
/// be UTF-8.
///
/// # Errors
///
/// [`Error::PayloadTooLarge`] if `payload` exceeds [`MAX_PAYLOAD`] bytes.
pub fn cmd_send(address: u16, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD {
        return Err(Error::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    let mut cmd = format!("AT+SEND={address},{},", payload.len()).into_bytes();
    cmd.extend_from_slice(payload);
    Ok(cmd)
}

// ---------------------------------------------------------------
// Response parsers
// ---------------------------------------------------------------

/// Extract the value of a `+<NAME>=<value>` data reply.
///
/// Returns `None` if the reply does not carry the expected name.
///
/// ```
/// use rylr_at::commands::parse_query_value;
///
/// assert_eq!(parse_query_value("+ADDRESS=120", "ADDRESS"), Some("120"));
/// assert_eq!(parse_query_value("+OK", "ADDRESS"), None);
/// ```
pub fn parse_query_value<'a>(reply: &'a str, name: &str) -> Option<&'a str> {
    reply
        .strip_prefix('+')?
        .strip_prefix(name)?
        .strip_prefix('=')
}

/// Parse a `+PARAMETER=<sf>,<bw>,<cr>,<preamble>` reply.
pub fn parse_parameters(reply: &str) -> Result<RfParameters> {
    let value = parse_query_value(reply, "PARAMETER")
        .ok_or_else(|| Error::Protocol(format!("unexpected PARAMETER reply: {reply:?}")))?;

    let fields: Vec<&str> = value.split(',').collect();
    if fields.len() != 4 {
        return Err(Error::Protocol(format!(
            "expected 4 PARAMETER fields, got {}: {reply:?}",
            fields.len()
        )));
    }

    let number = |s: &str| -> Result<u8> {
        s.trim()
            .parse()
            .map_err(|_| Error::Protocol(format!("invalid PARAMETER field {s:?}")))
    };
    let bandwidth: Bandwidth = fields[1]
        .parse()
        .map_err(|e| Error::Protocol(format!("{e}")))?;

    Ok(RfParameters {
        spreading_factor: number(fields[0])?,
        bandwidth,
        coding_rate: number(fields[2])?,
        preamble: number(fields[3])?,
    })
}
