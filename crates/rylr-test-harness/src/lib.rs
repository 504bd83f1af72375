//! rylr-test-harness: Test utilities and mock transports for rylr.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the AT-command engine without a module attached: scripted replies,
//! injected unsolicited lines, and fault injection.

pub mod mock_serial;

pub use mock_serial::{MockHandle, MockTransport};
