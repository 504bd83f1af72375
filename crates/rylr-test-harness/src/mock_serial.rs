//! Mock transport for deterministic testing of the AT-command engine.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs, like a module that answers exactly what the test
//! scripted. Unsolicited lines can be injected at any time, and faults can
//! be triggered on either half of the link.
//!
//! The reader and writer halves share state, so bytes queued by a matched
//! `send()` become readable on the reader half. A [`MockHandle`] keeps
//! access to that state after the transport has been handed to the engine.
//!
//! # Example
//!
//! ```
//! use rylr_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the engine sends this command, the module replies "+OK".
//! mock.expect(b"AT+ADDRESS=1\r\n", b"+OK\r\n");
//! // An incoming radio frame, readable before any command is sent.
//! mock.inject(b"+RCV=50,5,HELLO,-99,40\r\n");
//! let handle = mock.handle();
//! assert_eq!(handle.remaining_expectations(), 1);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

use rylr_core::error::{Error, Result};
use rylr_core::transport::{Transport, TransportReader, TransportWriter};

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes that become readable once the request is matched.
    response: Vec<u8>,
}

#[derive(Debug)]
struct MockState {
    /// Ordered queue of expected request/response pairs.
    expectations: VecDeque<Expectation>,
    /// Bytes waiting to be read.
    inbound: VecDeque<u8>,
    /// Largest number of bytes handed out by one `receive()` call.
    chunk_size: usize,
    /// Whether the link is up. When `false`, both halves fail.
    connected: bool,
    /// Set once the writer half has been closed.
    writer_closed: bool,
    /// Fail the next `send()` with a transport error.
    fail_next_send: bool,
    /// Log of all bytes sent through this transport.
    sent_log: Vec<Vec<u8>>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<MockState>,
    readable: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push_inbound(&self, data: &[u8]) {
        self.lock().inbound.extend(data.iter().copied());
        self.readable.notify_one();
    }
}

/// A mock [`Transport`] for testing the engine without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation; its response
/// bytes are then queued for the reader half.
///
/// If the data does not match or the queue is exhausted, `send()` returns
/// [`Error::Protocol`].
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

/// A cloneable handle onto a [`MockTransport`]'s state.
///
/// Obtain one with [`MockTransport::handle`] before handing the transport to
/// the engine, then use it to inject traffic or faults mid-test.
#[derive(Debug, Clone)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            shared: Arc::new(Shared {
                state: Mutex::new(MockState {
                    expectations: VecDeque::new(),
                    inbound: VecDeque::new(),
                    chunk_size: usize::MAX,
                    connected: true,
                    writer_closed: false,
                    fail_next_send: false,
                    sent_log: Vec::new(),
                }),
                readable: Notify::new(),
            }),
        }
    }

    /// Add an expected request/response pair.
    ///
    /// When `send()` is called with data matching `request`, `response`
    /// becomes readable on the reader half.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.handle().expect(request, response);
    }

    /// Expect `request` but never answer it.
    pub fn expect_no_reply(&mut self, request: &[u8]) {
        self.handle().expect(request, b"");
    }

    /// Queue bytes for the reader half without any preceding send.
    pub fn inject(&mut self, data: &[u8]) {
        self.handle().inject(data);
    }

    /// Make the next `send()` fail with a transport error.
    pub fn fail_next_send(&mut self) {
        self.handle().fail_next_send();
    }

    /// Limit how many bytes one `receive()` call returns, to exercise
    /// reassembly of lines split across reads.
    pub fn set_chunk_size(&mut self, size: usize) {
        self.shared.lock().chunk_size = size.max(1);
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::ConnectionLost`].
    pub fn set_connected(&mut self, connected: bool) {
        self.shared.lock().connected = connected;
    }

    /// Return a handle that stays usable after the transport is moved.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Return all data that has been sent through this transport.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.handle().sent_data()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.handle().remaining_expectations()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHandle {
    /// Add an expected request/response pair. See [`MockTransport::expect`].
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.shared.lock().expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Queue unsolicited bytes for the reader half.
    pub fn inject(&self, data: &[u8]) {
        self.shared.push_inbound(data);
    }

    /// Make the next `send()` fail with a transport error.
    pub fn fail_next_send(&self) {
        self.shared.lock().fail_next_send = true;
    }

    /// Drop the link: both halves fail from now on.
    pub fn disconnect(&self) {
        self.shared.lock().connected = false;
        self.shared.readable.notify_one();
    }

    /// Return all data that has been sent, one element per `send()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.shared.lock().sent_log.clone()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.shared.lock().expectations.len()
    }

    /// Whether the writer half has been closed.
    pub fn writer_closed(&self) -> bool {
        self.shared.lock().writer_closed
    }
}

impl Transport for MockTransport {
    fn split(self: Box<Self>) -> (Box<dyn TransportReader>, Box<dyn TransportWriter>) {
        let reader = MockReader {
            shared: Arc::clone(&self.shared),
        };
        let writer = MockWriter {
            shared: self.shared,
        };
        (Box::new(reader), Box::new(writer))
    }

    fn is_connected(&self) -> bool {
        self.shared.lock().connected
    }
}

struct MockReader {
    shared: Arc<Shared>,
}

#[async_trait]
impl TransportReader for MockReader {
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut state = self.shared.lock();
                if !state.connected {
                    return Err(Error::ConnectionLost);
                }
                if !state.inbound.is_empty() {
                    let n = state.inbound.len().min(buf.len()).min(state.chunk_size);
                    for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
                        *slot = byte;
                    }
                    return Ok(n);
                }
            }
            // A notification sent between the check above and this wait is
            // stored as a permit, so no wakeup is lost.
            if tokio::time::timeout_at(deadline, self.shared.readable.notified())
                .await
                .is_err()
            {
                return Err(Error::Timeout);
            }
        }
    }
}

struct MockWriter {
    shared: Arc<Shared>,
}

#[async_trait]
impl TransportWriter for MockWriter {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let response = {
            let mut state = self.shared.lock();
            if !state.connected {
                return Err(Error::ConnectionLost);
            }
            if state.writer_closed {
                return Err(Error::NotConnected);
            }
            if state.fail_next_send {
                state.fail_next_send = false;
                return Err(Error::Transport("injected write failure".into()));
            }

            state.sent_log.push(data.to_vec());

            match state.expectations.pop_front() {
                Some(expectation) if data == expectation.request.as_slice() => expectation.response,
                Some(expectation) => {
                    return Err(Error::Protocol(format!(
                        "unexpected send data: expected {:?}, got {:?}",
                        String::from_utf8_lossy(&expectation.request),
                        String::from_utf8_lossy(data)
                    )));
                }
                None => {
                    return Err(Error::Protocol(
                        "no more expectations in mock transport".into(),
                    ));
                }
            }
        };

        if !response.is_empty() {
            self.shared.push_inbound(&response);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.shared.lock().writer_closed = true;
        Ok(())
    }
}
