//! The command engine: one task owning the write half and all protocol state.
//!
//! Two tokio tasks run per connection:
//!
//! - the **line reader** owns the transport's read half, reassembles bytes
//!   into lines, and forwards them over a bounded channel. It never looks at
//!   command state, so line arrival is not blocked by dispatch bookkeeping.
//! - the **engine** owns the write half and the single in-flight slot. It
//!   waits on the next of {line, deadline, submitted command} in one
//!   `select!`, so no two replies are ever processed concurrently.
//!
//! Each submitted command carries its own `oneshot` reply slot and receives
//! exactly one outcome. Unsolicited traffic goes to a `broadcast` sink and is
//! best-effort.
//!
//! A transport fault is terminal: the in-flight command (if any) and every
//! queued command fail, a [`RadioEvent::TransportFault`] is published, and
//! the engine exits. There is no reconnect.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use rylr_core::error::{Error, Result};
use rylr_core::events::RadioEvent;
use rylr_core::transport::{Transport, TransportReader, TransportWriter};

use crate::protocol::{self, DecodeResult};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How long a command may wait for its reply once written.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after each reply before the next command is dispatched. The module
/// needs it to settle; the vendor gives no further detail.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(4);

/// Default depth of the submission queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default depth of the reader-to-engine line buffer.
pub const DEFAULT_LINE_CAPACITY: usize = 10;

/// Default slice the line reader waits on the transport before re-checking
/// for cancellation.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum partial-line buffer size. Past it the partial line is dropped
/// along with everything up to its line feed.
/// The longest legitimate line is a `+RCV=` frame of roughly 270 bytes.
const MAX_BUF: usize = 8192;

/// Configuration for the engine and its line reader.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// Time allowed for a reply, starting when the command is written.
    pub command_timeout: Duration,
    /// Pause enforced after each reply before the next dispatch.
    pub settle_delay: Duration,
    /// Submitted commands waiting behind the in-flight one. A full queue
    /// makes submitters wait.
    pub queue_capacity: usize,
    /// Lines buffered between the reader and the engine.
    pub line_capacity: usize,
    /// Receive slice used by the line reader.
    pub poll_interval: Duration,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            line_capacity: DEFAULT_LINE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// A request sent from the [`RadioIo`] handle to the engine task.
pub enum Request {
    /// Write `cmd_bytes` (without terminator) and deliver the outcome.
    Command {
        cmd_bytes: Vec<u8>,
        reply: oneshot::Sender<Result<String>>,
    },
    /// Stop after everything queued ahead of this request has resolved.
    Shutdown { reply: oneshot::Sender<()> },
}

/// What the line reader hands to the engine.
#[derive(Debug)]
enum ReaderEvent {
    Line(Vec<u8>),
    Fault(Error),
}

/// The command currently awaiting its reply.
struct InFlight {
    /// Command text, kept for logging.
    command: String,
    reply: oneshot::Sender<Result<String>>,
    deadline: Instant,
}

/// Handle to the engine task.
pub struct RadioIo {
    /// Submission queue, bounded by [`IoConfig::queue_capacity`].
    pub cmd_tx: mpsc::Sender<Request>,
    /// Join handle for the engine task.
    pub task: JoinHandle<()>,
}

impl RadioIo {
    /// Queue a command and return the slot its outcome will arrive in.
    ///
    /// Waits while the queue is full. Fails with [`Error::NotConnected`] if
    /// the engine has terminated.
    pub async fn submit(&self, cmd: Vec<u8>) -> Result<oneshot::Receiver<Result<String>>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Command {
                cmd_bytes: cmd,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;
        Ok(reply_rx)
    }

    /// Submit a command and await its outcome.
    pub async fn command(&self, cmd: Vec<u8>) -> Result<String> {
        let reply_rx = self.submit(cmd).await?;
        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::NotConnected),
        }
    }

    /// Whether the engine still accepts commands.
    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Shut down the engine.
    ///
    /// Commands queued before this call are still serviced. The writer is
    /// closed before this returns. Shutting down an engine that already
    /// terminated is not an error.
    pub async fn shutdown(self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Request::Shutdown { reply: reply_tx })
            .await
            .is_ok()
        {
            reply_rx.await.map_err(|_| Error::NotConnected)?;
        }
        let _ = self.task.await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Split the transport and spawn the line reader and the engine.
///
/// Unsolicited events are published on `event_tx`. Capacities of zero are
/// clamped to one; [`RadioBuilder`](crate::builder::RadioBuilder) rejects
/// them up front.
pub fn spawn_io_task(
    transport: Box<dyn Transport>,
    config: IoConfig,
    event_tx: broadcast::Sender<RadioEvent>,
) -> RadioIo {
    let (reader, writer) = transport.split();
    let (cmd_tx, cmd_rx) = mpsc::channel::<Request>(config.queue_capacity.max(1));
    let (line_tx, line_rx) = mpsc::channel::<ReaderEvent>(config.line_capacity.max(1));
    let reader_cancel = CancellationToken::new();

    tokio::spawn(read_lines(
        reader,
        line_tx,
        config.poll_interval,
        reader_cancel.clone(),
    ));
    let task = tokio::spawn(io_loop(
        writer,
        config,
        event_tx,
        cmd_rx,
        line_rx,
        reader_cancel,
    ));

    RadioIo { cmd_tx, task }
}

// ---------------------------------------------------------------------------
// Line reader
// ---------------------------------------------------------------------------

/// Pull bytes from the transport and forward complete lines to the engine.
///
/// Ends on cancellation, when the engine goes away, or after forwarding a
/// transport fault.
async fn read_lines(
    mut reader: Box<dyn TransportReader>,
    line_tx: mpsc::Sender<ReaderEvent>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    let mut line_buf = Vec::new();
    let mut chunk = [0u8; 256];
    // Set after an overflow; bytes are dropped until the next line feed.
    let mut discarding = false;

    loop {
        let received = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("line reader cancelled");
                return;
            }

            r = reader.receive(&mut chunk, poll_interval) => r,
        };

        match received {
            Ok(n) => {
                trace!(bytes = n, data = ?&chunk[..n], "RX");
                line_buf.extend_from_slice(&chunk[..n]);

                if discarding {
                    match line_buf.iter().position(|&b| b == protocol::LINE_FEED) {
                        Some(pos) => {
                            line_buf.drain(..=pos);
                            discarding = false;
                        }
                        None => {
                            line_buf.clear();
                            continue;
                        }
                    }
                }

                while let DecodeResult::Line { line, consumed } = protocol::decode_line(&line_buf)
                {
                    line_buf.drain(..consumed);
                    if line_tx.send(ReaderEvent::Line(line)).await.is_err() {
                        debug!("engine gone, line reader exiting");
                        return;
                    }
                }

                if line_buf.len() > MAX_BUF {
                    warn!(
                        len = line_buf.len(),
                        "line buffer overflow, discarding rest of line"
                    );
                    line_buf.clear();
                    discarding = true;
                }
            }
            Err(Error::Timeout) => continue,
            Err(e) => {
                error!(error = %e, "transport read failed");
                let _ = line_tx.send(ReaderEvent::Fault(e)).await;
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Engine loop
// ---------------------------------------------------------------------------

/// Resolve when `deadline` passes, or never if there is none.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// The engine. Runs as a spawned Tokio task.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Incoming lines (so a reply that lands on the deadline still wins)
/// 2. The in-flight deadline
/// 3. New commands, only while idle
///
/// Lines must win over dispatch: a line already read while idle belongs to
/// nobody, and writing a command first would make it look like the reply.
/// A continuous stream of unsolicited lines can therefore hold back a
/// queued command. At UART speeds with a module that is mostly silent
/// between frames the engine sees an empty line channel long before that
/// matters.
async fn io_loop(
    mut writer: Box<dyn TransportWriter>,
    config: IoConfig,
    event_tx: broadcast::Sender<RadioEvent>,
    mut cmd_rx: mpsc::Receiver<Request>,
    mut line_rx: mpsc::Receiver<ReaderEvent>,
    reader_cancel: CancellationToken,
) {
    let mut in_flight: Option<InFlight> = None;
    let mut shutdown_reply: Option<oneshot::Sender<()>> = None;

    loop {
        let deadline = in_flight.as_ref().map(|cmd| cmd.deadline);

        tokio::select! {
            biased;

            event = line_rx.recv() => {
                match event {
                    Some(ReaderEvent::Line(line)) => match in_flight.take() {
                        Some(cmd) => {
                            let outcome = protocol::classify_reply(&line);
                            debug!(
                                command = %cmd.command,
                                ok = outcome.is_ok(),
                                "command resolved"
                            );
                            let _ = cmd.reply.send(outcome);
                            tokio::time::sleep(config.settle_delay).await;
                        }
                        None => publish(&event_tx, protocol::classify_unsolicited(&line)),
                    },
                    Some(ReaderEvent::Fault(e)) => {
                        fail_engine(e, in_flight.take(), &mut cmd_rx, &event_tx);
                        break;
                    }
                    None => {
                        fail_engine(Error::ConnectionLost, in_flight.take(), &mut cmd_rx, &event_tx);
                        break;
                    }
                }
            }

            _ = wait_until(deadline) => {
                if let Some(cmd) = in_flight.take() {
                    warn!(
                        command = %cmd.command,
                        timeout = ?config.command_timeout,
                        "command timed out"
                    );
                    let _ = cmd.reply.send(Err(Error::Timeout));
                }
            }

            req = cmd_rx.recv(), if in_flight.is_none() => {
                match req {
                    Some(Request::Command { cmd_bytes, reply }) => {
                        in_flight = dispatch(writer.as_mut(), cmd_bytes, reply, &config).await;
                    }
                    Some(Request::Shutdown { reply }) => {
                        debug!("engine shutdown requested");
                        cmd_rx.close();
                        reject_queued(&mut cmd_rx, || Error::NotConnected);
                        shutdown_reply = Some(reply);
                        break;
                    }
                    None => {
                        debug!("command channel closed, exiting engine");
                        break;
                    }
                }
            }
        }
    }

    reader_cancel.cancel();
    if let Err(e) = writer.close().await {
        debug!(error = %e, "failed to close transport writer");
    }
    if let Some(reply) = shutdown_reply {
        let _ = reply.send(());
    }
    debug!("engine stopped");
}

/// Write a command and, on success, make it the in-flight command.
///
/// A failed write resolves the command immediately and leaves the engine
/// idle.
async fn dispatch(
    writer: &mut dyn TransportWriter,
    cmd_bytes: Vec<u8>,
    reply: oneshot::Sender<Result<String>>,
    config: &IoConfig,
) -> Option<InFlight> {
    let command = String::from_utf8_lossy(&cmd_bytes).into_owned();
    let framed = protocol::encode_command(&cmd_bytes);
    trace!(data = ?framed, "TX");

    match writer.send(&framed).await {
        Ok(()) => {
            debug!(command = %command, "command written, awaiting reply");
            Some(InFlight {
                command,
                reply,
                deadline: Instant::now() + config.command_timeout,
            })
        }
        Err(e) => {
            warn!(command = %command, error = %e, "failed to write command");
            let _ = reply.send(Err(e));
            None
        }
    }
}

/// Tear down after a transport fault.
///
/// Submission is closed first, so no caller can enqueue behind the fault.
fn fail_engine(
    fault: Error,
    in_flight: Option<InFlight>,
    cmd_rx: &mut mpsc::Receiver<Request>,
    event_tx: &broadcast::Sender<RadioEvent>,
) {
    error!(error = %fault, "transport fault, engine terminating");
    cmd_rx.close();

    let reason = fault.to_string();
    if let Some(cmd) = in_flight {
        let _ = cmd.reply.send(Err(fault));
    }
    publish(event_tx, RadioEvent::TransportFault { reason });
    reject_queued(cmd_rx, || Error::ConnectionLost);
}

/// Fail every request still sitting in a closed queue.
fn reject_queued(cmd_rx: &mut mpsc::Receiver<Request>, error: impl Fn() -> Error) {
    while let Ok(req) = cmd_rx.try_recv() {
        match req {
            Request::Command { cmd_bytes, reply } => {
                debug!(
                    command = %String::from_utf8_lossy(&cmd_bytes),
                    "rejecting queued command"
                );
                let _ = reply.send(Err(error()));
            }
            Request::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }
}

/// Publish an unsolicited event. Nobody listening is not an error.
fn publish(event_tx: &broadcast::Sender<RadioEvent>, event: RadioEvent) {
    match &event {
        RadioEvent::MessageReceived(msg) => debug!(
            address = msg.address,
            len = msg.length(),
            rssi = msg.rssi,
            snr = msg.snr,
            "received message"
        ),
        RadioEvent::MalformedFrame { line, reason } => {
            warn!(line = %line, reason = %reason, "malformed frame")
        }
        other => debug!(event = ?other, "unsolicited event"),
    }

    if event_tx.send(event).is_err() {
        trace!("no event subscribers, event dropped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rylr_core::types::{ErrorCode, ReceivedMessage};
    use rylr_test_harness::{MockHandle, MockTransport};

    fn spawn(mock: MockTransport) -> (RadioIo, broadcast::Receiver<RadioEvent>) {
        spawn_with(mock, IoConfig::default())
    }

    fn spawn_with(
        mock: MockTransport,
        config: IoConfig,
    ) -> (RadioIo, broadcast::Receiver<RadioEvent>) {
        let (event_tx, event_rx) = broadcast::channel(16);
        (spawn_io_task(Box::new(mock), config, event_tx), event_rx)
    }

    async fn wait_for_sends(handle: &MockHandle, count: usize) {
        while handle.sent_data().len() < count {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn io_config_defaults() {
        let config = IoConfig::default();
        assert_eq!(config.command_timeout, Duration::from_secs(10));
        assert_eq!(config.settle_delay, Duration::from_millis(4));
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.line_capacity, 10);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn radio_io_command_not_connected() {
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        drop(cmd_rx);
        let io = RadioIo {
            cmd_tx,
            task: tokio::spawn(async {}),
        };
        assert!(!io.is_running());
        let result = io.command(b"AT".to_vec()).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    // =======================================================================
    // Replies
    // =======================================================================

    #[tokio::test]
    async fn command_ok_reply() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+ADDRESS=1\r\n", b"+OK\r\n");

        let (io, _events) = spawn(mock);
        let reply = io.command(b"AT+ADDRESS=1".to_vec()).await.unwrap();
        assert_eq!(reply, "+OK");

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn command_error_reply() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+BAND=915000000\r\n", b"+ERR=10\r\n");

        let (io, _events) = spawn(mock);
        let err = io
            .command(b"AT+BAND=915000000".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Radio(ErrorCode::TxOverTime)));
        assert_eq!(err.radio_code().map(|c| c.code()), Some(10));

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn command_data_reply() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+NETWORKID?\r\n", b"+NETWORKID=18\r\n");

        let (io, _events) = spawn(mock);
        let reply = io.command(b"AT+NETWORKID?".to_vec()).await.unwrap();
        assert_eq!(reply, "+NETWORKID=18");

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn reply_split_across_reads_is_reassembled() {
        let mut mock = MockTransport::new();
        mock.set_chunk_size(3);
        mock.expect(b"AT+VER?\r\n", b"+VER=RYLR896_v1.2.7\r\n");

        let (io, _events) = spawn(mock);
        let reply = io.command(b"AT+VER?".to_vec()).await.unwrap();
        assert_eq!(reply, "+VER=RYLR896_v1.2.7");

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn in_flight_rcv_line_is_the_reply() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT\r\n", b"+RCV=50,5,HELLO,-99,40\r\n");

        let (io, mut events) = spawn(mock);
        let reply = io.command(b"AT".to_vec()).await.unwrap();
        assert_eq!(reply, "+RCV=50,5,HELLO,-99,40");
        assert!(events.try_recv().is_err());

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn in_flight_err_line_is_the_reply() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+SEND=1,2,hi\r\n", b"+ERR=12\r\n");

        let (io, mut events) = spawn(mock);
        let err = io.command(b"AT+SEND=1,2,hi".to_vec()).await.unwrap_err();
        assert!(matches!(err, Error::Radio(ErrorCode::CrcError)));
        assert!(events.try_recv().is_err());

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn line_after_reply_is_unsolicited() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT\r\n", b"+OK\r\n+ERR=12\r\n");

        let (io, mut events) = spawn(mock);
        assert_eq!(io.command(b"AT".to_vec()).await.unwrap(), "+OK");
        assert_eq!(
            events.recv().await.unwrap(),
            RadioEvent::RadioError(ErrorCode::CrcError)
        );

        io.shutdown().await.unwrap();
    }

    // =======================================================================
    // Timeouts
    // =======================================================================

    #[tokio::test(start_paused = true)]
    async fn command_times_out_then_engine_recovers() {
        let mut mock = MockTransport::new();
        mock.expect_no_reply(b"AT+RESET\r\n");
        mock.expect(b"AT\r\n", b"+OK\r\n");

        let (io, _events) = spawn(mock);
        let started = Instant::now();
        let err = io.command(b"AT+RESET".to_vec()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert!(started.elapsed() >= DEFAULT_COMMAND_TIMEOUT);

        assert_eq!(io.command(b"AT".to_vec()).await.unwrap(), "+OK");

        io.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn late_reply_after_timeout_is_unsolicited() {
        let mut mock = MockTransport::new();
        mock.expect_no_reply(b"AT+RESET\r\n");
        let handle = mock.handle();

        let config = IoConfig {
            command_timeout: Duration::from_millis(200),
            ..IoConfig::default()
        };
        let (io, mut events) = spawn_with(mock, config);
        let err = io.command(b"AT+RESET".to_vec()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));

        handle.inject(b"+READY\r\n");
        assert_eq!(
            events.recv().await.unwrap(),
            RadioEvent::UnrecognizedLine {
                line: "+READY".into()
            }
        );

        io.shutdown().await.unwrap();
    }

    // =======================================================================
    // Queueing
    // =======================================================================

    #[tokio::test]
    async fn queued_commands_resolve_in_fifo_order() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+ADDRESS=7\r\n", b"+OK\r\n");
        mock.expect(b"AT+ADDRESS?\r\n", b"+ADDRESS=7\r\n");
        mock.expect(b"AT+NETWORKID?\r\n", b"+NETWORKID=18\r\n");

        let (io, _events) = spawn(mock);
        let first = io.submit(b"AT+ADDRESS=7".to_vec()).await.unwrap();
        let second = io.submit(b"AT+ADDRESS?".to_vec()).await.unwrap();
        let third = io.submit(b"AT+NETWORKID?".to_vec()).await.unwrap();

        assert_eq!(first.await.unwrap().unwrap(), "+OK");
        assert_eq!(second.await.unwrap().unwrap(), "+ADDRESS=7");
        assert_eq!(third.await.unwrap().unwrap(), "+NETWORKID=18");

        io.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_blocks_submitter() {
        let mut mock = MockTransport::new();
        mock.expect_no_reply(b"AT+MODE=1\r\n");
        mock.expect(b"AT+MODE=0\r\n", b"+OK\r\n");
        let handle = mock.handle();

        let config = IoConfig {
            queue_capacity: 1,
            ..IoConfig::default()
        };
        let (io, _events) = spawn_with(mock, config);

        let first = io.submit(b"AT+MODE=1".to_vec()).await.unwrap();
        wait_for_sends(&handle, 1).await;
        let second = io.submit(b"AT+MODE=0".to_vec()).await.unwrap();

        // One in flight, one queued: a third submission has to wait.
        let third = tokio::time::timeout(Duration::from_millis(50), io.submit(b"AT".to_vec())).await;
        assert!(third.is_err());

        handle.inject(b"+OK\r\n");
        assert_eq!(first.await.unwrap().unwrap(), "+OK");
        assert_eq!(second.await.unwrap().unwrap(), "+OK");

        io.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn next_command_waits_for_settle_delay() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT\r\n", b"+OK\r\n");
        mock.expect(b"AT+MODE?\r\n", b"+MODE=0\r\n");
        let handle = mock.handle();

        let config = IoConfig {
            settle_delay: Duration::from_secs(1),
            ..IoConfig::default()
        };
        let (io, _events) = spawn_with(mock, config);
        let first = io.submit(b"AT".to_vec()).await.unwrap();
        let second = io.submit(b"AT+MODE?".to_vec()).await.unwrap();

        assert_eq!(first.await.unwrap().unwrap(), "+OK");
        let replied = Instant::now();

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(handle.sent_data().len(), 1);

        assert_eq!(second.await.unwrap().unwrap(), "+MODE=0");
        assert!(replied.elapsed() >= Duration::from_secs(1));
        assert_eq!(handle.sent_data().len(), 2);

        io.shutdown().await.unwrap();
    }

    // =======================================================================
    // Transport faults
    // =======================================================================

    #[tokio::test]
    async fn write_failure_resolves_command_and_stays_idle() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT\r\n", b"+OK\r\n");
        mock.fail_next_send();

        let (io, _events) = spawn(mock);
        let err = io.command(b"AT".to_vec()).await.unwrap_err();
        assert!(err.is_transport_fault());
        assert!(io.is_running());

        assert_eq!(io.command(b"AT".to_vec()).await.unwrap(), "+OK");

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn read_fault_with_command_in_flight_is_terminal() {
        let mut mock = MockTransport::new();
        mock.expect_no_reply(b"AT\r\n");
        let handle = mock.handle();

        let (io, mut events) = spawn(mock);
        let pending = io.submit(b"AT".to_vec()).await.unwrap();
        wait_for_sends(&handle, 1).await;

        handle.disconnect();

        let err = pending.await.unwrap().unwrap_err();
        assert!(err.is_transport_fault());
        assert!(matches!(
            events.recv().await.unwrap(),
            RadioEvent::TransportFault { .. }
        ));

        assert!(!io.is_running());
        let result = io.command(b"AT".to_vec()).await;
        assert!(matches!(result, Err(Error::NotConnected)));

        io.shutdown().await.unwrap();
        assert!(handle.writer_closed());
    }

    #[tokio::test]
    async fn read_fault_rejects_queued_commands() {
        let mut mock = MockTransport::new();
        mock.expect_no_reply(b"AT\r\n");
        mock.expect(b"AT+ADDRESS?\r\n", b"+ADDRESS=1\r\n");
        let handle = mock.handle();

        let (io, _events) = spawn(mock);
        let in_flight = io.submit(b"AT".to_vec()).await.unwrap();
        wait_for_sends(&handle, 1).await;
        let queued = io.submit(b"AT+ADDRESS?".to_vec()).await.unwrap();

        handle.disconnect();

        assert!(in_flight.await.unwrap().unwrap_err().is_transport_fault());
        assert!(matches!(
            queued.await.unwrap(),
            Err(Error::ConnectionLost)
        ));
        assert_eq!(handle.sent_data().len(), 1);

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn read_fault_while_idle_publishes_fault() {
        let mock = MockTransport::new();
        let handle = mock.handle();

        let (io, mut events) = spawn(mock);
        handle.disconnect();

        match events.recv().await.unwrap() {
            RadioEvent::TransportFault { reason } => assert_eq!(reason, "connection lost"),
            other => panic!("expected TransportFault, got {other:?}"),
        }
        let _ = io.task.await;
        assert!(handle.writer_closed());
    }

    // =======================================================================
    // Unsolicited traffic
    // =======================================================================

    #[tokio::test]
    async fn idle_rcv_frame_is_published() {
        let mut mock = MockTransport::new();
        mock.inject(b"+RCV=50,5,HELLO,-99,40\r\n");

        let (io, mut events) = spawn(mock);
        assert_eq!(
            events.recv().await.unwrap(),
            RadioEvent::MessageReceived(ReceivedMessage {
                address: 50,
                payload: b"HELLO".to_vec(),
                rssi: -99,
                snr: 40,
            })
        );

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn idle_overrunning_frame_is_malformed() {
        let mut mock = MockTransport::new();
        mock.inject(b"+RCV=50,10,HELLO,-99,40\r\n");

        let (io, mut events) = spawn(mock);
        match events.recv().await.unwrap() {
            RadioEvent::MalformedFrame { line, .. } => assert_eq!(line, "+RCV=50,10,HELLO,-99,40"),
            other => panic!("expected MalformedFrame, got {other:?}"),
        }
        assert!(events.try_recv().is_err());

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn idle_traffic_in_arrival_order() {
        let mut mock = MockTransport::new();
        mock.inject(b"+ERR=11\r\n+READY\r\n+RCV=2,3,a,b,-40,7\r\n");

        let (io, mut events) = spawn(mock);
        assert_eq!(
            events.recv().await.unwrap(),
            RadioEvent::RadioError(ErrorCode::RxOverTime)
        );
        assert_eq!(
            events.recv().await.unwrap(),
            RadioEvent::UnrecognizedLine {
                line: "+READY".into()
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            RadioEvent::MessageReceived(ReceivedMessage {
                address: 2,
                payload: b"a,b".to_vec(),
                rssi: -40,
                snr: 7,
            })
        );

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn events_without_subscribers_do_not_stall_commands() {
        let mut mock = MockTransport::new();
        mock.inject(b"+RCV=50,5,HELLO,-99,40\r\n+ERR=12\r\n");
        let handle = mock.handle();

        let (event_tx, event_rx) = broadcast::channel(1);
        drop(event_rx);
        let io = spawn_io_task(Box::new(mock), IoConfig::default(), event_tx);

        // Give the reader time to drain the injected lines while idle.
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.expect(b"AT\r\n", b"+OK\r\n");
        assert_eq!(io.command(b"AT".to_vec()).await.unwrap(), "+OK");

        io.shutdown().await.unwrap();
    }

    // =======================================================================
    // Shutdown
    // =======================================================================

    #[tokio::test]
    async fn shutdown_closes_writer() {
        let mock = MockTransport::new();
        let handle = mock.handle();

        let (io, _events) = spawn(mock);
        assert!(io.is_running());
        io.shutdown().await.unwrap();
        assert!(handle.writer_closed());
    }

    #[tokio::test]
    async fn shutdown_services_commands_queued_before_it() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+MODE=0\r\n", b"+OK\r\n");
        mock.expect(b"AT+CRFOP=15\r\n", b"+OK\r\n");

        let (io, _events) = spawn(mock);
        let first = io.submit(b"AT+MODE=0".to_vec()).await.unwrap();
        let second = io.submit(b"AT+CRFOP=15".to_vec()).await.unwrap();
        io.shutdown().await.unwrap();

        assert_eq!(first.await.unwrap().unwrap(), "+OK");
        assert_eq!(second.await.unwrap().unwrap(), "+OK");
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_reply() {
        let mut mock = MockTransport::new();
        mock.expect_no_reply(b"AT+SEND=1,1,x\r\n");
        let handle = mock.handle();

        let (io, _events) = spawn(mock);
        let pending = io.submit(b"AT+SEND=1,1,x".to_vec()).await.unwrap();
        wait_for_sends(&handle, 1).await;

        let shutdown = tokio::spawn(io.shutdown());
        tokio::task::yield_now().await;
        assert!(!handle.writer_closed());

        handle.inject(b"+OK\r\n");
        assert_eq!(pending.await.unwrap().unwrap(), "+OK");
        shutdown.await.unwrap().unwrap();
        assert!(handle.writer_closed());
    }

    #[tokio::test]
    async fn shutdown_after_fault_is_ok() {
        let mock = MockTransport::new();
        let handle = mock.handle();

        let (io, mut events) = spawn(mock);
        handle.disconnect();
        assert!(matches!(
            events.recv().await.unwrap(),
            RadioEvent::TransportFault { .. }
        ));
        io.shutdown().await.unwrap();
    }

    // =======================================================================
    // Line reader
    // =======================================================================

    #[tokio::test]
    async fn line_reader_forwards_lines_and_fault() {
        let mut mock = MockTransport::new();
        mock.set_chunk_size(4);
        mock.inject(b"+OK\r\n+ERR=4\r\n");
        let handle = mock.handle();
        let (reader, _writer) = Box::new(mock).split();

        let (line_tx, mut line_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(read_lines(
            reader,
            line_tx,
            Duration::from_millis(10),
            cancel,
        ));

        assert!(matches!(line_rx.recv().await, Some(ReaderEvent::Line(l)) if l == b"+OK"));
        assert!(matches!(line_rx.recv().await, Some(ReaderEvent::Line(l)) if l == b"+ERR=4"));

        handle.disconnect();
        assert!(matches!(
            line_rx.recv().await,
            Some(ReaderEvent::Fault(Error::ConnectionLost))
        ));
        task.await.unwrap();
        assert!(line_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn line_reader_drops_rest_of_overlong_line() {
        let mut mock = MockTransport::new();
        mock.inject(&vec![b'x'; MAX_BUF * 2]);
        mock.inject(b"tail\r\n+OK\r\n");
        let (reader, _writer) = Box::new(mock).split();

        let (line_tx, mut line_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(read_lines(
            reader,
            line_tx,
            Duration::from_millis(10),
            cancel.clone(),
        ));

        assert!(matches!(line_rx.recv().await, Some(ReaderEvent::Line(l)) if l == b"+OK"));

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn line_reader_stops_on_cancel() {
        let (reader, _writer) = Box::new(MockTransport::new()).split();
        let (line_tx, _line_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(read_lines(
            reader,
            line_tx,
            Duration::from_millis(10),
            cancel.clone(),
        ));

        cancel.cancel();
        task.await.unwrap();
    }
}
