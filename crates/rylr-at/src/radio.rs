//! [`Radio`]: the public handle to a running engine.
//!
//! Construct one with [`RadioBuilder`](crate::builder::RadioBuilder). Every
//! method that talks to the module goes through the engine's submission
//! queue, so a `Radio` can be shared (e.g. in an `Arc`) between tasks that
//! issue commands concurrently; they are serviced strictly one at a time in
//! submission order.

use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info};

use rylr_core::error::{Error, Result};
use rylr_core::events::RadioEvent;
use rylr_core::transport::Transport;

use crate::commands;
use crate::config::RadioConfig;
use crate::io::{self, IoConfig, RadioIo};

/// Handle to a module driven by the AT-command engine.
pub struct Radio {
    io: RadioIo,
    event_tx: broadcast::Sender<RadioEvent>,
}

impl Radio {
    /// Spawn the engine on `transport`.
    pub(crate) fn new(transport: Box<dyn Transport>, config: IoConfig, event_capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(event_capacity);
        let io = io::spawn_io_task(transport, config, event_tx.clone());
        Radio { io, event_tx }
    }

    /// Subscribe to unsolicited events (received messages, module errors,
    /// unrecognized lines, and the final transport fault).
    ///
    /// Only events emitted after this call are seen. A subscriber that falls
    /// more than the event capacity behind loses the oldest events and gets
    /// [`RecvError::Lagged`](broadcast::error::RecvError::Lagged).
    pub fn subscribe(&self) -> broadcast::Receiver<RadioEvent> {
        self.event_tx.subscribe()
    }

    /// Send a raw command (without terminator) and await its outcome.
    ///
    /// ```no_run
    /// # async fn example(radio: &rylr_at::Radio) -> rylr_core::Result<()> {
    /// let reply = radio.command("AT+ADDRESS?").await?;
    /// assert!(reply.starts_with("+ADDRESS="));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn command(&self, cmd: impl Into<Vec<u8>>) -> Result<String> {
        self.io.command(cmd.into()).await
    }

    /// Queue a raw command and return the slot its outcome arrives in,
    /// without waiting for the reply.
    pub async fn submit(
        &self,
        cmd: impl Into<Vec<u8>>,
    ) -> Result<oneshot::Receiver<Result<String>>> {
        self.io.submit(cmd.into()).await
    }

    /// Transmit `payload` to the module at `address`.
    ///
    /// Payloads over 240 bytes are rejected with [`Error::PayloadTooLarge`]
    /// before anything is queued.
    pub async fn send_message(&self, address: u16, payload: &[u8]) -> Result<()> {
        let cmd = commands::cmd_send(address, payload)?;
        debug!(address, len = payload.len(), "sending message");
        self.io.command(cmd).await?;
        Ok(())
    }

    /// Apply every set field of `config`, in order, stopping at the first
    /// failure.
    pub async fn apply_config(&self, config: &RadioConfig) -> Result<()> {
        for cmd in config.commands() {
            debug!(setting = cmd.setting, command = %cmd.command, "applying setting");
            self.io
                .command(cmd.command.into_bytes())
                .await
                .map_err(|e| Error::Setting {
                    setting: cmd.setting,
                    source: Box::new(e),
                })?;
        }
        info!("configuration applied");
        Ok(())
    }

    /// Whether the engine still accepts commands. Becomes `false` after a
    /// transport fault.
    pub fn is_running(&self) -> bool {
        self.io.is_running()
    }

    /// Shut down the engine and close the transport.
    ///
    /// Commands already queued are serviced first.
    pub async fn shutdown(self) -> Result<()> {
        self.io.shutdown().await
    }
}
