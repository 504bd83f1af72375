// rylr test application -- CLI tool for exercising RYLR LoRa modules
// through the AT-command engine, against real hardware or a scripted mock.
//
// Usage:
//   rylr-test-app --port /dev/ttyUSB0 info
//   rylr-test-app --port /dev/ttyUSB0 at "AT+VER?"
//   rylr-test-app --port /dev/ttyUSB0 send 2 "hello"
//   rylr-test-app --port /dev/ttyUSB0 listen --duration 60
//   rylr-test-app --port /dev/ttyUSB0 config --address 1 --network-id 18 --band 915000000
//   rylr-test-app --mock -v listen --duration 1

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use rylr_at::commands;
use rylr_at::frame::encode_frame;
use rylr_at::{Radio, RadioBuilder, RadioConfig};
use rylr_core::types::{Bandwidth, ReceivedMessage, RfParameters, WorkMode, DEFAULT_BAUD_RATE};
use rylr_core::RadioEvent;
use rylr_test_harness::{MockHandle, MockTransport};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// rylr test application -- drives a RYLR module from the command line.
#[derive(Parser)]
#[command(name = "rylr-test-app", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3). Required unless --mock.
    #[arg(long)]
    port: Option<String>,

    /// Host-side baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Seconds to wait for each reply.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Use a scripted mock module instead of a serial port.
    #[arg(long)]
    mock: bool,

    /// Log engine activity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read version, address, network ID, band, RF parameters, and power.
    Info,

    /// Send a raw AT command (without terminator) and print the reply.
    At {
        /// Command text, e.g. "AT+ADDRESS?".
        command: String,
    },

    /// Transmit a message to another module.
    Send {
        /// Destination address (0 broadcasts).
        address: u16,
        /// Message text, at most 240 bytes.
        message: String,
    },

    /// Print received messages and module errors.
    Listen {
        /// Seconds to listen.
        #[arg(long, default_value_t = 30)]
        duration: u64,
    },

    /// Apply settings. Only the given options are changed.
    Config(ConfigArgs),
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// Module address (0-65535).
    #[arg(long)]
    address: Option<u16>,

    /// Network ID (0-16).
    #[arg(long)]
    network_id: Option<u8>,

    /// Center frequency in Hz (e.g. 915000000).
    #[arg(long)]
    band: Option<u32>,

    /// Spreading factor (7-12). Setting any RF parameter sends all four.
    #[arg(long)]
    sf: Option<u8>,

    /// Bandwidth, as a code (0-9) or in kHz (e.g. 125).
    #[arg(long)]
    bw: Option<Bandwidth>,

    /// Coding rate (1-4).
    #[arg(long)]
    cr: Option<u8>,

    /// Programmed preamble (4-7).
    #[arg(long)]
    preamble: Option<u8>,

    /// Work mode.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Network password, 32 hex digits.
    #[arg(long, value_parser = parse_password)]
    password: Option<[u8; 16]>,

    /// RF output power in dBm (0-15).
    #[arg(long)]
    power: Option<u8>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Transceiver,
    Sleep,
}

impl From<ModeArg> for WorkMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Transceiver => WorkMode::Transceiver,
            ModeArg::Sleep => WorkMode::Sleep,
        }
    }
}

/// Parse a 128-bit password given as 32 hex digits.
fn parse_password(s: &str) -> std::result::Result<[u8; 16], String> {
    let mut key = [0u8; 16];
    hex::decode_to_slice(s, &mut key).map_err(|e| format!("expected 32 hex digits: {e}"))?;
    Ok(key)
}

impl ConfigArgs {
    fn to_config(&self) -> RadioConfig {
        let mut config = RadioConfig {
            address: self.address,
            network_id: self.network_id,
            band: self.band,
            mode: self.mode.map(WorkMode::from),
            encryption_key: self.password,
            rf_output_power: self.power,
            ..RadioConfig::default()
        };

        if self.sf.is_some() || self.bw.is_some() || self.cr.is_some() || self.preamble.is_some() {
            let defaults = RfParameters::default();
            config.parameters = Some(RfParameters {
                spreading_factor: self.sf.unwrap_or(defaults.spreading_factor),
                bandwidth: self.bw.unwrap_or(defaults.bandwidth),
                coding_rate: self.cr.unwrap_or(defaults.coding_rate),
                preamble: self.preamble.unwrap_or(defaults.preamble),
            });
        }

        config
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Open the radio on a serial port, or on a mock scripted for `command`.
async fn connect(cli: &Cli) -> Result<(Radio, Option<MockHandle>)> {
    let builder = RadioBuilder::new()
        .baud_rate(cli.baud)
        .command_timeout(Duration::from_secs(cli.timeout));

    if cli.mock {
        let mock = scripted_mock(&cli.command)?;
        let handle = mock.handle();
        let radio = builder
            .build_with_transport(Box::new(mock))
            .await
            .context("failed to start engine on mock transport")?;
        println!("Connected (mock transport)");
        return Ok((radio, Some(handle)));
    }

    let Some(port) = cli.port.as_deref() else {
        bail!("--port is required unless --mock is used");
    };
    let radio = builder
        .serial_port(port)
        .build()
        .await
        .with_context(|| format!("failed to open {port}"))?;
    println!("Connected to {port} at {} baud", cli.baud);
    Ok((radio, None))
}

/// Build a mock that answers the commands `command` will issue the way a
/// healthy module would.
fn scripted_mock(command: &Command) -> Result<MockTransport> {
    let mut mock = MockTransport::new();
    let mut expect = |cmd: &[u8], reply: &str| {
        let mut framed = cmd.to_vec();
        framed.extend_from_slice(b"\r\n");
        mock.expect(&framed, format!("{reply}\r\n").as_bytes());
    };

    match command {
        Command::Info => {
            expect(commands::cmd_read_version().as_bytes(), "+VER=RYLR896_v1.2.7");
            expect(commands::cmd_read_address().as_bytes(), "+ADDRESS=1");
            expect(commands::cmd_read_network_id().as_bytes(), "+NETWORKID=18");
            expect(commands::cmd_read_band().as_bytes(), "+BAND=915000000");
            expect(commands::cmd_read_parameters().as_bytes(), "+PARAMETER=12,7,1,4");
            expect(commands::cmd_read_rf_power().as_bytes(), "+CRFOP=15");
        }
        Command::At { command } => expect(command.as_bytes(), "+OK"),
        Command::Send { address, message } => {
            // An oversized message is rejected before the mock is touched.
            if let Ok(cmd) = commands::cmd_send(*address, message.as_bytes()) {
                expect(&cmd, "+OK");
            }
        }
        Command::Listen { .. } => {}
        Command::Config(args) => {
            for cmd in args.to_config().commands() {
                expect(cmd.command.as_bytes(), "+OK");
            }
        }
    }

    Ok(mock)
}

/// Unsolicited traffic a mock module emits during `listen`.
fn inject_demo_traffic(handle: &MockHandle) {
    let frames = [
        ReceivedMessage {
            address: 2,
            payload: b"hello, world".to_vec(),
            rssi: -42,
            snr: 11,
        },
        ReceivedMessage {
            address: 7,
            payload: vec![0x00, 0xFF, b',', 0x10],
            rssi: -97,
            snr: -3,
        },
    ];
    for frame in &frames {
        let mut line = b"+RCV=".to_vec();
        line.extend_from_slice(&encode_frame(frame));
        line.extend_from_slice(b"\r\n");
        handle.inject(&line);
    }
    handle.inject(b"+ERR=12\r\n");
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_info(radio: &Radio) -> Result<()> {
    let version = radio.command(commands::cmd_read_version()).await?;
    let address = radio.command(commands::cmd_read_address()).await?;
    let network_id = radio.command(commands::cmd_read_network_id()).await?;
    let band = radio.command(commands::cmd_read_band()).await?;
    let params = commands::parse_parameters(&radio.command(commands::cmd_read_parameters()).await?)?;
    let power = radio.command(commands::cmd_read_rf_power()).await?;

    let value = |reply: &str, name: &str| {
        commands::parse_query_value(reply, name)
            .unwrap_or(reply)
            .to_string()
    };

    println!("Module Information");
    println!("  Firmware:       {}", value(&version, "VER"));
    println!("  Address:        {}", value(&address, "ADDRESS"));
    println!("  Network ID:     {}", value(&network_id, "NETWORKID"));
    println!("  Band:           {} Hz", value(&band, "BAND"));
    println!("  Spreading:      SF{}", params.spreading_factor);
    println!("  Bandwidth:      {:?}", params.bandwidth);
    println!("  Coding rate:    4/{}", params.coding_rate + 4);
    println!("  Preamble:       {}", params.preamble);
    println!("  Output power:   {} dBm", value(&power, "CRFOP"));
    Ok(())
}

async fn cmd_at(radio: &Radio, command: &str) -> Result<()> {
    match radio.command(command).await {
        Ok(reply) => println!("{reply}"),
        Err(e) => match e.radio_code() {
            Some(code) => println!("+ERR={} ({code})", code.code()),
            None => return Err(e).context("command failed"),
        },
    }
    Ok(())
}

async fn cmd_send(radio: &Radio, address: u16, message: &str) -> Result<()> {
    radio
        .send_message(address, message.as_bytes())
        .await
        .with_context(|| format!("failed to send to {address}"))?;
    println!("Sent {} bytes to {address}", message.len());
    Ok(())
}

async fn cmd_listen(radio: &Radio, duration: u64, mock: Option<&MockHandle>) -> Result<()> {
    let mut events = radio.subscribe();
    if let Some(handle) = mock {
        inject_demo_traffic(handle);
    }
    println!("Listening for {duration} s...");

    let deadline = tokio::time::sleep(Duration::from_secs(duration));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Ok(RadioEvent::TransportFault { reason }) => bail!("transport fault: {reason}"),
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

async fn cmd_config(radio: &Radio, args: &ConfigArgs) -> Result<()> {
    let config = args.to_config();
    if config.is_empty() {
        bail!("no settings given; see --help");
    }
    for cmd in config.commands() {
        println!("  {:<16} {}", cmd.setting, cmd.command);
    }
    radio.apply_config(&config).await?;
    println!("Configuration applied");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_event(event: &RadioEvent) {
    match event {
        RadioEvent::MessageReceived(msg) => println!(
            "RX from {:>5}  rssi {:>4} dBm  snr {:>3} dB  {}",
            msg.address,
            msg.rssi,
            msg.snr,
            format_payload(&msg.payload)
        ),
        RadioEvent::RadioError(code) => println!("module error {code}"),
        RadioEvent::MalformedFrame { line, reason } => {
            println!("malformed frame ({reason}): {line}")
        }
        RadioEvent::UnrecognizedLine { line } => println!("unrecognized: {line}"),
        RadioEvent::TransportFault { reason } => println!("transport fault: {reason}"),
    }
}

/// Quote printable payloads, hex-dump anything else.
fn format_payload(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => format!("{text:?}"),
        _ => format!("0x{}", hex::encode(payload)),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (radio, mock) = connect(&cli).await?;

    let result = match &cli.command {
        Command::Info => cmd_info(&radio).await,
        Command::At { command } => cmd_at(&radio, command).await,
        Command::Send { address, message } => cmd_send(&radio, *address, message).await,
        Command::Listen { duration } => cmd_listen(&radio, *duration, mock.as_ref()).await,
        Command::Config(args) => cmd_config(&radio, args).await,
    };

    radio.shutdown().await.ok();
    result
}
