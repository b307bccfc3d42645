//! Entry point for `selective-repeat`.
//!
//! Parses CLI arguments and dispatches into one of three modes: an emulated
//! run over a lossy channel, or the sending / receiving end of a real UDP
//! transfer.  All protocol work is delegated to the library; `main.rs` owns
//! only process setup (logging, argument parsing).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use selective_repeat::link;
use selective_repeat::packet::payload_from;
use selective_repeat::simulator::{message_for, Simulator, SimulatorConfig};
use selective_repeat::socket::Socket;
use selective_repeat::{Payload, ProtocolConfig};

/// Selective Repeat reliable transfer over an unreliable channel.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

/// Protocol parameters both peers must agree on.
#[derive(Args)]
struct ProtocolArgs {
    /// Maximum unacknowledged / buffered packets.
    #[arg(short, long, default_value_t = 6)]
    window: usize,
    /// Sequence-number modulus (at least twice the window).
    #[arg(long, default_value_t = 12)]
    seq_space: u32,
    /// Retransmission timeout in milliseconds (emulator time units).
    #[arg(short, long, default_value_t = 16.0)]
    timeout: f64,
}

impl ProtocolArgs {
    fn config(&self) -> Result<ProtocolConfig> {
        let timeout = ProtocolConfig::timeout_from_millis(self.timeout)?;
        ProtocolConfig::new(self.window, self.seq_space, timeout).context("invalid protocol settings")
    }
}

#[derive(Subcommand)]
enum Mode {
    /// Run sender and receiver against the emulated lossy channel.
    Simulate {
        #[command(flatten)]
        protocol: ProtocolArgs,
        /// Number of messages the application generates.
        #[arg(short, long, default_value_t = 10)]
        messages: usize,
        /// Packet loss probability.
        #[arg(short, long, default_value_t = 0.0)]
        loss: f64,
        /// Packet corruption probability.
        #[arg(short, long, default_value_t = 0.0)]
        corrupt: f64,
        /// Mean time between application messages.
        #[arg(short, long, default_value_t = 10.0)]
        interarrival: f64,
        /// RNG seed.
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
    /// Send messages to a receiver over UDP.
    Send {
        #[command(flatten)]
        protocol: ProtocolArgs,
        /// Receiver address (e.g. 127.0.0.1:9000).
        #[arg(short, long)]
        peer: SocketAddr,
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
        /// Number of generated messages to send.
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
        /// Send these strings instead of generated messages.
        #[arg(long, num_args = 1..)]
        text: Vec<String>,
    },
    /// Receive messages over UDP and print them in order.
    Recv {
        #[command(flatten)]
        protocol: ProtocolArgs,
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
        /// Number of messages to wait for.
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
        /// Keep ACKing retransmissions for this many milliseconds afterwards.
        #[arg(long, default_value_t = 500)]
        linger_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Simulate {
            protocol,
            messages,
            loss,
            corrupt,
            interarrival,
            seed,
        } => {
            let config = SimulatorConfig {
                messages,
                loss_prob: loss,
                corrupt_prob: corrupt,
                mean_interarrival: interarrival,
                seed,
                ..SimulatorConfig::default()
            };
            let report = Simulator::new(protocol.config()?, config)?.run();
            for payload in &report.delivered {
                println!("{}", String::from_utf8_lossy(payload));
            }
            println!("{report}");
        }
        Mode::Send {
            protocol,
            peer,
            bind,
            count,
            text,
        } => {
            let messages: Vec<Payload> = if text.is_empty() {
                (0..count).map(message_for).collect()
            } else {
                text.iter().map(|t| payload_from(t.as_bytes())).collect()
            };
            let socket = Socket::bind(bind).await?;
            log::info!("Sending {} message(s) from {} to {peer}", messages.len(), socket.local_addr);
            let stats = link::send_messages(&socket, peer, protocol.config()?, messages).await?;
            println!("sender: {stats}");
        }
        Mode::Recv {
            protocol,
            bind,
            count,
            linger_ms,
        } => {
            let socket = Socket::bind(bind).await?;
            log::info!("Receiving {count} message(s) on {}", socket.local_addr);
            let (delivered, stats) = link::receive_messages(
                &socket,
                protocol.config()?,
                count,
                Duration::from_millis(linger_ms),
            )
            .await?;
            for payload in &delivered {
                println!("{}", String::from_utf8_lossy(payload).trim_end_matches('\0'));
            }
            println!("receiver: {stats}");
        }
    }

    Ok(())
}
