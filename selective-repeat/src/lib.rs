//! `selective-repeat`: a Selective Repeat ARQ engine for an unreliable channel
//! that may lose, corrupt or delay packets but never reorders them.
//!
//! # Architecture
//!
//! ```text
//!  application                                        application
//!      │ submit(message)                   deliver(payload) ▲
//!  ┌───▼──────┐      data packets       ┌──────────┐        │
//!  │ SrSender │────────────────────────▶│SrReceiver│────────┘
//!  └───▲──────┘                         └────┬─────┘
//!      │ on_ack / on_timeout    individual   │
//!      └───────────────────── ACKs ──────────┘
//!
//!            every effect goes through a Host:
//!     Simulator (emulated lossy channel) or link (tokio UDP)
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]: packet fields, checksum codec, wire encoding
//! - [`window`]: cyclic sequence-number arithmetic
//! - [`config`]: window size, sequence space, timeout
//! - [`host`]: the channel / application / timer interface
//! - [`sender`]: send-side window state machine
//! - [`receiver`]: receive-side buffering and in-order delivery
//! - [`stats`]: per-side counters
//! - [`simulator`]: discrete-event lossy channel emulator
//! - [`socket`]: async UDP socket abstraction
//! - [`link`]: tokio event loops driving both sides over UDP

pub mod config;
pub mod host;
pub mod link;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod simulator;
pub mod socket;
pub mod stats;
pub mod window;

pub use config::{ConfigError, ProtocolConfig};
pub use host::{Action, Host, Outbox};
pub use packet::{compute_checksum, is_corrupted, Packet, Payload, NOT_IN_USE, PAYLOAD_LEN};
pub use receiver::{RecvEvent, SrReceiver};
pub use sender::{AckEvent, SendSlot, SrSender, SubmitError};
pub use simulator::{Report, Simulator, SimulatorConfig};
