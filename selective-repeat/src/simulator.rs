//! Discrete-event emulator of an unreliable, non-reordering channel.
//!
//! Real networks drop and damage packets.  To exercise the protocol without
//! depending on actual network conditions, [`Simulator`] wires an
//! [`SrSender`] (side A) to an [`SrReceiver`] (side B) through a simulated
//! channel with a configurable fault model:
//!
//! | Fault       | Description                                              |
//! |-------------|----------------------------------------------------------|
//! | Loss        | Drop a packet with probability `loss_prob`.              |
//! | Corruption  | With probability `corrupt_prob` overwrite a field: 75%   |
//! |             | the first payload byte becomes `'Z'`, otherwise `seq` or |
//! |             | `ack` becomes 999999.                                    |
//! | Delay       | One-way delay of 1 to 10 time units.                     |
//!
//! Packets are never reordered: a packet never arrives before one sent
//! earlier in the same direction.  All randomness comes from a seeded
//! [`StdRng`], so a run is reproducible from its [`SimulatorConfig::seed`].
//!
//! The emulator also plays the application (a message source on A, a sink
//! on B) and the sender's timer.  It reports timer misuse as warnings, since
//! starting a running timer or stopping a stopped one is the caller's fault.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::{ConfigError, ProtocolConfig};
use crate::host::Host;
use crate::packet::{Packet, Payload, PAYLOAD_LEN};
use crate::receiver::SrReceiver;
use crate::sender::SrSender;
use crate::stats::{ReceiverStats, SenderStats};

/// One emulator time unit.
pub const TIME_UNIT: Duration = Duration::from_millis(1);

/// Largest accepted mean interarrival time, in time units.
pub const MAX_INTERARRIVAL: f64 = 1e9;

/// Value written into a header field the channel corrupts.
const GARBAGE_FIELD: u32 = 999_999;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the fault-injection model and the message source.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Messages the application on A generates before going quiet.
    pub messages: usize,
    /// Probability that any given packet is silently dropped.
    pub loss_prob: f64,
    /// Probability that a packet that survives loss is damaged.
    pub corrupt_prob: f64,
    /// Mean time between application messages, in time units.
    pub mean_interarrival: f64,
    pub seed: u64,
    /// Stop processing events scheduled after this instant.
    pub max_time: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default: the channel is a pass-through with delay.
        Self {
            messages: 10,
            loss_prob: 0.0,
            corrupt_prob: 0.0,
            mean_interarrival: 10.0,
            seed: 1,
            max_time: TIME_UNIT * 1_000_000,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), SimulatorError> {
        for (name, value) in [("loss", self.loss_prob), ("corrupt", self.corrupt_prob)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimulatorError::Probability { name, value });
            }
        }
        if !(self.mean_interarrival > 0.0 && self.mean_interarrival <= MAX_INTERARRIVAL) {
            return Err(SimulatorError::Interarrival(self.mean_interarrival));
        }
        Ok(())
    }
}

/// Rejected emulator or protocol configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulatorError {
    #[error("{name} probability {value} is outside [0, 1]")]
    Probability { name: &'static str, value: f64 },
    #[error("mean interarrival time {0} must be positive and at most {MAX_INTERARRIVAL}")]
    Interarrival(f64),
    #[error(transparent)]
    Protocol(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    A,
    B,
}

impl Side {
    fn peer(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug)]
enum EventKind {
    FromApplication,
    Arrival(Side, Packet),
    /// Tagged with the arm generation so a stopped timer's event is ignored.
    Timeout(u64),
}

#[derive(Debug)]
struct Event {
    at: Duration,
    id: u64,
    kind: EventKind,
}

// Ordered by time, ties broken by insertion order.
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.id) == (other.at, other.id)
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.id).cmp(&(other.at, other.id))
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Counters kept by the channel itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub messages_generated: u64,
    pub packets_offered: u64,
    pub packets_lost: u64,
    pub packets_corrupted: u64,
    /// Start/stop calls that did not match the timer's state.
    pub timer_misuse: u64,
}

struct Network {
    config: SimulatorConfig,
    rng: StdRng,
    clock: Duration,
    queue: BinaryHeap<Reverse<Event>>,
    next_id: u64,
    /// Latest scheduled arrival per destination side.
    last_arrival: [Duration; 2],
    /// Generation of the armed timer, `None` when stopped.
    timer: Option<u64>,
    timer_generation: u64,
    delivered: Vec<Payload>,
    /// Messages the sender took into its window, in submission order.
    accepted: Vec<Payload>,
    stats: ChannelStats,
}

impl Network {
    fn schedule(&mut self, at: Duration, kind: EventKind) {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(Reverse(Event { at, id, kind }));
    }

    fn schedule_message(&mut self) {
        let gap = self.rng.random::<f64>() * 2.0 * self.config.mean_interarrival;
        let at = self.clock.saturating_add(TIME_UNIT.mul_f64(gap));
        self.schedule(at, EventKind::FromApplication);
    }

    fn transmit(&mut self, from: Side, mut packet: Packet) {
        self.stats.packets_offered += 1;

        if self.rng.random::<f64>() < self.config.loss_prob {
            self.stats.packets_lost += 1;
            log::trace!("[channel] {:?}→{:?} packet lost", from, from.peer());
            return;
        }

        if self.rng.random::<f64>() < self.config.corrupt_prob {
            self.stats.packets_corrupted += 1;
            let x: f64 = self.rng.random();
            if x < 0.75 {
                packet.payload[0] = b'Z';
            } else if x < 0.875 {
                packet.seq = GARBAGE_FIELD;
            } else {
                packet.ack = GARBAGE_FIELD;
            }
            log::trace!("[channel] {:?}→{:?} packet corrupted", from, from.peer());
        }

        let dest = from.peer();
        let earliest = self.clock.max(self.last_arrival[dest.index()]);
        let at = earliest + TIME_UNIT.mul_f64(1.0 + 9.0 * self.rng.random::<f64>());
        self.last_arrival[dest.index()] = at;
        self.schedule(at, EventKind::Arrival(dest, packet));
    }
}

/// The [`Host`] one side sees: the shared network, tagged with the side.
struct Port<'a> {
    side: Side,
    net: &'a mut Network,
}

impl Host for Port<'_> {
    fn send_to_channel(&mut self, packet: Packet) {
        self.net.transmit(self.side, packet);
    }

    fn deliver_to_application(&mut self, payload: Payload) {
        match self.side {
            Side::B => self.net.delivered.push(payload),
            Side::A => log::warn!("[sim] side A has no application sink"),
        }
    }

    fn start_timer(&mut self, duration: Duration) {
        if self.side == Side::B {
            log::warn!("[sim] side B has no timer");
            return;
        }
        if self.net.timer.is_some() {
            self.net.stats.timer_misuse += 1;
            log::warn!("[sim] start_timer while the timer is already running");
        }
        self.net.timer_generation += 1;
        let generation = self.net.timer_generation;
        self.net.timer = Some(generation);
        // Saturates; an unreachable deadline lands past `max_time`.
        let at = self.net.clock.saturating_add(duration);
        self.net.schedule(at, EventKind::Timeout(generation));
    }

    fn stop_timer(&mut self) {
        if self.side == Side::B {
            log::warn!("[sim] side B has no timer");
            return;
        }
        if self.net.timer.take().is_none() {
            self.net.stats.timer_misuse += 1;
            log::warn!("[sim] stop_timer while the timer is not running");
        }
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Outcome of a simulation run.
#[derive(Debug, Clone)]
pub struct Report {
    /// Payloads handed to B's application, in delivery order.
    pub delivered: Vec<Payload>,
    /// Messages A's sender accepted; rejected ones are missing.
    pub accepted: Vec<Payload>,
    pub sender: SenderStats,
    pub receiver: ReceiverStats,
    pub channel: ChannelStats,
    pub end_time: Duration,
    /// `true` if events were still pending at `max_time`.
    pub timed_out: bool,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "simulated {:.1} time units{}",
            self.end_time.as_secs_f64() / TIME_UNIT.as_secs_f64(),
            if self.timed_out { " (stopped at max time)" } else { "" }
        )?;
        writeln!(
            f,
            "channel:  generated={} offered={} lost={} corrupted={}",
            self.channel.messages_generated,
            self.channel.packets_offered,
            self.channel.packets_lost,
            self.channel.packets_corrupted
        )?;
        writeln!(f, "sender:   {}", self.sender)?;
        write!(f, "receiver: {}", self.receiver)
    }
}

/// Produces the `n`th application message.
pub type MessageSource = Box<dyn FnMut(usize) -> Payload>;

/// A sender and a receiver joined by an emulated lossy channel.
pub struct Simulator {
    sender: SrSender,
    receiver: SrReceiver,
    net: Network,
    source: MessageSource,
    timed_out: bool,
}

impl Simulator {
    /// Emulator whose application sends the letter messages of [`message_for`].
    pub fn new(protocol: ProtocolConfig, config: SimulatorConfig) -> Result<Self, SimulatorError> {
        Self::with_source(protocol, config, Box::new(message_for))
    }

    /// Emulator whose application draws its messages from `source`.
    pub fn with_source(
        protocol: ProtocolConfig,
        config: SimulatorConfig,
        source: MessageSource,
    ) -> Result<Self, SimulatorError> {
        protocol.validate()?;
        config.validate()?;

        let mut net = Network {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            clock: Duration::ZERO,
            queue: BinaryHeap::new(),
            next_id: 0,
            last_arrival: [Duration::ZERO; 2],
            timer: None,
            timer_generation: 0,
            delivered: Vec::new(),
            accepted: Vec::new(),
            stats: ChannelStats::default(),
        };
        if net.config.messages > 0 {
            net.schedule_message();
        }

        Ok(Self {
            sender: SrSender::new(protocol),
            receiver: SrReceiver::new(protocol),
            net,
            source,
            timed_out: false,
        })
    }

    pub fn sender(&self) -> &SrSender {
        &self.sender
    }

    pub fn receiver(&self) -> &SrReceiver {
        &self.receiver
    }

    pub fn now(&self) -> Duration {
        self.net.clock
    }

    /// Payloads delivered to B so far.
    pub fn delivered(&self) -> &[Payload] {
        &self.net.delivered
    }

    /// Process the next event.  Returns `false` when there is nothing left
    /// to do before `max_time`.
    pub fn step(&mut self) -> bool {
        let Some(Reverse(event)) = self.net.queue.pop() else {
            return false;
        };
        if event.at > self.net.config.max_time {
            self.timed_out = true;
            self.net.queue.push(Reverse(event));
            return false;
        }
        self.net.clock = event.at;

        match event.kind {
            EventKind::FromApplication => {
                let n = self.net.stats.messages_generated as usize;
                self.net.stats.messages_generated += 1;
                let message = (self.source)(n);
                let mut port = Port {
                    side: Side::A,
                    net: &mut self.net,
                };
                match self.sender.submit(&mut port, message) {
                    Ok(_) => self.net.accepted.push(message),
                    Err(e) => log::debug!("[sim] message {} dropped: {}", n, e),
                }
                if n + 1 < self.net.config.messages {
                    self.net.schedule_message();
                }
            }
            EventKind::Arrival(Side::A, packet) => {
                let mut port = Port {
                    side: Side::A,
                    net: &mut self.net,
                };
                self.sender.on_ack(&mut port, &packet);
            }
            EventKind::Arrival(Side::B, packet) => {
                let mut port = Port {
                    side: Side::B,
                    net: &mut self.net,
                };
                self.receiver.on_packet(&mut port, &packet);
            }
            EventKind::Timeout(generation) => {
                if self.net.timer == Some(generation) {
                    self.net.timer = None;
                    let mut port = Port {
                        side: Side::A,
                        net: &mut self.net,
                    };
                    self.sender.on_timeout(&mut port);
                }
            }
        }
        true
    }

    /// Run until the event queue drains or `max_time` is reached.
    pub fn run(mut self) -> Report {
        while self.step() {}
        self.report()
    }

    pub fn report(&self) -> Report {
        Report {
            delivered: self.net.delivered.clone(),
            accepted: self.net.accepted.clone(),
            sender: self.sender.stats().clone(),
            receiver: self.receiver.stats().clone(),
            channel: self.net.stats.clone(),
            end_time: self.net.clock,
            timed_out: self.timed_out,
        }
    }
}

/// The `n`th application message: one letter, `a` through `z`, repeated.
pub fn message_for(n: usize) -> Payload {
    [b'a' + (n % 26) as u8; PAYLOAD_LEN]
}
