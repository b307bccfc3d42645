//! Selective Repeat send-side state machine.
//!
//! [`SrSender`] keeps a sliding window of up to `window_size` in-flight
//! packets.  Each packet is acknowledged individually; the window only slides
//! when the packet at its base is acknowledged, and then past every
//! already-acknowledged packet behind it.
//!
//! # Protocol contract
//!
//! - A message is accepted only while `next_seq` is inside
//!   `[base, base + window_size - 1] mod seq_space`.  Otherwise
//!   [`SrSender::submit`] returns [`SubmitError::WindowFull`] and nothing is
//!   queued.
//! - ACKs are **selective**: `ack = K` acknowledges sequence number `K` only.
//! - A single timer always covers the oldest unacknowledged packet.  On
//!   timeout only that packet is resent, never the whole window.  This stands
//!   in for the one-timer-per-packet of textbook Selective Repeat.
//!
//! This module only manages state; every effect goes through a [`Host`].

use std::collections::VecDeque;

use thiserror::Error;

use crate::config::ProtocolConfig;
use crate::host::Host;
use crate::packet::{is_corrupted, Packet, Payload};
use crate::stats::SenderStats;
use crate::window;

// ---------------------------------------------------------------------------
// SendSlot
// ---------------------------------------------------------------------------

/// One position in the send buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendSlot {
    /// No packet has been sent for this window position yet.
    Empty,
    /// Sent, waiting for its ACK.
    Unacked(Packet),
    /// ACKed, but held until every earlier packet is ACKed too.
    Acked(Packet),
}

/// Result of feeding one ACK packet to [`SrSender::on_ack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckEvent {
    /// Checksum mismatch; dropped.
    Corrupted,
    /// ACK number outside the current send window; ignored.
    OutOfWindow,
    /// ACK number inside the window but for a position not yet used.
    Unsent,
    /// The slot was already acknowledged.
    Duplicate,
    /// Newly acknowledged; the window slid forward by `slid` positions
    /// (zero when the ACK was not for the base).
    Acked { slid: usize },
}

/// Backpressure signal from [`SrSender::submit`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("send window is full (base={base}, next={next})")]
    WindowFull { base: u32, next: u32 },
}

// ---------------------------------------------------------------------------
// SrSender
// ---------------------------------------------------------------------------

/// Selective Repeat send-side state.
///
/// # Sequence-number layout
///
/// ```text
///  base                next_seq
///    │                     │
///  ──┼─────────────────────┼───────────┼──────▶ seq space (mod seq_space)
///    │ <── outstanding ──▶ │ <─ free ─▶│
///    └──────────── window_size ────────┘
/// ```
#[derive(Debug)]
pub struct SrSender {
    config: ProtocolConfig,

    /// Oldest unacknowledged sequence number (left window edge).
    base: u32,

    /// Sequence number for the next accepted message.
    next_seq: u32,

    /// Sent but not yet acknowledged.
    outstanding: usize,

    /// Exactly `window_size` slots; index 0 always holds `base`.
    window: VecDeque<SendSlot>,

    stats: SenderStats,
}

impl SrSender {
    /// Create a sender starting at sequence number 0.
    ///
    /// # Panics
    ///
    /// Panics if `config` fails [`ProtocolConfig::validate`].
    pub fn new(config: ProtocolConfig) -> Self {
        if let Err(e) = config.validate() {
            panic!("invalid protocol config: {e}");
        }
        Self {
            config,
            base: 0,
            next_seq: 0,
            outstanding: 0,
            window: VecDeque::from(vec![SendSlot::Empty; config.window_size]),
            stats: SenderStats::default(),
        }
    }

    /// Return to the initial state: base and next at 0, buffer cleared.
    ///
    /// Counters are kept.
    pub fn reset(&mut self) {
        self.base = 0;
        self.next_seq = 0;
        self.outstanding = 0;
        self.window.iter_mut().for_each(|s| *s = SendSlot::Empty);
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    /// Packets sent and not yet acknowledged.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// `true` when [`submit`](Self::submit) would accept a message.
    pub fn can_submit(&self) -> bool {
        window::in_window(
            self.next_seq,
            self.base,
            self.config.window_size,
            self.config.seq_space,
        )
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    /// Buffer slots from the window base onwards.
    pub fn slots(&self) -> impl Iterator<Item = &SendSlot> {
        self.window.iter()
    }

    /// Accept `message`, frame it, and hand it to the channel.
    ///
    /// Returns the sequence number assigned to it.  Starts the timer when
    /// this becomes the only outstanding packet.
    pub fn submit<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        message: Payload,
    ) -> Result<u32, SubmitError> {
        self.stats.messages_submitted += 1;

        if !self.can_submit() {
            self.stats.window_full += 1;
            log::debug!(
                "[sr:A] window full, message rejected (base={} next={})",
                self.base,
                self.next_seq
            );
            return Err(SubmitError::WindowFull {
                base: self.base,
                next: self.next_seq,
            });
        }

        let seq = self.next_seq;
        let packet = Packet::data(seq, message);
        let idx = window::offset(seq, self.base, self.config.seq_space);
        self.window[idx] = SendSlot::Unacked(packet);
        self.outstanding += 1;
        self.stats.packets_sent += 1;

        log::trace!("[sr:A] → DATA seq={} outstanding={}", seq, self.outstanding);
        host.send_to_channel(packet);

        if seq == self.base {
            host.start_timer(self.config.timeout);
        }

        self.next_seq = window::advance(seq, 1, self.config.seq_space);
        Ok(seq)
    }

    /// Process an ACK packet from the receiver.
    pub fn on_ack<H: Host + ?Sized>(&mut self, host: &mut H, packet: &Packet) -> AckEvent {
        if is_corrupted(packet) {
            self.stats.corrupted_acks += 1;
            log::trace!("[sr:A] ← corrupted ACK dropped");
            return AckEvent::Corrupted;
        }
        self.stats.total_acks_received += 1;

        let ack = packet.ack;
        if !window::in_window(ack, self.base, self.config.window_size, self.config.seq_space) {
            log::trace!("[sr:A] ← ACK {} outside window base={}", ack, self.base);
            return AckEvent::OutOfWindow;
        }

        let idx = window::offset(ack, self.base, self.config.seq_space);
        match self.window[idx] {
            SendSlot::Unacked(p) => {
                self.window[idx] = SendSlot::Acked(p);
                self.outstanding -= 1;
                self.stats.new_acks += 1;
                log::trace!("[sr:A] ← ACK {} (new)", ack);
            }
            SendSlot::Acked(_) => {
                self.stats.duplicate_acks += 1;
                log::trace!("[sr:A] ← ACK {} (duplicate)", ack);
                return AckEvent::Duplicate;
            }
            SendSlot::Empty => {
                log::trace!("[sr:A] ← ACK {} for unsent position", ack);
                return AckEvent::Unsent;
            }
        }

        if ack != self.base {
            return AckEvent::Acked { slid: 0 };
        }

        let slid = self.slide();
        host.stop_timer();
        if self.outstanding > 0 {
            host.start_timer(self.config.timeout);
        }
        AckEvent::Acked { slid }
    }

    /// Resend the oldest unacknowledged packet and restart the timer.
    ///
    /// Returns `false` (and leaves the timer stopped) if nothing is
    /// outstanding, which only happens when the host fires a stale timer.
    pub fn on_timeout<H: Host + ?Sized>(&mut self, host: &mut H) -> bool {
        let Some(SendSlot::Unacked(packet)) = self.window.front().copied() else {
            log::warn!("[sr:A] timeout with nothing outstanding (base={})", self.base);
            return false;
        };

        self.stats.packets_resent += 1;
        log::debug!("[sr:A] timeout, resending seq={}", packet.seq);
        host.send_to_channel(packet);
        host.start_timer(self.config.timeout);
        true
    }

    /// Drop the run of acknowledged slots at the front and advance `base`.
    fn slide(&mut self) -> usize {
        let run = self
            .window
            .iter()
            .take_while(|s| matches!(s, SendSlot::Acked(_)))
            .count();
        for _ in 0..run {
            self.window.pop_front();
            self.window.push_back(SendSlot::Empty);
        }
        self.base = window::advance(self.base, run, self.config.seq_space);
        log::debug!(
            "[sr:A] window slid by {} to base={} outstanding={}",
            run,
            self.base,
            self.outstanding
        );
        run
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
