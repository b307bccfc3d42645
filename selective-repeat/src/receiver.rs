//! Selective Repeat receive-side state machine.
//!
//! [`SrReceiver`] implements the receiver side of Selective Repeat:
//!
//! - Every packet that passes the checksum is **individually ACKed**, echoing
//!   its sequence number, whether or not it falls in the receive window.  A
//!   corrupted packet gets no ACK at all; the sender's timer recovers it.
//! - In-window packets are buffered, even out of order.  A second copy of a
//!   packet whose slot is already filled is ignored.
//! - As soon as the packet at `base` is present, the longest contiguous run
//!   of buffered packets starting there is delivered to the application in
//!   sequence order and the window slides past it.
//!
//! This module only manages state; every effect goes through a [`Host`].

use std::collections::VecDeque;

use crate::config::ProtocolConfig;
use crate::host::Host;
use crate::packet::{is_corrupted, Packet};
use crate::stats::ReceiverStats;
use crate::window;

/// Result of feeding one data packet to [`SrReceiver::on_packet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvEvent {
    /// Checksum mismatch; dropped without an ACK.
    Corrupted,
    /// ACKed, but outside the receive window so not buffered.
    OutOfWindow,
    /// ACKed; the slot already held this packet.
    Duplicate,
    /// ACKed and buffered ahead of a gap.
    Buffered,
    /// ACKed and filled the base; `count` payloads were delivered.
    Delivered { count: usize },
}

/// Selective Repeat receive-side state.
#[derive(Debug)]
pub struct SrReceiver {
    config: ProtocolConfig,

    /// Oldest sequence number not yet delivered (left window edge).
    base: u32,

    /// Index of the furthest populated slot, `None` when the buffer is empty.
    highest_seen: Option<usize>,

    /// Exactly `window_size` slots; index 0 always holds `base`.
    window: VecDeque<Option<Packet>>,

    stats: ReceiverStats,
}

impl SrReceiver {
    /// Create a receiver expecting sequence number 0 first.
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
            highest_seen: None,
            window: VecDeque::from(vec![None; config.window_size]),
            stats: ReceiverStats::default(),
        }
    }

    /// Return to the initial state.  Counters are kept.
    pub fn reset(&mut self) {
        self.base = 0;
        self.highest_seen = None;
        self.window.iter_mut().for_each(|s| *s = None);
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn highest_seen(&self) -> Option<usize> {
        self.highest_seen
    }

    /// Packets held in the buffer, waiting for a gap before them to fill.
    pub fn buffered(&self) -> usize {
        self.window.iter().filter(|s| s.is_some()).count()
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Process a data packet from the sender.
    pub fn on_packet<H: Host + ?Sized>(&mut self, host: &mut H, packet: &Packet) -> RecvEvent {
        if is_corrupted(packet) {
            self.stats.corrupted += 1;
            log::trace!("[sr:B] ← corrupted packet dropped, no ACK");
            return RecvEvent::Corrupted;
        }
        self.stats.packets_received += 1;

        let seq = packet.seq;
        host.send_to_channel(Packet::ack(seq));
        self.stats.acks_sent += 1;
        log::trace!("[sr:B] ← DATA seq={}; → ACK {}", seq, seq);

        if !window::in_window(seq, self.base, self.config.window_size, self.config.seq_space) {
            self.stats.out_of_window += 1;
            log::trace!("[sr:B] seq={} outside window base={}", seq, self.base);
            return RecvEvent::OutOfWindow;
        }

        let idx = window::offset(seq, self.base, self.config.seq_space);
        if !matches!(self.highest_seen, Some(h) if h >= idx) {
            self.highest_seen = Some(idx);
        }

        if self.window[idx].is_some() {
            self.stats.duplicates += 1;
            log::trace!("[sr:B] seq={} already buffered", seq);
            return RecvEvent::Duplicate;
        }
        self.window[idx] = Some(*packet);

        if seq != self.base {
            log::trace!("[sr:B] seq={} buffered at slot {}", seq, idx);
            return RecvEvent::Buffered;
        }

        let count = self.deliver_run(host);
        RecvEvent::Delivered { count }
    }

    /// Deliver the contiguous run of packets at the front and slide past it.
    fn deliver_run<H: Host + ?Sized>(&mut self, host: &mut H) -> usize {
        let run = self.window.iter().take_while(|s| s.is_some()).count();
        for _ in 0..run {
            if let Some(Some(packet)) = self.window.pop_front() {
                host.deliver_to_application(packet.payload);
            }
            self.window.push_back(None);
        }

        self.base = window::advance(self.base, run, self.config.seq_space);
        self.highest_seen = self.highest_seen.and_then(|h| h.checked_sub(run));
        self.stats.delivered += run as u64;
        log::debug!(
            "[sr:B] delivered {} packet(s), window base={} buffered={}",
            run,
            self.base,
            self.buffered()
        );
        run
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Outbox;
    use crate::packet::Payload;
    use std::time::Duration;

    fn receiver() -> SrReceiver {
        SrReceiver::new(ProtocolConfig::default())
    }

    fn data(seq: u32) -> Packet {
        Packet::data(seq, [b'a' + (seq as u8); 20])
    }

    fn payload(seq: u32) -> Payload {
        [b'a' + (seq as u8); 20]
    }

    #[test]
    fn initial_state() {
        let r = receiver();
        assert_eq!(r.base(), 0);
        assert_eq!(r.highest_seen(), None);
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn window_bound_follows_config() {
        let config = ProtocolConfig::new(2, 4, Duration::from_millis(5)).unwrap();
        let mut r = SrReceiver::new(config);
        let mut out = Outbox::new();
        assert_eq!(r.config(), &config);

        assert_eq!(r.on_packet(&mut out, &data(1)), RecvEvent::Buffered);
        assert_eq!(r.on_packet(&mut out, &data(2)), RecvEvent::OutOfWindow);
        assert_eq!(r.buffered(), 1);
    }

    #[test]
    fn in_order_packet_delivered_and_acked() {
        let mut r = receiver();
        let mut out = Outbox::new();

        assert_eq!(r.on_packet(&mut out, &data(0)), RecvEvent::Delivered { count: 1 });
        assert_eq!(out.sent(), vec![Packet::ack(0)]);
        assert_eq!(out.delivered(), vec![payload(0)]);
        assert_eq!(r.base(), 1);
        assert_eq!(r.highest_seen(), None);
    }

    #[test]
    fn corrupted_packet_gets_no_ack() {
        let mut r = receiver();
        let mut out = Outbox::new();
        let mut pkt = data(0);
        pkt.payload[0] = b'Z';

        assert_eq!(r.on_packet(&mut out, &pkt), RecvEvent::Corrupted);
        assert!(out.actions().is_empty());
        assert_eq!(r.base(), 0);
        assert_eq!(r.stats().corrupted, 1);
    }

    #[test]
    fn gap_holds_back_delivery() {
        let mut r = receiver();
        let mut out = Outbox::new();

        assert_eq!(r.on_packet(&mut out, &data(1)), RecvEvent::Buffered);
        assert_eq!(r.on_packet(&mut out, &data(3)), RecvEvent::Buffered);
        assert!(out.delivered().is_empty());
        assert_eq!(r.highest_seen(), Some(3));
        assert_eq!(r.buffered(), 2);

        assert_eq!(r.on_packet(&mut out, &data(0)), RecvEvent::Delivered { count: 2 });
        assert_eq!(out.delivered(), vec![payload(0), payload(1)]);
        assert_eq!(r.base(), 2);
        // seq 3 moved from slot 3 to slot 1.
        assert_eq!(r.highest_seen(), Some(1));
        assert_eq!(r.buffered(), 1);

        let acks: Vec<u32> = out.sent().iter().map(|p| p.ack).collect();
        assert_eq!(acks, vec![1, 3, 0]);
    }

    #[test]
    fn duplicate_is_acked_but_not_stored_twice() {
        let mut r = receiver();
        let mut out = Outbox::new();
        r.on_packet(&mut out, &data(2));
        assert_eq!(r.on_packet(&mut out, &data(2)), RecvEvent::Duplicate);
        assert_eq!(out.sent().len(), 2);
        assert_eq!(r.buffered(), 1);
        assert_eq!(r.stats().duplicates, 1);
    }

    #[test]
    fn already_delivered_packet_is_reacked() {
        let mut r = receiver();
        let mut out = Outbox::new();
        r.on_packet(&mut out, &data(0));
        out.clear();

        // The ACK for 0 was lost; the sender retransmits.
        assert_eq!(r.on_packet(&mut out, &data(0)), RecvEvent::OutOfWindow);
        assert_eq!(out.sent(), vec![Packet::ack(0)]);
        assert!(out.delivered().is_empty());
    }

    #[test]
    fn all_zero_payload_is_buffered() {
        let mut r = receiver();
        let mut out = Outbox::new();
        let zeros = Packet::data(1, [0u8; 20]);
        assert_eq!(r.on_packet(&mut out, &zeros), RecvEvent::Buffered);
        assert_eq!(r.on_packet(&mut out, &data(0)), RecvEvent::Delivered { count: 2 });
        assert_eq!(out.delivered()[1], [0u8; 20]);
    }

    #[test]
    fn window_wraps_across_zero() {
        let mut r = receiver();
        let mut out = Outbox::new();
        for seq in 0..10 {
            r.on_packet(&mut out, &data(seq));
        }
        assert_eq!(r.base(), 10);
        out.clear();

        // Window is now 10, 11, 0, 1, 2, 3.
        assert_eq!(r.on_packet(&mut out, &data(1)), RecvEvent::Buffered);
        assert_eq!(r.on_packet(&mut out, &data(0)), RecvEvent::Buffered);
        assert_eq!(r.on_packet(&mut out, &data(4)), RecvEvent::OutOfWindow);
        assert_eq!(r.on_packet(&mut out, &data(11)), RecvEvent::Buffered);
        assert_eq!(r.on_packet(&mut out, &data(10)), RecvEvent::Delivered { count: 4 });
        assert_eq!(
            out.delivered(),
            vec![payload(10), payload(11), payload(0), payload(1)]
        );
        assert_eq!(r.base(), 2);
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn reset_clears_buffer() {
        let mut r = receiver();
        let mut out = Outbox::new();
        r.on_packet(&mut out, &data(4));
        r.reset();
        assert_eq!(r.buffered(), 0);
        assert_eq!(r.highest_seen(), None);
        assert_eq!(r.base(), 0);
    }
}
