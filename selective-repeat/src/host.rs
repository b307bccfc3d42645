//! The narrow interface between a protocol side and its surroundings.
//!
//! Sender and receiver never touch a socket, a clock, or the application
//! directly.  Every effect they have on the outside world goes through a
//! [`Host`]:
//!
//! | Call                         | Meaning                                   |
//! |------------------------------|-------------------------------------------|
//! | `send_to_channel(packet)`    | hand a packet to the unreliable channel   |
//! | `deliver_to_application(p)`  | pass an in-order payload up               |
//! | `start_timer(duration)`      | arm this side's single countdown alarm    |
//! | `stop_timer()`               | disarm it                                 |
//!
//! Each side gets its own host, so which side is talking is implied by the
//! host it was handed.  When the alarm fires the host calls
//! [`crate::sender::SrSender::on_timeout`].
//!
//! [`Outbox`] is a host that just records what was asked of it; the UDP
//! driver in [`crate::link`] and the tests both use it.

use std::time::Duration;

use crate::packet::{Packet, Payload};

/// Effects a protocol side can request from its environment.
pub trait Host {
    /// Fire-and-forget transmission over the unreliable channel.
    fn send_to_channel(&mut self, packet: Packet);

    /// Hand a payload, already in sequence order, to the application.
    fn deliver_to_application(&mut self, payload: Payload);

    /// Arm the side's alarm to fire after `duration`.
    fn start_timer(&mut self, duration: Duration);

    /// Disarm the side's alarm.
    fn stop_timer(&mut self);
}

/// One request recorded by an [`Outbox`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send(Packet),
    Deliver(Payload),
    StartTimer(Duration),
    StopTimer,
}

/// A [`Host`] that queues every request for the caller to act on later.
#[derive(Debug, Default)]
pub struct Outbox {
    actions: Vec<Action>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded actions, oldest first.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Take the recorded actions, leaving the outbox empty.
    pub fn drain(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }

    /// Packets handed to the channel, in order.
    pub fn sent(&self) -> Vec<Packet> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    /// Payloads delivered to the application, in order.
    pub fn delivered(&self) -> Vec<Payload> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Deliver(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    /// `Some(true)` if the last timer action was a start, `Some(false)` if a
    /// stop, `None` if the timer was never touched.
    pub fn timer_running(&self) -> Option<bool> {
        self.actions.iter().rev().find_map(|a| match a {
            Action::StartTimer(_) => Some(true),
            Action::StopTimer => Some(false),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }
}

impl Host for Outbox {
    fn send_to_channel(&mut self, packet: Packet) {
        self.actions.push(Action::Send(packet));
    }

    fn deliver_to_application(&mut self, payload: Payload) {
        self.actions.push(Action::Deliver(payload));
    }

    fn start_timer(&mut self, duration: Duration) {
        self.actions.push(Action::StartTimer(duration));
    }

    fn stop_timer(&mut self) {
        self.actions.push(Action::StopTimer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::payload_from;

    #[test]
    fn records_in_order() {
        let mut out = Outbox::new();
        out.send_to_channel(Packet::ack(1));
        out.start_timer(Duration::from_millis(5));
        out.deliver_to_application(payload_from(b"x"));
        out.stop_timer();

        assert_eq!(out.actions().len(), 4);
        assert_eq!(out.sent(), vec![Packet::ack(1)]);
        assert_eq!(out.delivered(), vec![payload_from(b"x")]);
        assert_eq!(out.timer_running(), Some(false));
    }

    #[test]
    fn drain_empties() {
        let mut out = Outbox::new();
        assert_eq!(out.timer_running(), None);
        out.start_timer(Duration::from_millis(1));
        assert_eq!(out.timer_running(), Some(true));
        let taken = out.drain();
        assert_eq!(taken, vec![Action::StartTimer(Duration::from_millis(1))]);
        assert!(out.actions().is_empty());
    }
}
