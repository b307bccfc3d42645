//! Per-side event counters.
//!
//! Plain counters, bumped by the state machines as they process events.
//! Nothing in the protocol reads them back.

use std::fmt;

/// Sender-side counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Messages offered by the application, accepted or not.
    pub messages_submitted: u64,
    /// Submissions rejected because the send window was full.
    pub window_full: u64,
    /// First transmissions of new packets.
    pub packets_sent: u64,
    /// Uncorrupted ACKs received, including duplicates and stale ones.
    pub total_acks_received: u64,
    /// ACKs that marked a slot acknowledged for the first time.
    pub new_acks: u64,
    /// ACKs for slots already marked acknowledged.
    pub duplicate_acks: u64,
    /// ACKs dropped on checksum mismatch.
    pub corrupted_acks: u64,
    /// Timeout-driven retransmissions.
    pub packets_resent: u64,
}

impl fmt::Display for SenderStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "submitted={} window_full={} sent={} resent={} acks={} new_acks={} dup_acks={} corrupt_acks={}",
            self.messages_submitted,
            self.window_full,
            self.packets_sent,
            self.packets_resent,
            self.total_acks_received,
            self.new_acks,
            self.duplicate_acks,
            self.corrupted_acks,
        )
    }
}

/// Receiver-side counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Uncorrupted packets received, in window or not.
    pub packets_received: u64,
    /// Packets dropped on checksum mismatch.
    pub corrupted: u64,
    /// In-window packets whose slot was already filled.
    pub duplicates: u64,
    /// Uncorrupted packets outside the receive window.
    pub out_of_window: u64,
    pub acks_sent: u64,
    /// Payloads handed to the application.
    pub delivered: u64,
}

impl fmt::Display for ReceiverStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received={} corrupt={} dup={} out_of_window={} acks={} delivered={}",
            self.packets_received,
            self.corrupted,
            self.duplicates,
            self.out_of_window,
            self.acks_sent,
            self.delivered,
        )
    }
}
