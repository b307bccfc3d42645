//! Packet layout and the checksum codec shared by sender and receiver.
//!
//! Every unit exchanged over the unreliable channel is a [`Packet`]: a data
//! packet from the sender, or an acknowledgement from the receiver.  This
//! module is responsible for:
//! - Defining the packet fields and the fixed-length [`Payload`].
//! - Computing the checksum ([`compute_checksum`]) and detecting corruption
//!   ([`is_corrupted`]).  This is the only corruption check in the crate.
//! - Serialising a [`Packet`] into a datagram for the UDP host and parsing it
//!   back.
//!
//! No I/O happens here.
//!
//! # Wire format
//!
//! All integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Acknowledgment Number                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Checksum                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     Payload (20 bytes) ...                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total size: [`WIRE_LEN`] = 32 bytes.

use thiserror::Error;

/// Fixed payload length carried by every packet.
pub const PAYLOAD_LEN: usize = 20;

/// Application-layer message body; one message maps to exactly one packet.
pub type Payload = [u8; PAYLOAD_LEN];

/// Placed in `seq` or `ack` when the field carries no information.
pub const NOT_IN_USE: u32 = u32::MAX;

/// Byte length of a serialised packet.
pub const WIRE_LEN: usize = 12 + PAYLOAD_LEN;

const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_CHECKSUM: usize = 8;
const OFF_PAYLOAD: usize = 12;

/// A single packet on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number of a data packet, [`NOT_IN_USE`] on an ACK.
    pub seq: u32,
    /// Sequence number being acknowledged, [`NOT_IN_USE`] on a data packet.
    pub ack: u32,
    /// [`compute_checksum`] of the other three fields, stamped by the sender.
    pub checksum: u32,
    pub payload: Payload,
}

impl Packet {
    /// Build a data packet for `seq` carrying `payload`, checksum included.
    pub fn data(seq: u32, payload: Payload) -> Self {
        Self::stamped(seq, NOT_IN_USE, payload)
    }

    /// Build an acknowledgement echoing `ack`, with a zero-filled payload.
    pub fn ack(ack: u32) -> Self {
        Self::stamped(NOT_IN_USE, ack, [0u8; PAYLOAD_LEN])
    }

    fn stamped(seq: u32, ack: u32, payload: Payload) -> Self {
        let mut packet = Self {
            seq,
            ack,
            checksum: 0,
            payload,
        };
        packet.checksum = compute_checksum(&packet);
        packet
    }

    /// Serialise into a [`WIRE_LEN`]-byte datagram.
    ///
    /// The stored checksum is written as-is, never recomputed, so a packet
    /// corrupted in memory stays detectably corrupted on the wire.
    pub fn encode(&self) -> [u8; WIRE_LEN] {
        let mut buf = [0u8; WIRE_LEN];
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seq.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&self.ack.to_be_bytes());
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 4].copy_from_slice(&self.checksum.to_be_bytes());
        buf[OFF_PAYLOAD..].copy_from_slice(&self.payload);
        buf
    }

    /// Parse a [`Packet`] from a raw datagram.
    ///
    /// Only the length is checked.  Checksum verification is left to the
    /// state machines through [`is_corrupted`], so a damaged datagram of the
    /// right size is returned and then dropped by the protocol itself.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < WIRE_LEN {
            return Err(PacketError::BufferTooShort(buf.len()));
        }
        if buf.len() != WIRE_LEN {
            return Err(PacketError::LengthMismatch(buf.len()));
        }

        let word = |off: usize| u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);
        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&buf[OFF_PAYLOAD..]);

        Ok(Self {
            seq: word(OFF_SEQ),
            ack: word(OFF_ACK),
            checksum: word(OFF_CHECKSUM),
            payload,
        })
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("datagram of {0} bytes is shorter than a packet")]
    BufferTooShort(usize),
    #[error("datagram of {0} bytes does not match the packet size")]
    LengthMismatch(usize),
}

/// Sum of `seq`, `ack` and every payload byte, modulo 2^32.
///
/// The stored `checksum` field is not part of the sum.
pub fn compute_checksum(packet: &Packet) -> u32 {
    packet
        .payload
        .iter()
        .fold(packet.seq.wrapping_add(packet.ack), |sum, &b| {
            sum.wrapping_add(u32::from(b))
        })
}

/// `true` when the stored checksum disagrees with the recomputed one.
pub fn is_corrupted(packet: &Packet) -> bool {
    packet.checksum != compute_checksum(packet)
}

/// Build a payload from `bytes`, truncating or zero-padding to [`PAYLOAD_LEN`].
pub fn payload_from(bytes: &[u8]) -> Payload {
    let mut payload = [0u8; PAYLOAD_LEN];
    let n = bytes.len().min(PAYLOAD_LEN);
    payload[..n].copy_from_slice(&bytes[..n]);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_packet_is_not_corrupted() {
        let pkt = Packet::data(3, payload_from(b"hello"));
        assert_eq!(pkt.ack, NOT_IN_USE);
        assert!(!is_corrupted(&pkt));
    }

    #[test]
    fn ack_packet_shape() {
        let pkt = Packet::ack(7);
        assert_eq!(pkt.seq, NOT_IN_USE);
        assert_eq!(pkt.ack, 7);
        assert_eq!(pkt.payload, [0u8; PAYLOAD_LEN]);
        assert!(!is_corrupted(&pkt));
    }

    #[test]
    fn checksum_sums_all_fields() {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload[0] = 10;
        payload[19] = 5;
        let pkt = Packet {
            seq: 2,
            ack: 100,
            checksum: 0,
            payload,
        };
        assert_eq!(compute_checksum(&pkt), 117);
    }

    #[test]
    fn checksum_wraps_instead_of_overflowing() {
        let pkt = Packet::ack(NOT_IN_USE);
        // NOT_IN_USE + NOT_IN_USE wraps to u32::MAX - 1.
        assert_eq!(pkt.checksum, u32::MAX - 1);
    }

    #[test]
    fn overwritten_payload_byte_is_detected() {
        let mut pkt = Packet::data(0, payload_from(b"aaaaaaaaaaaaaaaaaaaa"));
        pkt.payload[0] = b'Z';
        assert!(is_corrupted(&pkt));
    }

    #[test]
    fn overwritten_header_is_detected() {
        let mut pkt = Packet::data(4, payload_from(b"abc"));
        pkt.seq = 999_999;
        assert!(is_corrupted(&pkt));

        let mut ack = Packet::ack(4);
        ack.ack = 999_999;
        assert!(is_corrupted(&ack));
    }

    #[test]
    fn payload_from_pads_and_truncates() {
        assert_eq!(&payload_from(b"hi")[..3], b"hi\0");
        let long = [7u8; 40];
        assert_eq!(payload_from(&long), [7u8; PAYLOAD_LEN]);
    }

    #[test]
    fn wire_layout_is_big_endian() {
        let pkt = Packet {
            seq: 0x0102_0304,
            ack: 0x0506_0708,
            checksum: 0x090a_0b0c,
            payload: [0xee; PAYLOAD_LEN],
        };
        let bytes = pkt.encode();
        assert_eq!(&bytes[OFF_SEQ..OFF_SEQ + 4], &[1, 2, 3, 4]);
        assert_eq!(&bytes[OFF_ACK..OFF_ACK + 4], &[5, 6, 7, 8]);
        assert_eq!(&bytes[OFF_CHECKSUM..OFF_CHECKSUM + 4], &[9, 10, 11, 12]);
        assert_eq!(Packet::decode(&bytes), Ok(pkt));
    }

    #[test]
    fn decode_keeps_damaged_checksum() {
        let mut bytes = Packet::data(1, payload_from(b"xyz")).encode();
        bytes[OFF_PAYLOAD] ^= 0x01;
        let pkt = Packet::decode(&bytes).unwrap();
        assert!(is_corrupted(&pkt));
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert_eq!(Packet::decode(&[]), Err(PacketError::BufferTooShort(0)));
        assert_eq!(
            Packet::decode(&[0u8; WIRE_LEN + 1]),
            Err(PacketError::LengthMismatch(WIRE_LEN + 1))
        );
    }
}
