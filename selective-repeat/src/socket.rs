//! UDP transport for the ARQ link.
//!
//! One datagram carries exactly one encoded [`Packet`].  The socket does no
//! checksum verification: a datagram of the right length always decodes, and
//! damage is left for the sender or receiver to notice.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::packet::{Packet, PacketError, WIRE_LEN};

/// Receive buffer; room for one oversized datagram so it can be reported
/// instead of silently truncated.
const MAX_DATAGRAM: usize = 2 * WIRE_LEN;

#[derive(Error, Debug)]
pub enum SocketError {
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed datagram: {0}")]
    Packet(#[from] PacketError),
}

/// A UDP socket that sends and receives whole [`Packet`]s.
#[derive(Debug)]
pub struct Socket {
    /// Bound address, with the ephemeral port resolved.
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind to `addr`; port `0` picks an ephemeral port.
    pub async fn bind(addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(addr).await?;
        let local_addr = inner.local_addr()?;
        log::debug!("[udp] bound {local_addr}");
        Ok(Self { local_addr, inner })
    }

    pub async fn send_to(&self, packet: &Packet, dest: SocketAddr) -> Result<(), SocketError> {
        self.inner.send_to(&packet.encode(), dest).await?;
        log::trace!("[udp] → {dest} seq={} ack={}", packet.seq, packet.ack);
        Ok(())
    }

    /// Wait for the next datagram.
    ///
    /// A datagram that is not exactly one packet long comes back as
    /// [`SocketError::Packet`]; the socket stays usable.
    pub async fn recv_from(&self) -> Result<(Packet, SocketAddr), SocketError> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let (n, from) = self.inner.recv_from(&mut buf).await?;
        let packet = Packet::decode(&buf[..n])?;
        log::trace!("[udp] ← {from} seq={} ack={}", packet.seq, packet.ack);
        Ok((packet, from))
    }
}
