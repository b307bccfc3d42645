//! Selective Repeat over real UDP sockets.
//!
//! The state machines are driven here by a tokio event loop instead of the
//! emulator.  Each side records its effects in an [`Outbox`]; after every
//! event the loop drains it: packets go out on the [`Socket`], deliveries are
//! collected, and timer requests arm or disarm a single
//! `tokio::time::sleep_until` deadline.
//!
//! ```text
//!  messages ──▶ send_messages ──UDP──▶ receive_messages ──▶ Vec<Payload>
//!                   ▲   (SrSender)        (SrReceiver)  │
//!                   └──────────────── ACKs ─────────────┘
//! ```

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::config::{ConfigError, ProtocolConfig};
use crate::host::{Action, Outbox};
use crate::packet::Payload;
use crate::receiver::SrReceiver;
use crate::sender::{AckEvent, SrSender};
use crate::socket::{Socket, SocketError};
use crate::stats::{ReceiverStats, SenderStats};

/// Consecutive timeouts without a new ACK before the sender gives up.
pub const MAX_RETRIES: u32 = 10;

/// Errors that end a transfer.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("peer unresponsive after {0} consecutive timeouts")]
    MaxRetriesExceeded(u32),
}

/// Send every message in `messages` to `peer` and wait until all are ACKed.
///
/// A message the window cannot take yet waits at the head of the queue until
/// a slot frees up.  It is counted in [`SenderStats::window_full`] once, when
/// first refused, the same as a message the emulator drops.
pub async fn send_messages(
    socket: &Socket,
    peer: SocketAddr,
    config: ProtocolConfig,
    messages: Vec<Payload>,
) -> Result<SenderStats, LinkError> {
    config.validate()?;
    let mut sender = SrSender::new(config);
    let mut outbox = Outbox::new();
    let mut pending: VecDeque<Payload> = messages.into();
    let mut deadline: Option<Instant> = None;
    let mut retries = 0u32;
    let mut no_deliveries = Vec::new();
    // The head of `pending` has already been refused once.
    let mut head_blocked = false;

    loop {
        while let Some(&message) = pending.front() {
            if head_blocked && !sender.can_submit() {
                break;
            }
            if sender.submit(&mut outbox, message).is_err() {
                head_blocked = true;
                break;
            }
            head_blocked = false;
            pending.pop_front();
        }
        apply(socket, peer, &mut outbox, &mut deadline, &mut no_deliveries).await?;

        if pending.is_empty() && sender.outstanding() == 0 {
            break;
        }

        let alarm = deadline;
        tokio::select! {
            result = socket.recv_from() => match result {
                Ok((pkt, addr)) if addr == peer => {
                    if let AckEvent::Acked { .. } = sender.on_ack(&mut outbox, &pkt) {
                        retries = 0;
                    }
                }
                Ok((_, addr)) => log::debug!("[sr:A] ignoring datagram from {addr}"),
                Err(SocketError::Packet(e)) => log::warn!("[sr:A] undecodable datagram: {e}"),
                Err(e) => return Err(e.into()),
            },
            _ = wait_for(alarm) => {
                deadline = None;
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(LinkError::MaxRetriesExceeded(MAX_RETRIES));
                }
                sender.on_timeout(&mut outbox);
            }
        }
    }

    log::info!("[sr:A] transfer complete: {}", sender.stats());
    Ok(sender.stats().clone())
}

/// Receive `count` messages in order, ACKing each packet to whoever sent it.
///
/// After the last delivery the socket keeps answering retransmissions until
/// it has been quiet for `linger`, so a sender whose final ACKs were lost
/// can still finish.
pub async fn receive_messages(
    socket: &Socket,
    config: ProtocolConfig,
    count: usize,
    linger: Duration,
) -> Result<(Vec<Payload>, ReceiverStats), LinkError> {
    config.validate()?;
    let mut receiver = SrReceiver::new(config);
    let mut outbox = Outbox::new();
    let mut delivered = Vec::with_capacity(count);
    let mut no_timer = None;

    while delivered.len() < count {
        let (pkt, addr) = match socket.recv_from().await {
            Ok(v) => v,
            Err(SocketError::Packet(e)) => {
                log::warn!("[sr:B] undecodable datagram: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        receiver.on_packet(&mut outbox, &pkt);
        apply(socket, addr, &mut outbox, &mut no_timer, &mut delivered).await?;
    }

    let quiet = tokio::time::sleep(linger);
    tokio::pin!(quiet);
    loop {
        tokio::select! {
            _ = &mut quiet => break,
            result = socket.recv_from() => match result {
                Ok((pkt, addr)) => {
                    receiver.on_packet(&mut outbox, &pkt);
                    apply(socket, addr, &mut outbox, &mut no_timer, &mut delivered).await?;
                    quiet.as_mut().reset(Instant::now() + linger);
                }
                Err(SocketError::Packet(e)) => log::warn!("[sr:B] undecodable datagram: {e}"),
                Err(e) => return Err(e.into()),
            },
        }
    }

    log::info!("[sr:B] transfer complete: {}", receiver.stats());
    Ok((delivered, receiver.stats().clone()))
}

/// Carry out everything a side asked for since the last drain.
async fn apply(
    socket: &Socket,
    dest: SocketAddr,
    outbox: &mut Outbox,
    deadline: &mut Option<Instant>,
    delivered: &mut Vec<Payload>,
) -> Result<(), SocketError> {
    for action in outbox.drain() {
        match action {
            Action::Send(packet) => socket.send_to(&packet, dest).await?,
            Action::Deliver(payload) => delivered.push(payload),
            Action::StartTimer(after) => *deadline = Some(Instant::now() + after),
            Action::StopTimer => *deadline = None,
        }
    }
    Ok(())
}

/// Resolve at `deadline`, or never when the timer is disarmed.
async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
