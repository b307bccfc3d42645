//! Transfers over real loopback UDP sockets.
//!
//! The receiver runs in a background task; the sender runs on the test task
//! and both must agree on the delivered sequence.

use std::net::SocketAddr;
use std::time::Duration;

use selective_repeat::link::{self, LinkError, MAX_RETRIES};
use selective_repeat::packet::payload_from;
use selective_repeat::simulator::message_for;
use selective_repeat::socket::Socket;
use selective_repeat::stats::SenderStats;
use selective_repeat::{Packet, Payload, ProtocolConfig};

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

async fn bind_loopback() -> (Socket, SocketAddr) {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let socket = Socket::bind(addr).await.expect("bind loopback socket");
    let local = socket.local_addr;
    (socket, local)
}

/// Run one complete transfer; returns what the receiver delivered and the
/// sender's counters.
async fn transfer(config: ProtocolConfig, messages: Vec<Payload>) -> (Vec<Payload>, SenderStats) {
    let (rx_socket, rx_addr) = bind_loopback().await;
    let (tx_socket, _) = bind_loopback().await;
    let count = messages.len();

    let receiver = tokio::spawn(async move {
        link::receive_messages(&rx_socket, config, count, Duration::from_millis(100)).await
    });

    let stats = tokio::time::timeout(
        Duration::from_secs(10),
        link::send_messages(&tx_socket, rx_addr, config, messages),
    )
    .await
    .expect("sender timed out")
    .expect("sender failed");
    assert_eq!(stats.messages_submitted, count as u64 + stats.window_full);

    let (delivered, rx_stats) = receiver
        .await
        .expect("receiver task panicked")
        .expect("receiver failed");
    assert_eq!(rx_stats.delivered, count as u64);
    (delivered, stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn loopback_delivers_in_order() {
    let messages: Vec<Payload> = (0..30).map(message_for).collect();
    let (delivered, _) = transfer(ProtocolConfig::default(), messages.clone()).await;
    assert_eq!(delivered, messages);
}

#[tokio::test]
async fn small_window_applies_backpressure() {
    let config = ProtocolConfig::new(1, 2, Duration::from_millis(50)).unwrap();
    let messages: Vec<Payload> = (0..8).map(message_for).collect();
    let (delivered, stats) = transfer(config, messages.clone()).await;
    assert_eq!(delivered, messages);
    // Each message after the first meets a full window exactly once.
    assert_eq!(stats.window_full, 7);
    assert_eq!(stats.messages_submitted, 15);
}

#[tokio::test]
async fn text_payloads_survive_the_wire() {
    let messages: Vec<Payload> = ["hello", "selective", "repeat"]
        .iter()
        .map(|t| payload_from(t.as_bytes()))
        .collect();
    let (delivered, _) = transfer(ProtocolConfig::default(), messages.clone()).await;
    assert_eq!(delivered, messages);
}

#[tokio::test]
async fn empty_transfer_finishes_immediately() {
    let (tx_socket, _) = bind_loopback().await;
    let (_, nowhere) = bind_loopback().await;
    let stats = link::send_messages(&tx_socket, nowhere, ProtocolConfig::default(), Vec::new())
        .await
        .expect("nothing to send");
    assert_eq!(stats.packets_sent, 0);
}

#[tokio::test]
async fn silent_peer_exhausts_retries() {
    let (tx_socket, _) = bind_loopback().await;
    // Bound but never read, so no ACK ever comes back.
    let (_silent, silent_addr) = bind_loopback().await;
    let config = ProtocolConfig::new(6, 12, Duration::from_millis(5)).unwrap();

    let err = link::send_messages(&tx_socket, silent_addr, config, vec![message_for(0)])
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::MaxRetriesExceeded(n) if n == MAX_RETRIES));
}

#[tokio::test]
async fn receiver_acks_stray_packets_from_any_address() {
    let (rx_socket, rx_addr) = bind_loopback().await;
    let (stray, _) = bind_loopback().await;

    let receiver = tokio::spawn(async move {
        link::receive_messages(
            &rx_socket,
            ProtocolConfig::default(),
            1,
            Duration::from_millis(20),
        )
        .await
    });

    let data = Packet::data(0, message_for(0));
    stray.send_to(&data, rx_addr).await.unwrap();
    let (ack, _) = tokio::time::timeout(Duration::from_secs(5), stray.recv_from())
        .await
        .expect("no ACK")
        .unwrap();
    assert_eq!(ack, Packet::ack(0));

    let (delivered, _) = receiver.await.unwrap().unwrap();
    assert_eq!(delivered, vec![message_for(0)]);
}
