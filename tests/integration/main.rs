//! quorum integration test harness.
//!
//! Scenarios run real `Communication` instances wired together over the
//! in-memory transport — multiple nodes in one process, full dispatch and
//! broadcast pipelines, no real network required.
//!
//! Each test builds its own hub; nodes never leak between tests.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use quorum_comm::{Communication, Inbound, MemoryHub, MemoryTransport};
use quorum_core::{CommConfig, Envelope, MsgKind};

mod fanout;
mod lifecycle;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Scenario logs obey RUST_LOG like the real thing.
pub fn init_tracing() {
    use std::sync::Once;
    static TRACING: Once = Once::new();
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// How long a test waits for an expected delivery before failing.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a test waits to be satisfied nothing is coming.
pub const SILENCE_WINDOW: Duration = Duration::from_millis(300);

/// Spin up one started node on the hub. Peer identity is the hex
/// rendering of `key`.
pub async fn start_node(hub: &Arc<MemoryHub>, key: &[u8]) -> Communication {
    start_node_with(hub, key, CommConfig::default())
        .await
        .expect("node should start")
}

pub async fn start_node_with(
    hub: &Arc<MemoryHub>,
    key: &[u8],
    config: CommConfig,
) -> Result<Communication> {
    init_tracing();
    let transport = MemoryTransport::new(hub.clone(), key);
    let comm = Communication::new(transport, config);
    comm.start(key)
        .await
        .with_context(|| format!("starting node {}", comm.local_peer_id()))?;
    Ok(comm)
}

/// Subscribe a fresh channel on (kind, msg_id).
pub fn arm(comm: &Communication, kind: MsgKind, msg_id: &str) -> mpsc::Receiver<Inbound> {
    let (tx, rx) = mpsc::channel(16);
    comm.subscribe(kind, msg_id, tx);
    rx
}

/// Await one delivery or fail loudly.
pub async fn expect_delivery(rx: &mut mpsc::Receiver<Inbound>) -> Inbound {
    tokio::time::timeout(DELIVERY_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("delivery channel closed")
}

/// Assert nothing arrives on `rx` within the silence window.
pub async fn expect_silence(rx: &mut mpsc::Receiver<Inbound>) {
    let outcome = tokio::time::timeout(SILENCE_WINDOW, rx.recv()).await;
    assert!(outcome.is_err(), "unexpected delivery: {:?}", outcome);
}

/// Decode the envelope a subscriber received and return its payload.
pub fn payload_of(msg: &Inbound) -> Vec<u8> {
    Envelope::from_bytes(&msg.bytes)
        .expect("delivered bytes should decode as an envelope")
        .payload
}
