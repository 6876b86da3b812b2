//! Broadcast fan-out: target resolution, self-exclusion, failure isolation,
//! and queue backpressure.

use quorum_core::{CommConfig, Envelope, MsgKind};

use crate::{arm, expect_delivery, expect_silence, payload_of, start_node, start_node_with};
use quorum_comm::MemoryHub;

/// A sender in its own target set never receives its own message.
#[tokio::test]
async fn no_self_send() {
    let hub = MemoryHub::new();
    let a = start_node(&hub, b"key-a").await;
    let c = start_node(&hub, b"key-c").await;

    let mut a_rx = arm(&a, MsgKind::Keygen, "r");
    let mut c_rx = arm(&c, MsgKind::Keygen, "r");

    // C includes itself in the target set
    c.broadcast(
        vec![a.local_peer_id(), c.local_peer_id()],
        Envelope::new(MsgKind::Keygen, "r", b"hello".to_vec()),
    )
    .await;

    assert_eq!(payload_of(&expect_delivery(&mut a_rx).await), b"hello");
    expect_silence(&mut c_rx).await;

    a.stop().await.unwrap();
    c.stop().await.unwrap();
}

/// An empty target set fans out to every reachable peer.
#[tokio::test]
async fn empty_target_set_reaches_everyone() {
    let hub = MemoryHub::new();
    let a = start_node(&hub, b"key-a").await;
    let b = start_node(&hub, b"key-b").await;
    let c = start_node(&hub, b"key-c").await;

    let mut a_rx = arm(&a, MsgKind::Liveness, "ping");
    let mut b_rx = arm(&b, MsgKind::Liveness, "ping");

    c.broadcast(
        Vec::new(),
        Envelope::new(MsgKind::Liveness, "ping", b"alive?".to_vec()),
    )
    .await;

    assert_eq!(payload_of(&expect_delivery(&mut a_rx).await), b"alive?");
    assert_eq!(payload_of(&expect_delivery(&mut b_rx).await), b"alive?");

    a.stop().await.unwrap();
    b.stop().await.unwrap();
    c.stop().await.unwrap();
}

/// One unreachable target must not cost the reachable ones their copy.
#[tokio::test]
async fn unreachable_peer_does_not_abort_the_batch() {
    let hub = MemoryHub::new();
    let a = start_node(&hub, b"key-a").await;
    let b = start_node(&hub, b"key-b").await;
    let c = start_node(&hub, b"key-c").await;

    let mut a_rx = arm(&a, MsgKind::Keysign, "round3");
    let gone = b.local_peer_id();
    b.stop().await.unwrap();
    hub.disconnect(&gone);

    c.broadcast(
        vec![gone, a.local_peer_id()],
        Envelope::new(MsgKind::Keysign, "round3", b"partial".to_vec()),
    )
    .await;

    assert_eq!(payload_of(&expect_delivery(&mut a_rx).await), b"partial");

    a.stop().await.unwrap();
    c.stop().await.unwrap();
}

/// With a queue of capacity 1 the producer is backpressured, not dropped:
/// every enqueued broadcast is eventually delivered.
#[tokio::test]
async fn saturated_queue_applies_backpressure_without_loss() {
    let hub = MemoryHub::new();
    let a = start_node(&hub, b"key-a").await;
    let tight = CommConfig {
        queue_capacity: 1,
        ..CommConfig::default()
    };
    let b = start_node_with(&hub, b"key-b", tight).await.unwrap();

    let mut rx = arm(&a, MsgKind::Keygen, "burst");
    let total = 32u8;
    for i in 0..total {
        b.broadcast(
            vec![a.local_peer_id()],
            Envelope::new(MsgKind::Keygen, "burst", vec![i]),
        )
        .await;
    }

    let mut seen = Vec::new();
    for _ in 0..total {
        seen.push(payload_of(&expect_delivery(&mut rx).await)[0]);
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..total).collect::<Vec<_>>());

    a.stop().await.unwrap();
    b.stop().await.unwrap();
}
