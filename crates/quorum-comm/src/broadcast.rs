//! Broadcast pipeline — dequeues outbound requests, resolves targets,
//! and fans out one framed write-stream per peer.
//!
//! Requests are dequeued FIFO by a single worker. Fan-out within one
//! request runs in parallel across peers; a failure toward one peer never
//! aborts delivery to the rest. Delivery is at-most-once, best-effort —
//! retry and acknowledgment belong to the protocol layer above.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc};

use quorum_core::wire::{write_frame, WireError};
use quorum_core::{Envelope, PeerId};

use crate::transport::{Transport, TransportError, DISPATCH_PROTOCOL};

/// A pending outbound job. An empty target set means "every peer the
/// transport can currently reach".
#[derive(Debug)]
pub(crate) struct BroadcastRequest {
    pub peers: Vec<PeerId>,
    pub envelope: Envelope,
}

pub(crate) struct BroadcastWorker {
    transport: Arc<dyn Transport>,
    queue: mpsc::Receiver<BroadcastRequest>,
    shutdown: broadcast::Receiver<()>,
    connect_timeout: Duration,
    max_frame: usize,
}

impl BroadcastWorker {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        queue: mpsc::Receiver<BroadcastRequest>,
        shutdown: broadcast::Receiver<()>,
        connect_timeout: Duration,
        max_frame: usize,
    ) -> Self {
        Self {
            transport,
            queue,
            shutdown,
            connect_timeout,
            max_frame,
        }
    }

    pub(crate) async fn run(mut self) -> anyhow::Result<()> {
        tracing::info!("broadcast worker starting");
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("broadcast worker shutting down");
                    return Ok(());
                }

                request = self.queue.recv() => {
                    let request = match request {
                        Some(r) => r,
                        None => {
                            tracing::info!("broadcast queue closed, worker exiting");
                            return Ok(());
                        }
                    };
                    self.fan_out(request).await;
                }
            }
        }
    }

    /// Deliver one request to its whole target set. Returns once every
    /// per-peer send task has finished, so teardown never strands a send.
    async fn fan_out(&self, request: BroadcastRequest) {
        let BroadcastRequest { peers, envelope } = request;
        let kind = envelope.kind;

        let targets = if peers.is_empty() {
            self.transport.reachable_peers()
        } else {
            peers
        };

        let bytes = match envelope.to_bytes() {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode envelope, dropping request");
                return;
            }
        };

        let local = self.transport.local_peer();
        let mut send_tasks = Vec::new();

        for peer in targets {
            // never send to ourselves
            if peer == local {
                continue;
            }
            let transport = self.transport.clone();
            let bytes = bytes.clone();
            let connect_timeout = self.connect_timeout;
            let max_frame = self.max_frame;

            send_tasks.push(tokio::spawn(async move {
                if let Err(e) =
                    send_to_peer(transport, &peer, &bytes, connect_timeout, max_frame).await
                {
                    tracing::warn!(error = %e, peer = %peer, "failed to deliver broadcast");
                }
            }));
        }

        for task in send_tasks {
            let _ = task.await;
        }
        tracing::debug!(%kind, "finished broadcast fan-out");
    }
}

/// Open one stream, write one frame, close.
async fn send_to_peer(
    transport: Arc<dyn Transport>,
    peer: &PeerId,
    bytes: &[u8],
    connect_timeout: Duration,
    max_frame: usize,
) -> Result<(), SendError> {
    let mut stream = tokio::time::timeout(connect_timeout, transport.open_stream(peer, DISPATCH_PROTOCOL))
        .await
        .map_err(|_| TransportError::Timeout(peer.clone()))??;
    write_frame(&mut stream, bytes, max_frame).await?;
    // flush the write side; the stream itself closes on drop
    stream.shutdown().await.map_err(WireError::Io)?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
enum SendError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Wire(#[from] WireError),
}
