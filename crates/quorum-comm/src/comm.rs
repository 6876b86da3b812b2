//! The communication instance — one per node.
//!
//! Owns the subscriber registry, the broadcast queue, the shutdown signal,
//! and every background task it spawns. `start` wires the transport and
//! launches the workers; `stop` closes the transport, signals shutdown,
//! and blocks until all spawned work has finished.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use quorum_core::{CommConfig, Envelope, MsgKind, PeerId};

use crate::broadcast::{BroadcastRequest, BroadcastWorker};
use crate::inbound::StreamHandler;
use crate::registry::{Inbound, SubscriberRegistry};
use crate::transport::{InboundStream, Transport, TransportError, DISPATCH_PROTOCOL};

/// Lifecycle states. Linear, no re-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Started,
    Stopping,
    Stopped,
}

/// Message distribution layer for one ceremony node.
pub struct Communication {
    config: CommConfig,
    transport: Arc<dyn Transport>,
    registry: SubscriberRegistry,
    queue_tx: mpsc::Sender<BroadcastRequest>,
    // Taken by the broadcast worker on start.
    queue_rx: Mutex<Option<mpsc::Receiver<BroadcastRequest>>>,
    shutdown_tx: broadcast::Sender<()>,
    stopping: Arc<AtomicBool>,
    state: Mutex<Lifecycle>,
    workers: Mutex<Vec<JoinHandle<anyhow::Result<()>>>>,
    streams_handled: Arc<AtomicU64>,
}

impl Communication {
    pub fn new(transport: Arc<dyn Transport>, config: CommConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            transport,
            registry: SubscriberRegistry::new(),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            shutdown_tx,
            stopping: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(Lifecycle::Created),
            workers: Mutex::new(Vec::new()),
            streams_handled: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wire the transport and begin accepting and sending.
    ///
    /// On failure nothing is left running and the instance stays in
    /// `Created`, so a corrected retry is possible.
    pub async fn start(&self, identity_key: &[u8]) -> Result<(), CommError> {
        self.transition(Lifecycle::Created, Lifecycle::Started)?;

        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.inbound_backlog);
        if let Err(e) = self
            .transport
            .start(identity_key, DISPATCH_PROTOCOL, inbound_tx)
            .await
        {
            *self.state.lock().expect("state lock poisoned") = Lifecycle::Created;
            return Err(CommError::Transport(e));
        }

        let handler = StreamHandler::new(
            self.registry.clone(),
            self.stopping.clone(),
            self.config.max_frame_bytes,
        );
        let accept_handle = tokio::spawn(accept_loop(
            inbound_rx,
            handler,
            self.shutdown_tx.subscribe(),
            self.streams_handled.clone(),
        ));

        let queue_rx = self
            .queue_rx
            .lock()
            .expect("queue lock poisoned")
            .take()
            .expect("broadcast queue receiver already taken");
        let worker = BroadcastWorker::new(
            self.transport.clone(),
            queue_rx,
            self.shutdown_tx.subscribe(),
            self.config.connect_timeout,
            self.config.max_frame_bytes,
        );
        let worker_handle = tokio::spawn(worker.run());

        self.workers
            .lock()
            .expect("workers lock poisoned")
            .extend([accept_handle, worker_handle]);

        tracing::info!(peer = %self.transport.local_peer(), "communication started");
        Ok(())
    }

    /// Close the transport, signal shutdown, and wait for every task
    /// spawned by this instance to finish.
    pub async fn stop(&self) -> Result<(), CommError> {
        self.transition(Lifecycle::Started, Lifecycle::Stopping)?;
        self.stopping.store(true, Ordering::SeqCst);

        // Closing first makes inbound acceptance cease and errors out any
        // in-flight transport operation; the workers then drain and exit.
        if let Err(e) = self.transport.close().await {
            tracing::warn!(error = %e, "failed to close transport");
        }
        let _ = self.shutdown_tx.send(());

        let workers = std::mem::take(&mut *self.workers.lock().expect("workers lock poisoned"));
        for handle in workers {
            let _ = handle.await;
        }

        *self.state.lock().expect("state lock poisoned") = Lifecycle::Stopped;
        tracing::info!("communication stopped");
        Ok(())
    }

    /// Enqueue one broadcast. Fire-and-forget: per-peer outcomes are
    /// logged, not reported. Awaits queue capacity when the pipeline is
    /// saturated (explicit backpressure rather than silent drop).
    pub async fn broadcast(&self, peers: Vec<PeerId>, envelope: Envelope) {
        if self.stopping.load(Ordering::SeqCst) {
            tracing::debug!(kind = %envelope.kind, "broadcast after stop, dropping");
            return;
        }
        if self.queue_tx.send(BroadcastRequest { peers, envelope }).await.is_err() {
            tracing::warn!("broadcast queue closed, dropping request");
        }
    }

    /// Register `channel` to receive the inbound messages matching
    /// (`kind`, `msg_id`). Call before expecting a reply — messages
    /// arriving first are dropped, not queued.
    pub fn subscribe(&self, kind: MsgKind, msg_id: &str, channel: mpsc::Sender<Inbound>) {
        self.registry.subscribe(kind, msg_id, channel);
    }

    /// Tear down the subscription for (`kind`, `msg_id`).
    pub fn unsubscribe(&self, kind: MsgKind, msg_id: &str) {
        self.registry.unsubscribe(kind, msg_id);
    }

    /// This node's identity as rendered by the transport.
    pub fn local_peer_id(&self) -> PeerId {
        self.transport.local_peer()
    }

    /// Number of inbound streams accepted so far.
    pub fn streams_handled(&self) -> u64 {
        self.streams_handled.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        *self.state.lock().expect("state lock poisoned")
    }

    fn transition(&self, from: Lifecycle, to: Lifecycle) -> Result<(), CommError> {
        let mut state = self.state.lock().expect("state lock poisoned");
        if *state != from {
            return Err(CommError::Lifecycle {
                current: *state,
                expected: from,
            });
        }
        *state = to;
        Ok(())
    }
}

/// Accept loop: one task per inbound stream, every task tracked so that
/// shutdown can wait for all of them.
async fn accept_loop(
    mut inbound: mpsc::Receiver<InboundStream>,
    handler: StreamHandler,
    mut shutdown: broadcast::Receiver<()>,
    streams_handled: Arc<AtomicU64>,
) -> anyhow::Result<()> {
    let mut stream_tasks: Vec<JoinHandle<()>> = Vec::new();
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("accept loop shutting down");
                break;
            }

            next = inbound.recv() => {
                let stream = match next {
                    Some(s) => s,
                    None => {
                        tracing::info!("transport stopped producing streams, accept loop exiting");
                        break;
                    }
                };
                streams_handled.fetch_add(1, Ordering::SeqCst);
                stream_tasks.retain(|t| !t.is_finished());
                let handler = handler.clone();
                stream_tasks.push(tokio::spawn(async move {
                    handler.handle(stream).await;
                }));
            }
        }
    }

    // Drain in-flight stream handlers before reporting done.
    for task in stream_tasks {
        let _ = task.await;
    }
    Ok(())
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum CommError {
    #[error("communication is {current:?}, expected {expected:?}")]
    Lifecycle {
        current: Lifecycle,
        expected: Lifecycle,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
