//! In-memory transport — a process-local overlay of named peers.
//!
//! Backs the integration tests and local multi-party simulation. Streams
//! are `tokio::io::duplex` pipes; identity is derived from the node's key
//! material. `disconnect` simulates an unreachable peer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use quorum_core::PeerId;

use crate::transport::{InboundStream, PeerStream, Transport, TransportError};

/// Internal buffer of one duplex stream. Writers of frames larger than
/// this block until the reader drains.
const STREAM_BUFFER: usize = 64 * 1024;

/// Shared overlay state: who is reachable, and which inbound handler is
/// registered for each (peer, protocol) pair.
pub struct MemoryHub {
    members: DashMap<PeerId, ()>,
    handlers: DashMap<(PeerId, String), mpsc::Sender<InboundStream>>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            members: DashMap::new(),
            handlers: DashMap::new(),
        })
    }

    /// All currently reachable peers, in no particular order.
    pub fn peers(&self) -> Vec<PeerId> {
        self.members.iter().map(|e| e.key().clone()).collect()
    }

    /// Make `peer` unreachable: later `open_stream` calls toward it fail.
    pub fn disconnect(&self, peer: &PeerId) {
        self.members.remove(peer);
        self.handlers.retain(|(p, _), _| p != peer);
    }
}

/// One node's handle onto a [`MemoryHub`].
pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
    id: PeerId,
    identity_key: Vec<u8>,
    closed: AtomicBool,
}

impl MemoryTransport {
    /// Identity is fixed at construction: the hex rendering of the key
    /// material this node will present to `start`.
    pub fn new(hub: Arc<MemoryHub>, identity_key: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            hub,
            id: PeerId::new(hex::encode(identity_key)),
            identity_key: identity_key.to_vec(),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_peer(&self) -> PeerId {
        self.id.clone()
    }

    fn reachable_peers(&self) -> Vec<PeerId> {
        self.hub.peers()
    }

    async fn start(
        &self,
        identity_key: &[u8],
        protocol: &str,
        inbound: mpsc::Sender<InboundStream>,
    ) -> Result<(), TransportError> {
        if identity_key.is_empty() {
            return Err(TransportError::Config("empty identity key".into()));
        }
        if identity_key != self.identity_key {
            return Err(TransportError::Config(
                "identity key does not match transport identity".into(),
            ));
        }
        self.hub
            .handlers
            .insert((self.id.clone(), protocol.to_string()), inbound);
        self.hub.members.insert(self.id.clone(), ());
        tracing::debug!(peer = %self.id, protocol, "memory transport started");
        Ok(())
    }

    async fn open_stream(
        &self,
        peer: &PeerId,
        protocol: &str,
    ) -> Result<PeerStream, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        // Clone the sender out so no map guard is held across the await.
        let handler = self
            .hub
            .handlers
            .get(&(peer.clone(), protocol.to_string()))
            .map(|e| e.value().clone())
            .ok_or_else(|| TransportError::Unreachable(peer.clone()))?;

        let (local, remote) = tokio::io::duplex(STREAM_BUFFER);
        handler
            .send(InboundStream {
                from: self.id.clone(),
                stream: Box::new(remote),
            })
            .await
            .map_err(|_| TransportError::Unreachable(peer.clone()))?;
        Ok(Box::new(local))
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.hub.disconnect(&self.id);
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
