//! Transport provider contract.
//!
//! Everything below the message layer — host identity, peer discovery,
//! NAT traversal, encryption, the reliable byte stream between two named
//! peers — lives behind this trait. The communication layer only needs to
//! open a stream to a peer, learn about streams peers open to us, and know
//! who we are.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use quorum_core::PeerId;

/// Stream protocol tag for ceremony message dispatch.
pub const DISPATCH_PROTOCOL: &str = "/quorum/dispatch/1.0";

/// Stream protocol tag for party formation, owned by the coordination
/// layer above this one. Shared here so a host can multiplex both over
/// one transport.
pub const JOIN_PARTY_PROTOCOL: &str = "/quorum/join-party/1.0";

/// A bidirectional byte stream to one peer.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> ByteStream for T {}

/// Boxed stream handed across the transport seam.
pub type PeerStream = Box<dyn ByteStream>;

/// A stream some remote peer opened to this node.
pub struct InboundStream {
    pub from: PeerId,
    pub stream: PeerStream,
}

impl std::fmt::Debug for InboundStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundStream")
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

/// The external collaborator supplying peer connectivity.
///
/// Implementations are shared across tasks as `Arc<dyn Transport>`.
/// `close` must be idempotent; after it, `open_stream` fails and no more
/// inbound streams are produced.
#[async_trait]
pub trait Transport: Send + Sync {
    /// This node's own identity.
    fn local_peer(&self) -> PeerId;

    /// Every peer the transport currently knows how to reach.
    /// Resolves an empty broadcast target set.
    fn reachable_peers(&self) -> Vec<PeerId>;

    /// Wire identity material and register the inbound-stream handler for
    /// one protocol tag. Streams peers open to us with that tag are pushed
    /// into `inbound`. Fails on invalid identity material; on failure the
    /// transport holds no resources.
    async fn start(
        &self,
        identity_key: &[u8],
        protocol: &str,
        inbound: mpsc::Sender<InboundStream>,
    ) -> Result<(), TransportError>;

    /// Open an outbound stream to `peer` for `protocol`.
    async fn open_stream(&self, peer: &PeerId, protocol: &str)
        -> Result<PeerStream, TransportError>;

    /// Tear down all transport resources. Idempotent.
    async fn close(&self) -> Result<(), TransportError>;
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors surfaced across the transport seam.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("peer {0} unreachable")]
    Unreachable(PeerId),

    #[error("connecting to peer {0} timed out")]
    Timeout(PeerId),

    #[error("transport is closed")]
    Closed,

    #[error("invalid identity material: {0}")]
    Config(String),

    #[error("transport i/o: {0}")]
    Io(String),
}
