//! Inbound stream handling.
//!
//! Each stream a remote peer opens carries exactly one framed message.
//! The handler reads that frame, parses the envelope, and forwards the raw
//! frame to whichever subscriber registered for (kind, msg_id). Every
//! failure here is logged and swallowed — a bad message from one peer must
//! never disturb the rest of the node.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use quorum_core::wire::read_frame;
use quorum_core::Envelope;

use crate::registry::{Inbound, SubscriberRegistry};
use crate::transport::InboundStream;

/// Per-stream message router. Cheap to clone; one instance is shared by
/// all stream tasks of a node.
#[derive(Clone)]
pub(crate) struct StreamHandler {
    registry: SubscriberRegistry,
    stopping: Arc<AtomicBool>,
    max_frame: usize,
}

impl StreamHandler {
    pub(crate) fn new(
        registry: SubscriberRegistry,
        stopping: Arc<AtomicBool>,
        max_frame: usize,
    ) -> Self {
        Self {
            registry,
            stopping,
            max_frame,
        }
    }

    /// Handle one inbound stream to completion. The stream is closed on
    /// return by dropping it.
    pub(crate) async fn handle(&self, inbound: InboundStream) {
        let InboundStream { from, mut stream } = inbound;

        // Don't start work that teardown would have to wait out.
        if self.stopping.load(Ordering::SeqCst) {
            tracing::debug!(peer = %from, "shutting down, dropping inbound stream");
            return;
        }

        let frame = match read_frame(&mut stream, self.max_frame).await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, peer = %from, "failed to read inbound frame");
                return;
            }
        };

        let envelope = match Envelope::from_bytes(&frame) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, peer = %from, "failed to parse envelope");
                return;
            }
        };

        let Some(channel) = self.registry.lookup(envelope.kind, &envelope.msg_id) else {
            tracing::info!(
                kind = %envelope.kind,
                msg_id = %envelope.msg_id,
                peer = %from,
                "no subscriber for message, dropping"
            );
            return;
        };

        let message = Inbound {
            from: from.clone(),
            bytes: Bytes::from(frame),
        };
        if channel.send(message).await.is_err() {
            tracing::debug!(
                kind = %envelope.kind,
                msg_id = %envelope.msg_id,
                "subscriber receiver dropped before delivery"
            );
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
