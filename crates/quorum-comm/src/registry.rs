//! Subscriber registry — routes inbound messages to waiting protocol code.
//!
//! Two-level lookup: message kind → round id → delivery channel. One lock
//! guards the whole structure. Operations are O(map lookup) and contention
//! is low; correctness of delivery matters far more than lock granularity
//! here, so the lock is deliberately coarse.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;

use quorum_core::{MsgKind, PeerId};

/// A message delivered to a subscriber.
///
/// `bytes` is the still-serialized envelope as read off the wire; decoding
/// it further is the subscriber's business. Ownership transfers to the
/// receiver on delivery.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub from: PeerId,
    pub bytes: Bytes,
}

type IdMap = HashMap<String, mpsc::Sender<Inbound>>;

/// Registry of delivery channels keyed by (kind, msg_id).
///
/// At most one channel is registered per key; subscribing again for the
/// same key replaces the previous registration. Cheap to clone — clones
/// share the same underlying map.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<Mutex<HashMap<MsgKind, IdMap>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `channel` to receive inbound messages matching
    /// (`kind`, `msg_id`). Replaces any prior registration for the key.
    pub fn subscribe(&self, kind: MsgKind, msg_id: &str, channel: mpsc::Sender<Inbound>) {
        let mut topics = self.inner.lock().expect("registry lock poisoned");
        let ids = topics.entry(kind).or_default();
        if ids.insert(msg_id.to_string(), channel).is_some() {
            tracing::warn!(%kind, msg_id, "replacing existing subscription");
        }
    }

    /// The channel registered for (`kind`, `msg_id`), if any.
    ///
    /// Absence is not an error — a message arriving for an id nobody is
    /// waiting on is an expected race (e.g. a late arrival after the round
    /// was torn down).
    pub fn lookup(&self, kind: MsgKind, msg_id: &str) -> Option<mpsc::Sender<Inbound>> {
        let topics = self.inner.lock().expect("registry lock poisoned");
        topics.get(&kind).and_then(|ids| ids.get(msg_id)).cloned()
    }

    /// Remove the registration for (`kind`, `msg_id`). A no-op if none
    /// exists. Topics whose id map becomes empty are removed outright so
    /// the registry stays bounded over many rounds.
    pub fn unsubscribe(&self, kind: MsgKind, msg_id: &str) {
        let mut topics = self.inner.lock().expect("registry lock poisoned");
        let Some(ids) = topics.get_mut(&kind) else {
            tracing::debug!(%kind, msg_id, "unsubscribe for unknown topic");
            return;
        };
        ids.remove(msg_id);
        if ids.is_empty() {
            topics.remove(&kind);
        }
    }

    /// True when no subscription is registered at all.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("registry lock poisoned").is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
