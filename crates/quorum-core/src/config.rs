//! Configuration for the communication layer.
//!
//! A plain value struct handed to `Communication::new` — the host process
//! owns file/flag handling and maps whatever it reads onto this.

use std::time::Duration;

/// Tunables for dispatch and broadcast.
#[derive(Debug, Clone)]
pub struct CommConfig {
    /// Capacity of the outbound broadcast queue. Producers await free
    /// space when the queue is full (backpressure, not drop).
    pub queue_capacity: usize,

    /// Upper bound on establishing one outbound stream to a peer.
    pub connect_timeout: Duration,

    /// Plausibility cap on a frame's declared payload length.
    /// Frames claiming more are rejected before allocation.
    pub max_frame_bytes: usize,

    /// Backlog of accepted-but-not-yet-handled inbound streams.
    pub inbound_backlog: usize,
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            connect_timeout: Duration::from_secs(60),
            max_frame_bytes: 8 * 1024 * 1024,
            inbound_backlog: 64,
        }
    }
}
