//! quorum-core — shared types, wire format, and configuration.
//! All other quorum crates depend on this one.

pub mod config;
pub mod envelope;
pub mod peer;
pub mod wire;

pub use config::CommConfig;
pub use envelope::{Envelope, MsgKind};
pub use peer::PeerId;
