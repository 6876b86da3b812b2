//! quorum-comm — peer-to-peer message distribution for threshold-signature
//! ceremonies.
//!
//! Protocol code subscribes for the replies it expects, keyed by
//! (message kind, round id), and broadcasts payloads to a chosen peer set.
//! Inbound streams are read one frame at a time and routed to whichever
//! subscriber is waiting; messages nobody is waiting for are dropped.
//! The transport itself — identity, discovery, stream establishment — is
//! an external collaborator behind the [`Transport`] trait.

pub mod broadcast;
pub mod comm;
pub mod inbound;
pub mod memory;
pub mod registry;
pub mod transport;

pub use comm::{CommError, Communication, Lifecycle};
pub use memory::{MemoryHub, MemoryTransport};
pub use registry::{Inbound, SubscriberRegistry};
pub use transport::{InboundStream, PeerStream, Transport, TransportError, DISPATCH_PROTOCOL};
