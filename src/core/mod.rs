//! Core module for address-routed value notifications
//!
//! This module provides the pub/sub dispatch core: typed wire values and their coercion,
//! the subscription registry, and the safe-close listener channel. The transport that carries
//! messages to the peer lives in [`crate::transport`].

pub mod address;
pub mod channel;
pub mod coerce;
pub mod latch;
pub mod message;
pub mod registry;
pub mod value;

// Re-exports for convenience
pub use address::unique_address;
pub use channel::{Listener, ListenerCloser};
pub use coerce::WireType;
pub use latch::Latch;
pub use message::{DisplayPayload, IncomingMessage, OutgoingMessage, SubscriptionControl, ValuePush};
pub use registry::{RawCallback, Registry, SubscriptionId};
pub use value::{ValueKind, WireValue};
