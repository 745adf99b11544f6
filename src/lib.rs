//! cellwire - address-routed value notifications between a cell process and its front-end
//!
//! A long-running process exchanges small typed values with a front-end over two byte streams
//! (usually named pipes). Values are routed by address: the process subscribes to addresses,
//! the front-end pushes values to them, and the process pushes values back.
//!
//! ## Main components
//!
//! - [`transport`]: the single lazily-opened duplex connection with sticky faults
//! - [`core::registry`]: address to subscriber table, control messages and fan-out dispatch
//! - [`core::coerce`]: conversion of decoded values into each subscriber's declared type
//! - [`core::channel`]: safe-close [`Listener`] bridging callbacks into pull-style consumption
//! - [`comms`]: the consumer-facing [`Comms`] handle
//!
//! ```rust,no_run
//! use cellwire::Comms;
//!
//! # async fn demo() -> cellwire::CommsResult<()> {
//! let comms = Comms::from_env()?;
//! comms.send("/slider/value", 42i64).await?;
//!
//! let mut clicks = comms.listen::<i64>("/button/clicks").await?;
//! while let Some(count) = clicks.recv().await {
//!     println!("clicked {} times", count);
//! }
//! # Ok(())
//! # }
//! ```

pub mod comms;
pub mod config;
pub mod core;
pub mod error;
pub mod transport;

// Public API
pub use comms::Comms;
pub use config::CommsConfig;
pub use crate::core::{
    unique_address, DisplayPayload, IncomingMessage, Latch, Listener, ListenerCloser,
    OutgoingMessage, Registry, SubscriptionControl, SubscriptionId, ValueKind, ValuePush,
    WireType, WireValue,
};
pub use error::{CoercionError, CommsError, CommsResult, ConfigError, ConnectionFault, FrameError};
pub use transport::{Connector, DuplexConnector, DuplexPeer, PipeConnector, Transport};
