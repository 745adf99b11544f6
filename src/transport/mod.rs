//! Transport: the single duplex channel to the front-end peer.
//!
//! The channel opens lazily on first use and is shared by every caller in the process.
//! Outgoing messages are serialized under one writer lock so frames never interleave, and a
//! single background task decodes incoming messages and hands them to the inbound handler.
//!
//! ## Faults
//!
//! Any I/O failure is recorded as a [`ConnectionFault`] and is sticky: the state machine moves to
//! `Faulted`, both streams are torn down, and every later [`Transport::open`] or
//! [`Transport::send`] returns the same fault without touching the medium again.
//!
//! ```rust,no_run
//! use cellwire::transport::{PipeConnector, Transport};
//! use cellwire::{OutgoingMessage, ValuePush, WireValue};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), cellwire::ConnectionFault> {
//! let transport = Transport::new(Arc::new(PipeConnector::new("/tmp/to_peer", "/tmp/from_peer")));
//! transport
//!     .send(&OutgoingMessage::Value(ValuePush::new("/counter", WireValue::Int(1))))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod connector;

pub use connector::{BoxReader, BoxWriter, Connector, DuplexConnector, DuplexPeer, PipeConnector};

use async_trait::async_trait;
use std::io;
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::io::{AsyncWriteExt, BufReader};

use crate::config::CommsConfig;
use crate::core::latch::Latch;
use crate::core::message::{IncomingMessage, OutgoingMessage};
use crate::error::ConnectionFault;

/// Receives every message decoded by the read loop.
pub trait InboundHandler: Send + Sync {
    fn on_message(&self, message: IncomingMessage);
}

/// Where the registry sends control and value messages.
///
/// [`Transport`] is the production implementation; tests substitute recorders.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Open the connection if needed. Returns the sticky fault, if any.
    async fn open(&self) -> Result<(), ConnectionFault>;

    /// Send one message, opening lazily.
    async fn send(&self, message: &OutgoingMessage) -> Result<(), ConnectionFault>;

    /// Current sticky fault, if any.
    fn error(&self) -> Option<ConnectionFault>;
}

#[derive(Debug, Clone)]
enum LinkState {
    Unopened,
    Open,
    Faulted(ConnectionFault),
}

/// State shared between the transport and its read loop
struct Shared {
    state: Mutex<LinkState>,
    writer: tokio::sync::Mutex<Option<BoxWriter>>,
    teardown: Latch,
    handler: RwLock<Option<Weak<dyn InboundHandler>>>,
}

impl Shared {
    fn state(&self) -> LinkState {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn fault(&self) -> Option<ConnectionFault> {
        match self.state() {
            LinkState::Faulted(fault) => Some(fault),
            _ => None,
        }
    }

    fn mark_open(&self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if matches!(*state, LinkState::Unopened) {
            *state = LinkState::Open;
        }
    }

    /// Record `fault` unless one is already recorded, and tear down both streams.
    /// Returns the fault that is now sticky.
    fn record_fault(&self, fault: ConnectionFault) -> ConnectionFault {
        let sticky = {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            match &*state {
                LinkState::Faulted(existing) => existing.clone(),
                _ => {
                    log::error!("Transport faulted: {}", fault);
                    *state = LinkState::Faulted(fault.clone());
                    fault
                }
            }
        };

        self.teardown.trigger();
        // A sender holding the lock notices the fault itself and drops the writer
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
        sticky
    }

    fn deliver(&self, message: IncomingMessage) {
        let handler = match self.handler.read() {
            Ok(handler) => handler.as_ref().and_then(Weak::upgrade),
            Err(_) => None,
        };
        match handler {
            Some(handler) => handler.on_message(message),
            None => log::debug!("No inbound handler registered, dropping message"),
        }
    }
}

/// The process-wide duplex connection to the peer.
pub struct Transport {
    connector: Arc<dyn Connector>,
    max_frame_len: usize,
    shared: Arc<Shared>,
}

impl Transport {
    /// Create an unopened transport over `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            max_frame_len: codec::DEFAULT_MAX_FRAME_LEN,
            shared: Arc::new(Shared {
                state: Mutex::new(LinkState::Unopened),
                writer: tokio::sync::Mutex::new(None),
                teardown: Latch::new(),
                handler: RwLock::new(None),
            }),
        }
    }

    /// Create a transport over the named pipes in `config`.
    pub fn from_config(config: &CommsConfig) -> Self {
        Self::new(Arc::new(PipeConnector::from_config(config)))
            .with_max_frame_len(config.max_frame_len)
    }

    /// Limit the size of a single incoming frame.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Register the receiver of decoded incoming messages.
    ///
    /// Held weakly so the handler can own this transport without a cycle.
    pub fn set_inbound_handler(&self, handler: Weak<dyn InboundHandler>) {
        match self.shared.handler.write() {
            Ok(mut slot) => *slot = Some(handler),
            Err(poisoned) => *poisoned.into_inner() = Some(handler),
        }
    }

    /// Open both streams if not already open.
    ///
    /// Idempotent. A previous fault is returned as-is without retrying the medium.
    pub async fn open(&self) -> Result<(), ConnectionFault> {
        let mut writer = self.shared.writer.lock().await;
        self.open_locked(&mut *writer).await
    }

    async fn open_locked(&self, writer: &mut Option<BoxWriter>) -> Result<(), ConnectionFault> {
        match self.shared.state() {
            LinkState::Faulted(fault) => return Err(fault),
            LinkState::Open => return Ok(()),
            LinkState::Unopened => {}
        }

        let opened_writer = match self.connector.open_writer().await {
            Ok(opened) => opened,
            Err(e) => return Err(self.shared.record_fault(ConnectionFault::from(&e))),
        };
        let reader = match self.connector.open_reader().await {
            Ok(reader) => reader,
            Err(e) => {
                // Half a connection is no connection
                drop(opened_writer);
                return Err(self.shared.record_fault(ConnectionFault::from(&e)));
            }
        };

        *writer = Some(opened_writer);
        self.shared.mark_open();
        log::debug!("Transport opened, starting read loop");

        tokio::spawn(Self::read_loop(
            self.shared.clone(),
            BufReader::new(reader),
            self.max_frame_len,
        ));
        Ok(())
    }

    /// Serialize and flush one message.
    ///
    /// On I/O failure the fault becomes sticky and the message is dropped.
    pub async fn send(&self, message: &OutgoingMessage) -> Result<(), ConnectionFault> {
        let mut guard = self.shared.writer.lock().await;
        self.open_locked(&mut *guard).await?;

        // The read loop may have faulted since the connection opened
        if let Some(fault) = self.shared.fault() {
            guard.take();
            return Err(fault);
        }

        let frame = codec::encode_frame(message).map_err(|e| {
            log::error!("Failed to encode {}: {}", message.describe(), e);
            ConnectionFault::new(io::ErrorKind::InvalidData, e.to_string())
        })?;

        let writer = guard.as_mut().ok_or_else(|| {
            ConnectionFault::new(io::ErrorKind::NotConnected, "writer not available")
        })?;

        let result = tokio::select! {
            result = async {
                writer.write_all(&frame).await?;
                writer.flush().await
            } => result,
            _ = self.shared.teardown.wait() => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "transport torn down during write",
            )),
        };

        match result {
            Ok(()) => {
                log::trace!("Sent {}", message.describe());
                Ok(())
            }
            Err(e) => {
                guard.take();
                drop(guard);
                log::warn!("Dropping {} after write failure", message.describe());
                Err(self.shared.record_fault(ConnectionFault::from(&e)))
            }
        }
    }

    /// Current sticky fault, if any. Cheap enough to call before any blocking operation.
    pub fn error(&self) -> Option<ConnectionFault> {
        self.shared.fault()
    }

    /// True once both streams are open and no fault has been recorded.
    pub fn is_open(&self) -> bool {
        matches!(self.shared.state(), LinkState::Open)
    }

    async fn read_loop(
        shared: Arc<Shared>,
        mut reader: BufReader<BoxReader>,
        max_frame_len: usize,
    ) {
        loop {
            let frame = tokio::select! {
                _ = shared.teardown.wait() => {
                    log::debug!("Transport torn down, stopping read loop");
                    break;
                }
                frame = codec::read_frame::<_, IncomingMessage>(&mut reader, max_frame_len) => frame,
            };

            match frame {
                Ok(Some(message)) => shared.deliver(message),
                Ok(None) => {
                    log::debug!("EOF reached, terminating read loop");
                    break;
                }
                Err(e) if e.is_closed() => {
                    log::debug!("Peer closed the stream: {}", e);
                    break;
                }
                Err(e) => {
                    shared.record_fault(ConnectionFault::from(e));
                    break;
                }
            }
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        // Stops the read loop; the state is left alone
        self.shared.teardown.trigger();
    }
}

#[async_trait]
impl Outbox for Transport {
    async fn open(&self) -> Result<(), ConnectionFault> {
        Transport::open(self).await
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), ConnectionFault> {
        Transport::send(self, message).await
    }

    fn error(&self) -> Option<ConnectionFault> {
        Transport::error(self)
    }
}
