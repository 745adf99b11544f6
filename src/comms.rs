//! Consumer-facing API used by widget and display code.

use std::sync::Arc;
use std::time::Duration;

use crate::config::CommsConfig;
use crate::core::channel::Listener;
use crate::core::coerce::WireType;
use crate::core::message::{DisplayPayload, OutgoingMessage, ValuePush};
use crate::core::registry::{Registry, SubscriptionId};
use crate::error::{CommsError, CommsResult, ConnectionFault};
use crate::transport::{Connector, InboundHandler, Transport};

/// One connection to the front-end plus its subscription registry.
///
/// Create one per process and share it by reference or by cloning.
#[derive(Clone)]
pub struct Comms {
    transport: Arc<Transport>,
    registry: Arc<Registry>,
}

impl Comms {
    /// Wire a registry onto `transport` so incoming values reach subscribers.
    pub fn new(transport: Arc<Transport>) -> Self {
        let registry = Arc::new(Registry::new(transport.clone()));
        let handler: Arc<dyn InboundHandler> = registry.clone();
        transport.set_inbound_handler(Arc::downgrade(&handler));
        Self {
            transport,
            registry,
        }
    }

    /// Connect through any medium.
    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self::new(Arc::new(Transport::new(connector)))
    }

    /// Connect through the named pipes in `config`. Nothing is opened until first use.
    pub fn from_config(config: &CommsConfig) -> Self {
        Self::new(Arc::new(Transport::from_config(config)))
    }

    /// Connect through the named pipes given by the process environment.
    pub fn from_env() -> CommsResult<Self> {
        let config = CommsConfig::from_env()?;
        Ok(Self::from_config(&config))
    }

    /// Push `value` to the peer at `address`.
    ///
    /// NaN and infinities cannot be encoded; such values are rejected before anything is written.
    pub async fn send<T: WireType>(&self, address: impl Into<String>, value: T) -> CommsResult<()> {
        let address = address.into();
        let value = value.into_wire();
        if let Some(bad) = value.non_finite() {
            return Err(CommsError::NonFinite {
                address,
                value: bad,
            });
        }
        let message = OutgoingMessage::Value(ValuePush::new(address, value));
        self.transport.send(&message).await?;
        Ok(())
    }

    /// Ask the peer for the current value at `address` and wait for the first one to arrive.
    ///
    /// There is no built-in timeout; see [`Comms::request_and_wait_timeout`].
    pub async fn request_and_wait_once<T: WireType>(
        &self,
        address: impl Into<String>,
    ) -> CommsResult<T> {
        let address = address.into();
        if let Some(fault) = self.transport.error() {
            return Err(fault.into());
        }

        let mut listener = Listener::<T>::open(&self.registry, address.clone()).await?;
        let request = OutgoingMessage::Value(ValuePush::request(address));
        self.transport.send(&request).await?;

        let value = listener.recv().await;
        listener.close();
        value.ok_or(CommsError::ListenerClosed)
    }

    /// [`Comms::request_and_wait_once`] bounded by `limit`.
    pub async fn request_and_wait_timeout<T: WireType>(
        &self,
        address: impl Into<String>,
        limit: Duration,
    ) -> CommsResult<T> {
        match tokio::time::timeout(limit, self.request_and_wait_once(address)).await {
            Ok(result) => result,
            Err(_) => Err(CommsError::Timeout),
        }
    }

    /// Call `callback` with every value arriving at `address`.
    pub async fn subscribe<T, F>(
        &self,
        address: impl Into<String>,
        callback: F,
    ) -> CommsResult<SubscriptionId>
    where
        T: WireType,
        F: Fn(&str, T) + Send + Sync + 'static,
    {
        self.registry.subscribe(address, callback).await
    }

    /// Cancel a subscription. Unknown ids are ignored.
    pub async fn unsubscribe(&self, id: SubscriptionId) {
        self.registry.unsubscribe(id).await;
    }

    /// Receive the values arriving at `address` through a [`Listener`].
    pub async fn listen<T: WireType>(&self, address: impl Into<String>) -> CommsResult<Listener<T>> {
        Listener::open(&self.registry, address).await
    }

    /// Pass rich display content through to the peer.
    pub async fn display(&self, payload: DisplayPayload) -> CommsResult<()> {
        self.transport.send(&OutgoingMessage::Display(payload)).await?;
        Ok(())
    }

    /// Sticky connection fault, if any. Check before blocking on the peer.
    pub fn error(&self) -> Option<ConnectionFault> {
        self.transport.error()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }
}
