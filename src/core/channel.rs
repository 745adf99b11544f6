//! Safe-close delivery channel.
//!
//! Bridges the registry's push-style callbacks into a pull-style [`Listener`] that can be
//! closed at any time from either side. The subscription callback never blocks: it offers each
//! value to a one-slot channel, and if that offer fails it trips the close latch. A waiter task
//! owns the unsubscribe, so it happens exactly once whoever closes first.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::core::coerce::{coerce_or_default, WireType};
use crate::core::latch::Latch;
use crate::core::registry::{RawCallback, Registry, SubscriptionId};
use crate::core::value::WireValue;
use crate::error::CommsResult;

/// Pull-style consumer of the values arriving at one address.
///
/// A value arriving while the previous one has not been taken closes the listener, so a consumer
/// that stops pulling does not keep the address subscribed. Dropping a listener closes it.
pub struct Listener<T> {
    address: String,
    id: SubscriptionId,
    receiver: mpsc::Receiver<T>,
    closer: ListenerCloser,
}

/// Closes a [`Listener`] from anywhere. Cheap to clone.
#[derive(Clone)]
pub struct ListenerCloser {
    latch: Arc<Latch>,
}

impl ListenerCloser {
    /// Stop delivery and unsubscribe. Returns `true` for the call that closed it.
    pub fn close(&self) -> bool {
        self.latch.trigger()
    }

    pub fn is_closed(&self) -> bool {
        self.latch.is_set()
    }

    /// Wait until the listener is closed by any party.
    pub async fn wait_close(&self) {
        self.latch.wait().await
    }
}

impl<T: WireType> Listener<T> {
    /// Subscribe to `address` and return a listener receiving its values.
    pub async fn open(registry: &Arc<Registry>, address: impl Into<String>) -> CommsResult<Self> {
        let address = address.into();
        let latch = Arc::new(Latch::new());
        let (sender, receiver) = mpsc::channel::<T>(1);

        let callback = relay_callback(sender, latch.clone());
        let id = registry.subscribe_raw(address.clone(), callback).await?;

        let waiter_registry = registry.clone();
        let waiter_latch = latch.clone();
        tokio::spawn(async move {
            waiter_latch.wait().await;
            waiter_registry.unsubscribe(id).await;
        });

        Ok(Self {
            address,
            id,
            receiver,
            closer: ListenerCloser { latch },
        })
    }

    /// Receive the next value.
    ///
    /// Once the listener is closed, returns the value still waiting in the slot if there is one,
    /// then `None`.
    pub async fn recv(&mut self) -> Option<T> {
        if self.closer.is_closed() {
            return self.receiver.try_recv().ok();
        }
        tokio::select! {
            biased;
            value = self.receiver.recv() => value,
            _ = self.closer.latch.wait() => self.receiver.try_recv().ok(),
        }
    }

    /// Receive a value if one is ready.
    pub fn try_recv(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}

impl<T> Listener<T> {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Close the listener; idempotent.
    pub fn close(&self) -> bool {
        self.closer.close()
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    /// Wait until the listener is closed by any party.
    pub async fn wait_close(&self) {
        self.closer.wait_close().await
    }

    /// A handle that can close this listener from another task.
    pub fn closer(&self) -> ListenerCloser {
        self.closer.clone()
    }
}

impl<T> Drop for Listener<T> {
    fn drop(&mut self) {
        if self.closer.close() {
            log::debug!("Listener for {:?} dropped without close", self.address);
        }
    }
}

/// Subscription callback feeding a listener without ever blocking the dispatcher.
fn relay_callback<T: WireType>(sender: mpsc::Sender<T>, latch: Arc<Latch>) -> RawCallback {
    Arc::new(move |address: &str, value: WireValue| {
        if latch.is_set() {
            return;
        }
        let typed = coerce_or_default::<T>(address, value);
        match sender.try_send(typed) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::warn!("Listener for {:?} is not keeping up, closing it", address);
                latch.trigger();
            }
            Err(TrySendError::Closed(_)) => {
                // The consumer is gone; the waiter unsubscribes
                latch.trigger();
            }
        }
    })
}
