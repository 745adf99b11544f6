//! Address-keyed subscription registry.
//!
//! The registry maps each address to the ordered list of its subscribers. The first subscriber
//! of an address makes the registry ask the peer to start pushing updates for it; the last one
//! leaving asks the peer to stop. Incoming values are fanned out to every subscriber of their
//! address, each callback running as its own job on the blocking pool so that a slow subscriber
//! never holds up the others.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::coerce::{coerce_or_default, WireType};
use crate::core::message::{IncomingMessage, OutgoingMessage, SubscriptionControl, ValuePush};
use crate::core::value::WireValue;
use crate::error::{CommsResult, ConnectionFault};
use crate::transport::{InboundHandler, Outbox};

/// Identifies one subscription. Ids increase monotonically and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type-erased subscriber: receives the address and the raw value, coerces it itself.
pub type RawCallback = Arc<dyn Fn(&str, WireValue) + Send + Sync>;

struct SubscriptionRecord {
    id: SubscriptionId,
    callback: RawCallback,
}

#[derive(Default)]
struct RegistryState {
    /// Indexed by id; only ever grows
    id_to_address: Vec<String>,
    /// No entry for an address without subscribers
    subscribers: HashMap<String, Vec<SubscriptionRecord>>,
    /// Addresses with a control message on its way to the peer
    announcing: HashSet<String>,
}

/// The process-wide subscription table.
pub struct Registry {
    outbox: Arc<dyn Outbox>,
    state: Mutex<RegistryState>,
}

impl Registry {
    /// Create an empty registry that sends control messages through `outbox`.
    pub fn new(outbox: Arc<dyn Outbox>) -> Self {
        Self {
            outbox,
            state: Mutex::new(RegistryState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Subscribe `callback` to values arriving at `address`.
    ///
    /// Values are coerced into `T`; when coercion fails the callback receives `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns the transport's sticky fault if the connection cannot be opened; nothing is
    /// recorded in that case. A failure to send the subscribe-control message is only logged.
    pub async fn subscribe<T, F>(
        &self,
        address: impl Into<String>,
        callback: F,
    ) -> CommsResult<SubscriptionId>
    where
        T: WireType,
        F: Fn(&str, T) + Send + Sync + 'static,
    {
        let callback: RawCallback = Arc::new(move |address: &str, value: WireValue| {
            let typed = coerce_or_default::<T>(address, value);
            callback(address, typed);
        });
        self.subscribe_raw(address, callback).await
    }

    /// Subscribe an already type-erased callback.
    pub async fn subscribe_raw(
        &self,
        address: impl Into<String>,
        callback: RawCallback,
    ) -> CommsResult<SubscriptionId> {
        let address = address.into();
        self.outbox.open().await?;

        let (id, announce) = {
            let mut state = self.lock();
            let id = SubscriptionId(state.id_to_address.len() as u64);
            state.id_to_address.push(address.clone());
            let list = state.subscribers.entry(address.clone()).or_default();
            list.push(SubscriptionRecord { id, callback });
            let first = list.len() == 1;
            (id, first && state.announcing.insert(address.clone()))
        };
        log::debug!("Subscribed {} to {:?}", id, address);

        if announce {
            self.announce(address, true).await;
        }
        Ok(id)
    }

    /// Remove a subscription. Unknown or already-removed ids are ignored.
    ///
    /// Returns `true` if a subscription was removed.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let (address, announce) = {
            let mut state = self.lock();
            let address = match state.id_to_address.get(id.0 as usize) {
                Some(address) => address.clone(),
                None => return false,
            };
            let list = match state.subscribers.get_mut(&address) {
                Some(list) => list,
                None => return false,
            };
            let position = match list.iter().position(|record| record.id == id) {
                Some(position) => position,
                None => return false,
            };
            list.remove(position);
            let emptied = list.is_empty();
            if emptied {
                state.subscribers.remove(&address);
            }
            let announce = emptied && state.announcing.insert(address.clone());
            (address, announce)
        };
        log::debug!("Unsubscribed {} from {:?}", id, address);

        if announce {
            self.announce(address, false).await;
        }
        true
    }

    /// Tell the peer whether `address` has subscribers, then catch up with any transitions that
    /// happened while the message was in flight.
    ///
    /// Only one caller announces a given address at a time; the others leave their transition to
    /// it. No lock is held while sending.
    async fn announce(&self, address: String, mut subscribed: bool) {
        loop {
            let control = if subscribed {
                SubscriptionControl::subscribe(address.clone())
            } else {
                SubscriptionControl::unsubscribe(address.clone())
            };
            self.send_control(control).await;

            let current = {
                let mut state = self.lock();
                let current = state.subscribers.contains_key(&address);
                if current == subscribed {
                    state.announcing.remove(&address);
                }
                current
            };
            if current == subscribed {
                return;
            }
            subscribed = current;
        }
    }

    async fn send_control(&self, control: SubscriptionControl) {
        let message = OutgoingMessage::Subscription(control);
        if let Err(e) = self.outbox.send(&message).await {
            log::debug!("Could not send {}: {}", message.describe(), e);
        }
    }

    /// Deliver an incoming value to every subscriber of its address.
    ///
    /// Returns the number of callbacks scheduled. Callbacks run concurrently and are not awaited.
    pub fn dispatch(&self, message: ValuePush) -> usize {
        if message.is_request {
            log::warn!(
                "Dropping request for {:?} received from peer: requests only flow outwards",
                message.address
            );
            return 0;
        }
        let value = match message.value {
            Some(value) => value,
            None => {
                log::warn!("Dropping value push for {:?} without a value", message.address);
                return 0;
            }
        };

        let callbacks: Vec<RawCallback> = {
            let state = self.lock();
            match state.subscribers.get(&message.address) {
                Some(list) => list.iter().map(|record| record.callback.clone()).collect(),
                None => return 0,
            }
        };

        log::trace!(
            "Dispatching {} to {} subscribers of {:?}",
            value.kind(),
            callbacks.len(),
            message.address
        );
        let runtime = tokio::runtime::Handle::try_current();
        for callback in &callbacks {
            let callback = callback.clone();
            let address = message.address.clone();
            let value = value.clone();
            match &runtime {
                Ok(handle) => {
                    handle.spawn_blocking(move || callback(&address, value));
                }
                Err(_) => callback(&address, value),
            }
        }
        callbacks.len()
    }

    /// Number of live subscribers of `address`.
    pub fn subscriber_count(&self, address: &str) -> usize {
        self.lock().subscribers.get(address).map_or(0, Vec::len)
    }

    /// Current sticky fault of the underlying connection, if any.
    pub fn error(&self) -> Option<ConnectionFault> {
        self.outbox.error()
    }

    pub fn outbox(&self) -> &Arc<dyn Outbox> {
        &self.outbox
    }
}

impl InboundHandler for Registry {
    fn on_message(&self, message: IncomingMessage) {
        match message {
            IncomingMessage::Value(push) => {
                self.dispatch(push);
            }
        }
    }
}
