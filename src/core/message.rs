//! Message types exchanged with the front-end peer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::value::WireValue;

/// A value pushed to or from an address.
///
/// `is_request` is only legal when sending: it asks the peer to push the current value of
/// `address` back, and carries no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePush {
    pub address: String,
    #[serde(default)]
    pub is_request: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<WireValue>,
}

impl ValuePush {
    /// Create a push carrying a value.
    pub fn new(address: impl Into<String>, value: WireValue) -> Self {
        Self {
            address: address.into(),
            is_request: false,
            value: Some(value),
        }
    }

    /// Create a read request for `address`.
    pub fn request(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            is_request: true,
            value: None,
        }
    }
}

/// Tells the peer to start or stop pushing updates for an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionControl {
    pub address: String,
    #[serde(default)]
    pub unsubscribe: bool,
}

impl SubscriptionControl {
    pub fn subscribe(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            unsubscribe: false,
        }
    }

    pub fn unsubscribe(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            unsubscribe: true,
        }
    }
}

/// Rich display content, keyed by MIME type.
///
/// The content itself is produced by display code outside this crate and passed through as-is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayPayload {
    pub data: BTreeMap<String, String>,
    /// Identifies an earlier output to update in place
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_id: Option<String>,
}

impl DisplayPayload {
    pub fn new(mime_type: impl Into<String>, content: impl Into<String>) -> Self {
        let mut data = BTreeMap::new();
        data.insert(mime_type.into(), content.into());
        Self {
            data,
            display_id: None,
        }
    }

    pub fn with_display_id(mut self, display_id: impl Into<String>) -> Self {
        self.display_id = Some(display_id.into());
        self
    }
}

/// Everything this process can send to the peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    Value(ValuePush),
    Subscription(SubscriptionControl),
    Display(DisplayPayload),
}

impl OutgoingMessage {
    /// Short label used in log lines
    pub fn describe(&self) -> String {
        match self {
            OutgoingMessage::Value(push) if push.is_request => {
                format!("request({})", push.address)
            }
            OutgoingMessage::Value(push) => format!("value({})", push.address),
            OutgoingMessage::Subscription(control) if control.unsubscribe => {
                format!("unsubscribe({})", control.address)
            }
            OutgoingMessage::Subscription(control) => format!("subscribe({})", control.address),
            OutgoingMessage::Display(_) => "display".to_string(),
        }
    }
}

/// Everything the peer can send to this process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    Value(ValuePush),
}
