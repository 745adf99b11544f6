//! Error types shared across the crate.

use std::io;

use crate::core::value::ValueKind;

/// Result type for consumer-facing operations
pub type CommsResult<T> = Result<T, CommsError>;

/// A connection fault recorded by the transport.
///
/// Once recorded the fault is sticky: every later open or send returns a clone of it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("connection fault ({kind:?}): {message}")]
pub struct ConnectionFault {
    pub kind: io::ErrorKind,
    pub message: String,
}

impl ConnectionFault {
    pub fn new(kind: io::ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&io::Error> for ConnectionFault {
    fn from(err: &io::Error) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<io::Error> for ConnectionFault {
    fn from(err: io::Error) -> Self {
        Self::from(&err)
    }
}

impl From<FrameError> for ConnectionFault {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(err) => Self::from(err),
            other => Self::new(io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

/// Framing and encoding errors on the wire
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected Content-Length header, got: {0}")]
    MissingContentLength(String),

    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    #[error("Frame of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    #[error("Header line exceeds {max} bytes")]
    HeaderTooLong { max: usize },
}

impl FrameError {
    /// True when the peer went away rather than sent garbage.
    pub fn is_closed(&self) -> bool {
        match self {
            FrameError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

/// Value conversion failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoercionError {
    #[error("cannot convert {from} to {to}")]
    Mismatch { from: ValueKind, to: ValueKind },

    #[error("cannot parse {input:?} as {to}")]
    Parse { input: String, to: ValueKind },

    #[error("non-finite float {0} has no integer value")]
    NonFinite(f64),

    #[error("float {0} is outside the integer range")]
    OutOfRange(f64),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidVar { name: &'static str, value: String },
}

/// Errors surfaced by the consumer-facing API
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommsError {
    #[error(transparent)]
    Connection(#[from] ConnectionFault),

    #[error("listener closed before a value arrived")]
    ListenerClosed,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("timed out waiting for a value")]
    Timeout,

    #[error("cannot send non-finite float {value} to {address:?}")]
    NonFinite { address: String, value: f64 },
}
