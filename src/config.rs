//! Process configuration for locating the peer's pipes.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::transport::codec::DEFAULT_MAX_FRAME_LEN;

/// Path of the pipe this process writes to
pub const WRITER_PIPE_VAR: &str = "CELLWIRE_WRITER_PIPE";
/// Path of the pipe this process reads from
pub const READER_PIPE_VAR: &str = "CELLWIRE_READER_PIPE";
/// Optional frame size limit in bytes
pub const MAX_FRAME_LEN_VAR: &str = "CELLWIRE_MAX_FRAME_LEN";

/// Where the transport finds its two streams.
#[derive(Debug, Clone, PartialEq)]
pub struct CommsConfig {
    pub writer_path: PathBuf,
    pub reader_path: PathBuf,
    pub max_frame_len: usize,
}

impl CommsConfig {
    pub fn new(writer_path: impl Into<PathBuf>, reader_path: impl Into<PathBuf>) -> Self {
        Self {
            writer_path: writer_path.into(),
            reader_path: reader_path.into(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingVar(name))
        };

        let mut config = Self::new(required(WRITER_PIPE_VAR)?, required(READER_PIPE_VAR)?);

        if let Some(value) = lookup(MAX_FRAME_LEN_VAR) {
            config.max_frame_len = match value.trim().parse::<usize>() {
                Ok(len) if len > 0 => len,
                _ => {
                    return Err(ConfigError::InvalidVar {
                        name: MAX_FRAME_LEN_VAR,
                        value,
                    })
                }
            };
        }

        Ok(config)
    }
}
