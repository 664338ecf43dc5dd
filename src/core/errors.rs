use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BeyondhError {
    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request did not complete within {0:?}")]
    Timeout(Duration),

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid call: {0}")]
    InvalidCall(String),

    #[error("Connection pool closed")]
    PoolClosed,

    #[error("Configuration error: {0}")]
    Config(#[from] crate::core::config::ConfigError),
}

impl BeyondhError {
    /// True for failures that happened at or below the HTTP transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_) | Self::PoolClosed)
    }
}
