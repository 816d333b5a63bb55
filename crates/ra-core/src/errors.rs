use std::time::Duration;

/// Core error type for the relay.
///
/// Adapter crates map their specific errors into this type so the stream loop
/// and the dispatcher can classify failures consistently (reconnect, skip,
/// isolate per channel).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("stream transport fault: {0}")]
    Transport(String),

    #[error("no data received for {0:?}")]
    IdleTimeout(Duration),

    #[error("channel {channel} failed: {reason}")]
    Channel { channel: String, reason: String },

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn channel(channel: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Channel {
            channel: channel.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
