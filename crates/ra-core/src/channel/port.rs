use async_trait::async_trait;

use crate::Result;

/// How a channel renders the text it is given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    /// Telegram-style HTML subset; message bodies are escaped before sending.
    Html,
}

/// Capabilities / limits of a channel implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelCapabilities {
    /// Maximum characters per posted message.
    pub max_message_len: usize,
    pub format: TextFormat,
}

/// Cross-destination notification port.
///
/// Implementations only know how to post one already-sized segment; chunking,
/// footers and failure isolation live in the dispatcher.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Short identifier used in logs and dispatch reports.
    fn name(&self) -> &str;

    fn capabilities(&self) -> ChannelCapabilities;

    /// Text appended after every message (already in the channel's format).
    fn footer(&self) -> Option<&str> {
        None
    }

    async fn send_segment(&self, text: &str) -> Result<()>;
}
