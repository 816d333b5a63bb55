//! Fan-out of formatted messages to every registered channel.
//!
//! Each channel gets its own rendering (escaping + footer), its own chunking
//! and its own failure domain: one channel failing never stops another.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::{
    channel::{NotificationChannel, TextFormat},
    chunking::split_message,
    formatting::escape_html,
};

/// Delivery result for one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelOutcome {
    pub channel: String,
    pub sent: usize,
    pub total: usize,
    pub error: Option<String>,
}

impl ChannelOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.sent == self.total
    }
}

#[derive(Clone, Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    pub fn failed(&self) -> impl Iterator<Item = &ChannelOutcome> {
        self.outcomes.iter().filter(|o| !o.is_complete())
    }

    pub fn all_delivered(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Build the per-channel text: body in the channel's format, then the footer.
pub fn render_for_channel(text: &str, channel: &dyn NotificationChannel) -> String {
    let mut body = match channel.capabilities().format {
        TextFormat::Plain => text.to_string(),
        TextFormat::Html => escape_html(text),
    };
    if let Some(footer) = channel.footer().filter(|f| !f.is_empty()) {
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }
        body.push_str(footer);
    }
    body
}

#[derive(Clone)]
pub struct Dispatcher {
    channels: Arc<[Arc<dyn NotificationChannel>]>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self {
            channels: channels.into(),
        }
    }

    pub fn channels(&self) -> &[Arc<dyn NotificationChannel>] {
        &self.channels
    }

    /// Deliver `text` to every channel.
    ///
    /// Channels run concurrently; segments within a channel are sent in order.
    /// Once `cancel` fires no further segment is started.
    pub async fn dispatch(&self, text: &str, cancel: &CancellationToken) -> DispatchReport {
        let sends = self
            .channels
            .iter()
            .map(|channel| deliver(channel.as_ref(), text, cancel));
        DispatchReport {
            outcomes: join_all(sends).await,
        }
    }
}

async fn deliver(
    channel: &dyn NotificationChannel,
    text: &str,
    cancel: &CancellationToken,
) -> ChannelOutcome {
    let name = channel.name().to_string();
    let rendered = render_for_channel(text, channel);
    let segments = split_message(&rendered, channel.capabilities().max_message_len);
    let total = segments.len();
    let mut sent = 0usize;

    for (idx, segment) in segments.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::warn!(
                channel = %name,
                sent,
                total,
                "shutdown requested; remaining segments dropped"
            );
            return ChannelOutcome {
                channel: name,
                sent,
                total,
                error: Some("cancelled".to_string()),
            };
        }

        if let Err(e) = channel.send_segment(segment).await {
            tracing::error!(
                channel = %name,
                segment = idx + 1,
                total,
                error = %e,
                "failed to post segment"
            );
            return ChannelOutcome {
                channel: name,
                sent,
                total,
                error: Some(e.to_string()),
            };
        }
        sent += 1;
    }

    tracing::info!(channel = %name, segments = total, "message posted");
    ChannelOutcome {
        channel: name,
        sent,
        total,
        error: None,
    }
}
