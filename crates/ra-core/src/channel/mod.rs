//! Outbound notification channels (Telegram, Mastodon, ...).

pub mod port;
pub mod throttled;

pub use port::{ChannelCapabilities, NotificationChannel, TextFormat};
