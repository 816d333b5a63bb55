//! Telegram adapter (teloxide).
//!
//! Posts alert messages to a channel through the Bot API. The bot must be an
//! administrator of the channel.

use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{ParseMode, Recipient},
};
use tokio::time::sleep;

use ra_core::{
    channel::{ChannelCapabilities, NotificationChannel, TextFormat},
    config::TelegramConfig,
    errors::Error,
    Result,
};

const CHANNEL_NAME: &str = "telegram";

#[derive(Clone)]
pub struct TelegramChannel {
    bot: Bot,
    recipient: Recipient,
    message_limit: usize,
    footer: Option<String>,
}

impl TelegramChannel {
    pub fn new(
        bot: Bot,
        channel: &str,
        message_limit: usize,
        footer: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            bot,
            recipient: parse_recipient(channel)?,
            message_limit,
            footer,
        })
    }

    pub fn from_config(cfg: &TelegramConfig) -> Result<Self> {
        Self::new(
            Bot::new(cfg.bot_token.clone()),
            &cfg.channel,
            cfg.message_limit,
            cfg.footer.clone(),
        )
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::channel(CHANNEL_NAME, e)
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    tracing::warn!(retry_after_secs = d.as_secs(), "telegram flood control");
                    sleep(d).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }
}

/// `@channelname` (or a bare name) → channel username; anything numeric → chat id.
pub fn parse_recipient(channel: &str) -> Result<Recipient> {
    let channel = channel.trim();
    if channel.is_empty() {
        return Err(Error::Config("telegram channel is empty".to_string()));
    }
    if let Ok(id) = channel.parse::<i64>() {
        return Ok(Recipient::Id(ChatId(id)));
    }
    let name = channel.trim_start_matches('@');
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(Error::Config(format!("invalid telegram channel: {channel:?}")));
    }
    Ok(Recipient::ChannelUsername(format!("@{name}")))
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            max_message_len: self.message_limit,
            format: TextFormat::Html,
        }
    }

    fn footer(&self) -> Option<&str> {
        self.footer.as_deref()
    }

    async fn send_segment(&self, html: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_message(self.recipient.clone(), html.to_string())
                .parse_mode(ParseMode::Html)
                .disable_web_page_preview(true)
        })
        .await?;
        Ok(())
    }
}
