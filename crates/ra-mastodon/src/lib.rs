//! Mastodon adapter (statuses API over reqwest).
//!
//! Posts each segment as a public status. Mastodon renders plain text, so
//! bodies go out unescaped.

use std::time::Duration;

use async_trait::async_trait;

use ra_core::{
    channel::{ChannelCapabilities, NotificationChannel, TextFormat},
    config::MastodonConfig,
    errors::Error,
    Result,
};

const CHANNEL_NAME: &str = "mastodon";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct MastodonChannel {
    http: reqwest::Client,
    statuses_url: String,
    access_token: String,
    message_limit: usize,
    footer: Option<String>,
}

impl std::fmt::Debug for MastodonChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MastodonChannel")
            .field("statuses_url", &self.statuses_url)
            .field("message_limit", &self.message_limit)
            .finish_non_exhaustive()
    }
}

impl MastodonChannel {
    pub fn new(
        base_url: &str,
        access_token: impl Into<String>,
        message_limit: usize,
        footer: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("mastodon http client build failed: {e}")))?;
        Ok(Self {
            http,
            statuses_url: format!("{}/api/v1/statuses", base_url.trim_end_matches('/')),
            access_token: access_token.into(),
            message_limit,
            footer,
        })
    }

    pub fn from_config(cfg: &MastodonConfig) -> Result<Self> {
        Self::new(
            &cfg.base_url,
            cfg.access_token.clone(),
            cfg.message_limit,
            cfg.footer.clone(),
        )
    }

    pub fn statuses_url(&self) -> &str {
        &self.statuses_url
    }
}

#[async_trait]
impl NotificationChannel for MastodonChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            max_message_len: self.message_limit,
            format: TextFormat::Plain,
        }
    }

    fn footer(&self) -> Option<&str> {
        self.footer.as_deref()
    }

    async fn send_segment(&self, text: &str) -> Result<()> {
        let resp = self
            .http
            .post(&self.statuses_url)
            .bearer_auth(&self.access_token)
            .form(&[("status", text), ("visibility", "public")])
            .send()
            .await
            .map_err(|e| Error::channel(CHANNEL_NAME, format!("request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::channel(
                CHANNEL_NAME,
                format!(
                    "status post failed: {status} {}",
                    body.chars().take(200).collect::<String>()
                ),
            ));
        }

        // The status is already posted; the body only feeds the debug log.
        match resp.json::<serde_json::Value>().await {
            Ok(v) => tracing::debug!(
                status_id = v.get("id").and_then(|id| id.as_str()).unwrap_or(""),
                "status posted"
            ),
            Err(e) => tracing::debug!(error = %e, "status posted; unreadable response body"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_string_contains, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[test]
    fn builds_statuses_url() {
        let ch = MastodonChannel::new("https://mastodon.social/", "tok", 500, None).unwrap();
        assert_eq!(ch.statuses_url(), "https://mastodon.social/api/v1/statuses");
        assert_eq!(ch.capabilities().format, TextFormat::Plain);
        assert_eq!(ch.capabilities().max_message_len, 500);
    }

    #[test]
    fn debug_hides_token() {
        let ch = MastodonChannel::new("https://mastodon.social", "very-secret", 500, None).unwrap();
        assert!(!format!("{ch:?}").contains("very-secret"));
    }

    #[tokio::test]
    async fn posts_status_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/statuses"))
            .and(header("authorization", "Bearer tok-123"))
            .and(body_string_contains("status=Red+alert+%26+co"))
            .and(body_string_contains("visibility=public"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "1"})))
            .expect(1)
            .mount(&server)
            .await;

        let ch = MastodonChannel::new(&server.uri(), "tok-123", 500, None).unwrap();
        ch.send_segment("Red alert & co").await.unwrap();
    }

    #[tokio::test]
    async fn rejected_post_is_a_channel_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/statuses"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(serde_json::json!({"error": "Text is too long"})),
            )
            .mount(&server)
            .await;

        let ch = MastodonChannel::new(&server.uri(), "tok", 500, None).unwrap();
        match ch.send_segment("x").await.unwrap_err() {
            Error::Channel { channel, reason } => {
                assert_eq!(channel, "mastodon");
                assert!(reason.contains("422"));
                assert!(reason.contains("too long"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn accepted_post_with_odd_body_still_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/statuses"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let ch = MastodonChannel::new(&server.uri(), "tok", 500, None).unwrap();
        assert!(ch.send_segment("x").await.is_ok());
    }
}
