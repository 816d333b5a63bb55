use std::{io, pin::Pin, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL};
use tokio::time::timeout;
use tokio_util::{
    codec::{FramedRead, LinesCodec, LinesCodecError},
    io::StreamReader,
};

use crate::{config::StreamConfig, errors::Error, Result};

/// Upper bound for a single stream line; a larger line is treated as a framing fault.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Lines of an open stream, in arrival order.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Something that can (re)open the server-pushed line stream.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self) -> Result<LineStream>;
}

/// Long-lived HTTP GET against the alert aggregator's real-time endpoint.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    secret_name: HeaderName,
    secret_value: HeaderValue,
    response_timeout: Duration,
}

impl HttpTransport {
    pub fn new(cfg: &StreamConfig) -> Result<Self> {
        let secret_name = HeaderName::from_bytes(cfg.header_name.as_bytes())
            .map_err(|e| Error::Config(format!("invalid secret header name: {e}")))?;
        let mut secret_value = HeaderValue::from_str(&cfg.header_value)
            .map_err(|e| Error::Config(format!("invalid secret header value: {e}")))?;
        secret_value.set_sensitive(true);

        // No whole-request timeout: it would cut the endless body. Waiting for the
        // response head is bounded in `open`; silence after that is the read loop's job.
        let client = reqwest::Client::builder()
            .connect_timeout(cfg.connect_timeout)
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;

        Ok(Self {
            client,
            url: cfg.url(),
            secret_name,
            secret_value,
            response_timeout: cfg.idle_timeout.max(cfg.connect_timeout),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    async fn open(&self) -> Result<LineStream> {
        let request = self
            .client
            .get(&self.url)
            .header(self.secret_name.clone(), self.secret_value.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send();

        // A server can accept the connection and then never answer.
        let resp = timeout(self.response_timeout, request)
            .await
            .map_err(|_| {
                Error::Connect(format!(
                    "no response within {}s",
                    self.response_timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::Connect(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = timeout(self.response_timeout, resp.text())
                .await
                .ok()
                .and_then(|r| r.ok())
                .unwrap_or_default();
            return Err(Error::Connect(format!(
                "unexpected status {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(frame_lines(resp.bytes_stream(), MAX_LINE_BYTES))
    }
}

/// Split a chunked body into lines, independent of where chunk boundaries fall.
fn frame_lines<S, E>(body: S, max_line_bytes: usize) -> LineStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let bytes = body.map(|chunk| chunk.map_err(io::Error::other));
    let lines = FramedRead::new(
        StreamReader::new(bytes),
        LinesCodec::new_with_max_length(max_line_bytes),
    )
    .map(|line| line.map_err(map_codec_err));
    Box::pin(lines)
}

fn map_codec_err(e: LinesCodecError) -> Error {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            Error::Transport("line exceeds the maximum length".to_string())
        }
        LinesCodecError::Io(e) => Error::Transport(e.to_string()),
    }
}
