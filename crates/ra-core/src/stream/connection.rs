//! Self-healing read loop over the alert stream.
//!
//! ```text
//! Disconnected -> Connecting -> Streaming -> (Idle | Errored) -> Disconnected -> Connecting ...
//! ```
//!
//! Only cancellation ends the loop. Idle timeouts reconnect immediately; every
//! other fault reconnects after a (capped, exponential) backoff.

use std::time::Duration;

use futures::StreamExt;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    config::StreamConfig,
    decoder::{decode_line, strip_data_prefix},
    domain::{ConnectionState, Event},
    errors::Error,
    stream::{heartbeat::Heartbeat, transport::StreamTransport},
    Result,
};

/// Shortest idle timeout honoured; idle reconnects carry no backoff.
pub const MIN_IDLE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current: policy.initial,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .saturating_mul(2)
            .min(self.policy.max.max(self.policy.initial));
        delay
    }

    fn reset(&mut self) {
        self.current = self.policy.initial;
    }
}

/// Why a single streaming session ended.
#[derive(Debug)]
pub enum Disconnect {
    /// No line arrived within the idle timeout.
    IdleTimeout,
    /// The server ended the response body.
    Closed,
    ConnectFailed(Error),
    /// Transport or framing fault while streaming.
    Fault(Error),
    Cancelled,
}

pub struct StreamConnection<T> {
    transport: T,
    idle_timeout: Duration,
    backoff: Backoff,
    heartbeat: Option<Heartbeat>,
    state: ConnectionState,
    last_keep_alive: Option<Instant>,
}

impl<T: StreamTransport> StreamConnection<T> {
    pub fn new(transport: T, idle_timeout: Duration, backoff: BackoffPolicy) -> Self {
        Self {
            transport,
            idle_timeout: idle_timeout.max(MIN_IDLE_TIMEOUT),
            backoff: Backoff::new(backoff),
            heartbeat: None,
            state: ConnectionState::Disconnected,
            last_keep_alive: None,
        }
    }

    pub fn from_config(transport: T, cfg: &StreamConfig) -> Self {
        let conn = Self::new(
            transport,
            cfg.idle_timeout,
            BackoffPolicy {
                initial: cfg.reconnect_backoff,
                max: cfg.reconnect_backoff_max,
            },
        );
        match &cfg.heartbeat_file {
            Some(path) => conn.with_heartbeat(Heartbeat::new(path)),
            None => conn,
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_keep_alive(&self) -> Option<Instant> {
        self.last_keep_alive
    }

    /// Keep the stream open until `cancel` fires, reconnecting on every failure.
    ///
    /// `on_event` sees every decoded event (keep-alives and malformed ones
    /// included). Errors it returns are logged and the loop carries on.
    pub async fn run(
        &mut self,
        cancel: &CancellationToken,
        on_event: &mut (dyn FnMut(Event) -> Result<()> + Send),
    ) {
        while !cancel.is_cancelled() {
            let delay = match self.run_once(cancel, on_event).await {
                Disconnect::Cancelled => break,
                Disconnect::IdleTimeout => {
                    tracing::warn!(
                        reason = %Error::IdleTimeout(self.idle_timeout),
                        "stream idle; reconnecting"
                    );
                    Duration::ZERO
                }
                Disconnect::Closed => {
                    let delay = self.backoff.next_delay();
                    tracing::warn!(
                        backoff_ms = delay.as_millis() as u64,
                        "stream closed by server"
                    );
                    delay
                }
                Disconnect::ConnectFailed(e) => {
                    let delay = self.backoff.next_delay();
                    tracing::error!(
                        error = %e,
                        backoff_ms = delay.as_millis() as u64,
                        "connect failed"
                    );
                    delay
                }
                Disconnect::Fault(e) => {
                    let delay = self.backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        backoff_ms = delay.as_millis() as u64,
                        "stream fault"
                    );
                    delay
                }
            };
            self.set_state(ConnectionState::Disconnected);

            if delay > Duration::ZERO {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(delay) => {}
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::info!("stream loop stopped");
    }

    /// Open the stream once and consume it until it ends, stalls or faults.
    pub async fn run_once(
        &mut self,
        cancel: &CancellationToken,
        on_event: &mut (dyn FnMut(Event) -> Result<()> + Send),
    ) -> Disconnect {
        self.set_state(ConnectionState::Connecting);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Disconnect::Cancelled,
            r = self.transport.open() => r,
        };
        let mut lines = match opened {
            Ok(lines) => lines,
            Err(e) => {
                self.set_state(ConnectionState::Errored);
                return Disconnect::ConnectFailed(e);
            }
        };

        self.set_state(ConnectionState::Streaming);
        tracing::info!("stream connected");
        // Backoff only resets once the server has actually sent something.
        let mut received = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Disconnect::Cancelled,
                next = timeout(self.idle_timeout, lines.next()) => next,
            };

            match next {
                Err(_) => {
                    self.set_state(ConnectionState::Idle);
                    return Disconnect::IdleTimeout;
                }
                Ok(None) => {
                    self.set_state(ConnectionState::Errored);
                    return Disconnect::Closed;
                }
                Ok(Some(Err(e))) => {
                    self.set_state(ConnectionState::Errored);
                    return Disconnect::Fault(e);
                }
                Ok(Some(Ok(line))) => {
                    if !received {
                        received = true;
                        self.backoff.reset();
                    }
                    self.handle_line(&line, on_event).await;
                }
            }
        }
    }

    async fn handle_line(
        &mut self,
        line: &str,
        on_event: &mut (dyn FnMut(Event) -> Result<()> + Send),
    ) {
        if strip_data_prefix(line).is_empty() {
            return;
        }

        let event = decode_line(line);
        match &event {
            Event::KeepAlive => {
                self.last_keep_alive = Some(Instant::now());
                tracing::debug!("keep-alive");
                if let Some(hb) = &self.heartbeat {
                    if let Err(e) = hb.beat().await {
                        tracing::warn!(
                            error = %e,
                            path = %hb.path().display(),
                            "heartbeat write failed"
                        );
                    }
                }
            }
            Event::Malformed { reason } => {
                tracing::warn!(%reason, "skipping malformed event");
            }
            Event::Empty => tracing::debug!("event without occurrences"),
            Event::Alert(alert) => {
                tracing::info!(
                    alert_type = alert.alert_type_id,
                    occurrences = alert.occurrences.len(),
                    "alert received"
                );
            }
        }

        if let Err(e) = on_event(event) {
            tracing::error!(error = %e, "event handler failed");
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "connection state");
            self.state = next;
        }
    }
}
