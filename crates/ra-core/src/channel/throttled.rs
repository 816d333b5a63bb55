use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    channel::port::{ChannelCapabilities, NotificationChannel},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between two posts to the same channel (flood control).
    pub min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        // Telegram channels tolerate roughly one post per second.
        Self {
            min_interval: Duration::from_millis(1050),
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// NotificationChannel decorator that spaces out posts.
///
/// Multi-segment messages are sent back to back by the dispatcher, which is
/// exactly the burst pattern that triggers 429s on Telegram.
pub struct ThrottledChannel {
    inner: Arc<dyn NotificationChannel>,
    limiter: Mutex<IntervalLimiter>,
}

impl ThrottledChannel {
    pub fn new(inner: Arc<dyn NotificationChannel>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            limiter: Mutex::new(IntervalLimiter::new(cfg.min_interval)),
        }
    }

    async fn throttle(&self) {
        let wait = { self.limiter.lock().await.reserve() };
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl NotificationChannel for ThrottledChannel {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capabilities(&self) -> ChannelCapabilities {
        self.inner.capabilities()
    }

    fn footer(&self) -> Option<&str> {
        self.inner.footer()
    }

    async fn send_segment(&self, text: &str) -> Result<()> {
        self.throttle().await;
        self.inner.send_segment(text).await
    }
}
