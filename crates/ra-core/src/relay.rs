//! Stream → format → dispatch pipeline.
//!
//! The stream loop and the dispatcher run as separate tasks joined by an
//! unbounded queue, so a slow channel never stalls the read loop (and never
//! trips the idle timeout).

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    dispatch::Dispatcher,
    domain::{Alert, Event},
    errors::Error,
    formatting::format_alert,
    stream::{StreamConnection, StreamTransport},
};

pub struct Relay<T> {
    connection: StreamConnection<T>,
    dispatcher: Dispatcher,
}

impl<T: StreamTransport + 'static> Relay<T> {
    pub fn new(connection: StreamConnection<T>, dispatcher: Dispatcher) -> Self {
        Self {
            connection,
            dispatcher,
        }
    }

    /// Run until `cancel` fires. Alerts already queued when it fires are dropped.
    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            mut connection,
            dispatcher,
        } = self;
        let (tx, rx) = mpsc::unbounded_channel::<Alert>();

        let stream_cancel = cancel.clone();
        let reader = tokio::spawn(async move {
            connection
                .run(&stream_cancel, &mut |event| match event {
                    Event::Alert(alert) => tx
                        .send(alert)
                        .map_err(|_| Error::External("dispatch queue closed".to_string())),
                    _ => Ok(()),
                })
                .await;
        });

        let writer = tokio::spawn(dispatch_loop(rx, dispatcher, cancel.clone()));

        let (r, w) = tokio::join!(reader, writer);
        if let Err(e) = r {
            tracing::error!(error = %e, "stream task aborted");
        }
        if let Err(e) = w {
            tracing::error!(error = %e, "dispatch task aborted");
        }
        tracing::info!("relay stopped");
    }
}

async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<Alert>,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
) {
    loop {
        let alert = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(alert) => alert,
                None => break,
            },
        };

        let text = format_alert(&alert);
        let report = dispatcher.dispatch(&text, &cancel).await;
        for failed in report.failed() {
            tracing::warn!(
                channel = %failed.channel,
                sent = failed.sent,
                total = failed.total,
                error = failed.error.as_deref().unwrap_or("incomplete"),
                "alert not fully delivered"
            );
        }
    }
}
