use std::{
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio_util::sync::CancellationToken;

use ra_core::{
    channel::{
        throttled::{ThrottleConfig, ThrottledChannel},
        NotificationChannel,
    },
    config::Config,
    dispatch::Dispatcher,
    relay::Relay,
    stream::{HttpTransport, StreamConnection},
    Result,
};
use ra_mastodon::MastodonChannel;
use ra_telegram::TelegramChannel;

const EXIT_SIGNAL: u8 = 1;
const EXIT_STARTUP: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = ra_core::logging::init("ra") {
        eprintln!("logging init failed: {e}");
        return ExitCode::from(EXIT_STARTUP);
    }

    let relay = match build() {
        Ok(relay) => relay,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    let cancel = CancellationToken::new();
    let signalled = Arc::new(AtomicBool::new(false));
    tokio::spawn(watch_signals(cancel.clone(), signalled.clone()));

    relay.run(cancel).await;

    if signalled.load(Ordering::SeqCst) {
        ExitCode::from(EXIT_SIGNAL)
    } else {
        ExitCode::SUCCESS
    }
}

fn build() -> Result<Relay<HttpTransport>> {
    let cfg = Config::load()?;
    tracing::info!(config = ?cfg, "configuration loaded");

    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
    if let Some(tg) = &cfg.telegram {
        let inner: Arc<dyn NotificationChannel> = Arc::new(TelegramChannel::from_config(tg)?);
        channels.push(throttled(inner, tg.min_interval));
    }
    if let Some(masto) = &cfg.mastodon {
        let inner: Arc<dyn NotificationChannel> = Arc::new(MastodonChannel::from_config(masto)?);
        channels.push(throttled(inner, masto.min_interval));
    }
    tracing::info!(
        channels = ?channels.iter().map(|c| c.name()).collect::<Vec<_>>(),
        "channels registered"
    );

    let transport = HttpTransport::new(&cfg.stream)?;
    tracing::info!(url = transport.url(), "alert stream");
    let connection = StreamConnection::from_config(transport, &cfg.stream);

    Ok(Relay::new(connection, Dispatcher::new(channels)))
}

fn throttled(
    inner: Arc<dyn NotificationChannel>,
    min_interval: std::time::Duration,
) -> Arc<dyn NotificationChannel> {
    Arc::new(ThrottledChannel::new(inner, ThrottleConfig { min_interval }))
}

async fn watch_signals(cancel: CancellationToken, signalled: Arc<AtomicBool>) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        r = tokio::signal::ctrl_c() => {
            if let Err(e) = r {
                tracing::warn!(error = %e, "ctrl-c handler unavailable");
                return;
            }
            tracing::info!("interrupt received; shutting down");
        }
        _ = terminate => tracing::info!("termination signal received; shutting down"),
    }

    signalled.store(true, Ordering::SeqCst);
    cancel.cancel();
}
