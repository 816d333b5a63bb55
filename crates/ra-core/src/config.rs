use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://agg.rocketalert.live/api/v2/alerts";
pub const DEFAULT_HEADER_NAME: &str = "x-ra-agg-secret";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_TELEGRAM_CHANNEL: &str = "@RocketAlert";
pub const DEFAULT_TELEGRAM_FOOTER: &str =
    r#"<a href="https://RocketAlert.live">RocketAlert.live</a>"#;
pub const DEFAULT_MASTODON_FOOTER: &str = "https://RocketAlert.live";

const REDACTED: &str = "***REDACTED***";

/// Inbound stream settings.
#[derive(Clone)]
pub struct StreamConfig {
    pub base_url: String,
    pub header_name: String,
    pub header_value: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Maximum silence on the stream before the connection is considered stalled.
    pub idle_timeout: Duration,
    pub reconnect_backoff: Duration,
    pub reconnect_backoff_max: Duration,
    pub heartbeat_file: Option<PathBuf>,
}

impl StreamConfig {
    pub fn url(&self) -> String {
        format!("{}/real-time", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// `@username` of a public channel or a numeric chat id.
    pub channel: String,
    pub message_limit: usize,
    pub min_interval: Duration,
    pub footer: Option<String>,
}

#[derive(Clone)]
pub struct MastodonConfig {
    pub base_url: String,
    pub access_token: String,
    pub message_limit: usize,
    pub min_interval: Duration,
    pub footer: Option<String>,
}

/// Typed configuration for the relay, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub stream: StreamConfig,
    pub telegram: Option<TelegramConfig>,
    pub mastodon: Option<MastodonConfig>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);
        let secs = |key: &str, default: u64| {
            Duration::from_secs(get(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default))
        };
        let millis = |key: &str, default: u64| {
            Duration::from_millis(get(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default))
        };
        let usize_or = |key: &str, default: usize| {
            get(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };
        // Unset → default footer; set but empty → no footer.
        let footer = |key: &str, default: &str| match lookup(key) {
            None => Some(default.to_string()),
            Some(v) => non_empty(v),
        };

        // Header values often pick up stray whitespace from secret stores.
        let header_value = get("CUSTOM_HEADER_VALUE")
            .map(|v| v.trim().to_string())
            .ok_or_else(|| {
                Error::Config("CUSTOM_HEADER_VALUE environment variable is required".to_string())
            })?;

        let connect_timeout = secs("RA_CONNECT_TIMEOUT_SECS", 10);
        let idle_timeout = secs("RA_READ_TIMEOUT_SECS", 35);
        // A zero read timeout would turn every read into an instant reconnect.
        for (key, value) in [
            ("RA_CONNECT_TIMEOUT_SECS", connect_timeout),
            ("RA_READ_TIMEOUT_SECS", idle_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::Config(format!("{key} must be at least 1 second")));
            }
        }

        let reconnect_backoff = millis("RA_RECONNECT_BACKOFF_MS", 5_000);
        let stream = StreamConfig {
            base_url: get("RA_BASEURL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            header_name: get("CUSTOM_HEADER_KEY")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| DEFAULT_HEADER_NAME.to_string()),
            header_value,
            user_agent: get("RA_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            connect_timeout,
            idle_timeout,
            reconnect_backoff,
            reconnect_backoff_max: millis("RA_RECONNECT_BACKOFF_MAX_MS", 5_000)
                .max(reconnect_backoff),
            heartbeat_file: get("RA_HEARTBEAT_FILE").map(PathBuf::from),
        };

        let telegram = get("TELEGRAM_BOT_TOKEN").map(|bot_token| TelegramConfig {
            bot_token,
            channel: get("TELEGRAM_CHANNEL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_CHANNEL.to_string()),
            message_limit: usize_or("TELEGRAM_MESSAGE_LIMIT", 4096),
            min_interval: millis("TELEGRAM_MIN_INTERVAL_MS", 1050),
            footer: footer("TELEGRAM_FOOTER", DEFAULT_TELEGRAM_FOOTER),
        });

        let mastodon = match (get("MASTO_BASEURL"), get("MASTO_ACCESS_TOKEN")) {
            (Some(base_url), Some(access_token)) => Some(MastodonConfig {
                base_url,
                access_token,
                message_limit: usize_or("MASTODON_MESSAGE_LIMIT", 500),
                min_interval: millis("MASTODON_MIN_INTERVAL_MS", 0),
                footer: footer("MASTODON_FOOTER", DEFAULT_MASTODON_FOOTER),
            }),
            (None, None) => None,
            _ => {
                return Err(Error::Config(
                    "MASTO_BASEURL and MASTO_ACCESS_TOKEN must be set together".to_string(),
                ))
            }
        };

        if telegram.is_none() && mastodon.is_none() {
            return Err(Error::Config(
                "no notification channel configured (set TELEGRAM_BOT_TOKEN and/or MASTO_BASEURL + MASTO_ACCESS_TOKEN)"
                    .to_string(),
            ));
        }

        Ok(Self {
            stream,
            telegram,
            mastodon,
        })
    }
}

impl fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConfig")
            .field("url", &self.url())
            .field("header_name", &self.header_name)
            .field("header_value", &REDACTED)
            .field("user_agent", &self.user_agent)
            .field("connect_timeout", &self.connect_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("reconnect_backoff", &self.reconnect_backoff)
            .field("reconnect_backoff_max", &self.reconnect_backoff_max)
            .field("heartbeat_file", &self.heartbeat_file)
            .finish()
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &REDACTED)
            .field("channel", &self.channel)
            .field("message_limit", &self.message_limit)
            .field("min_interval", &self.min_interval)
            .field("footer", &self.footer)
            .finish()
    }
}

impl fmt::Debug for MastodonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MastodonConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &REDACTED)
            .field("message_limit", &self.message_limit)
            .field("min_interval", &self.min_interval)
            .field("footer", &self.footer)
            .finish()
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_with_telegram_only() {
        let cfg = Config::from_lookup(lookup(&[
            ("CUSTOM_HEADER_VALUE", " secret \n"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ]))
        .unwrap();

        assert_eq!(
            cfg.stream.url(),
            "https://agg.rocketalert.live/api/v2/alerts/real-time"
        );
        assert_eq!(cfg.stream.header_name, "x-ra-agg-secret");
        assert_eq!(cfg.stream.header_value, "secret");
        assert!(cfg.stream.user_agent.contains("Chrome"));
        assert_eq!(cfg.stream.connect_timeout, Duration::from_secs(10));
        assert_eq!(cfg.stream.idle_timeout, Duration::from_secs(35));
        assert_eq!(cfg.stream.reconnect_backoff, Duration::from_secs(5));
        assert_eq!(cfg.stream.heartbeat_file, None);

        let tg = cfg.telegram.unwrap();
        assert_eq!(tg.channel, "@RocketAlert");
        assert_eq!(tg.message_limit, 4096);
        assert_eq!(tg.footer.as_deref(), Some(DEFAULT_TELEGRAM_FOOTER));
        assert!(cfg.mastodon.is_none());
    }

    #[test]
    fn reads_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("RA_BASEURL", "https://test-api.example.com/"),
            ("CUSTOM_HEADER_KEY", "X-Test-Header"),
            ("CUSTOM_HEADER_VALUE", "test-value"),
            ("RA_READ_TIMEOUT_SECS", "120"),
            ("RA_RECONNECT_BACKOFF_MS", "1000"),
            ("RA_RECONNECT_BACKOFF_MAX_MS", "30000"),
            ("RA_HEARTBEAT_FILE", "/tmp/ra-heartbeat"),
            ("MASTO_BASEURL", "https://test-mastodon.social"),
            ("MASTO_ACCESS_TOKEN", "test-token"),
            ("MASTODON_FOOTER", ""),
        ]))
        .unwrap();

        assert_eq!(cfg.stream.url(), "https://test-api.example.com/real-time");
        assert_eq!(cfg.stream.header_name, "X-Test-Header");
        assert_eq!(cfg.stream.idle_timeout, Duration::from_secs(120));
        assert_eq!(cfg.stream.reconnect_backoff_max, Duration::from_secs(30));
        assert_eq!(
            cfg.stream.heartbeat_file.as_deref(),
            Some(Path::new("/tmp/ra-heartbeat"))
        );

        let masto = cfg.mastodon.unwrap();
        assert_eq!(masto.message_limit, 500);
        assert_eq!(masto.footer, None);
        assert!(cfg.telegram.is_none());
    }

    #[test]
    fn rejects_zero_timeouts() {
        for key in ["RA_READ_TIMEOUT_SECS", "RA_CONNECT_TIMEOUT_SECS"] {
            let err = Config::from_lookup(lookup(&[
                ("CUSTOM_HEADER_VALUE", "v"),
                ("TELEGRAM_BOT_TOKEN", "t"),
                (key, "0"),
            ]))
            .unwrap_err();
            assert!(matches!(err, Error::Config(_)));
            assert!(err.to_string().contains(key));
        }
    }

    #[test]
    fn backoff_cap_never_below_initial() {
        let cfg = Config::from_lookup(lookup(&[
            ("CUSTOM_HEADER_VALUE", "v"),
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("RA_RECONNECT_BACKOFF_MS", "8000"),
        ]))
        .unwrap();
        assert_eq!(cfg.stream.reconnect_backoff_max, Duration::from_secs(8));
    }

    #[test]
    fn requires_secret_and_a_channel() {
        let err = Config::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "t")])).unwrap_err();
        assert!(err.to_string().contains("CUSTOM_HEADER_VALUE"));

        let err = Config::from_lookup(lookup(&[("CUSTOM_HEADER_VALUE", "v")])).unwrap_err();
        assert!(err.to_string().contains("no notification channel"));

        let err = Config::from_lookup(lookup(&[
            ("CUSTOM_HEADER_VALUE", "v"),
            ("MASTO_BASEURL", "https://m.example"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let cfg = Config::from_lookup(lookup(&[
            ("CUSTOM_HEADER_VALUE", "super-secret-value"),
            ("TELEGRAM_BOT_TOKEN", "123:bot-token"),
            ("MASTO_BASEURL", "https://m.example"),
            ("MASTO_ACCESS_TOKEN", "masto-token"),
        ]))
        .unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("super-secret-value"));
        assert!(!dbg.contains("bot-token"));
        assert!(!dbg.contains("masto-token"));
        assert!(dbg.contains(REDACTED));
    }
}
