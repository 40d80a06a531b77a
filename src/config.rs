//! Runtime configuration.
//!
//! Everything is driven by environment variables (the deployment target
//! is a container next to the player), with a handful of CLI overrides
//! for interactive use. Only the Last.fm credentials are mandatory;
//! everything else has a sensible default.

use crate::error::ScrobbleError;
use crate::notify::Severity;
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::Result;
use clap::Parser;
use std::path::PathBuf;

/// Command-line overrides for a handful of operational settings.
///
/// Credentials intentionally stay in the environment.
#[derive(Parser, Debug, Default)]
#[command(name = "bluos-scrobbler")]
#[command(about = "BluOS to Last.fm scrobble bridge")]
pub struct Args {
    /// BluOS player hostname or IP (overrides BLUOS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// BluOS player port (overrides BLUOS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Poll interval in seconds (overrides POLL_INTERVAL)
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Path to the persistent scrobble queue (overrides SCROBBLE_CACHE_PATH)
    #[arg(short, long)]
    pub queue_file: Option<PathBuf>,
}

/// How the Last.fm session is established.
#[derive(Debug, Clone)]
pub enum LastFmAuth {
    /// A previously obtained session key (preferred; never expires)
    SessionKey(String),
    /// Exchange username + md5(password) for a session key at startup
    Password {
        username: String,
        password_md5: String,
    },
}

/// Webhook sink settings.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub url: String,
    pub min_level: Severity,
}

/// Gotify sink settings.
#[derive(Debug, Clone)]
pub struct GotifySettings {
    pub url: String,
    pub token: String,
    pub min_level: Severity,
    pub priority: u8,
}

/// Complete bridge configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bluos_host: String,
    pub bluos_port: u16,
    /// Seconds between poll ticks, at least 1
    pub poll_interval: u64,
    pub lastfm_api_key: String,
    pub lastfm_api_secret: String,
    pub lastfm_auth: LastFmAuth,
    pub queue_path: PathBuf,
    pub queue_capacity: usize,
    pub app_tag: String,
    pub webhook: Option<WebhookSettings>,
    pub gotify: Option<GotifySettings>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Fails only on missing credentials or unparsable numeric values;
    /// this is the one place where the bridge is allowed to refuse to
    /// start.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| -> Option<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("LASTFM_API_KEY")
            .ok_or_else(|| ScrobbleError::Config("LASTFM_API_KEY is required".to_string()))?;
        let api_secret = get("LASTFM_API_SECRET")
            .ok_or_else(|| ScrobbleError::Config("LASTFM_API_SECRET is required".to_string()))?;

        let lastfm_auth = match get("LASTFM_SESSION_KEY") {
            Some(key) => LastFmAuth::SessionKey(key),
            None => match (get("LASTFM_USERNAME"), get("LASTFM_PASSWORD_MD5")) {
                (Some(username), Some(password_md5)) => LastFmAuth::Password {
                    username,
                    password_md5,
                },
                _ => {
                    return Err(ScrobbleError::Config(
                        "Provide LASTFM_SESSION_KEY or LASTFM_USERNAME + LASTFM_PASSWORD_MD5"
                            .to_string(),
                    ))
                }
            },
        };

        let bluos_host = get("BLUOS_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let bluos_port = parse_number(get("BLUOS_PORT"), "BLUOS_PORT", 11000u16)?;
        let poll_interval = parse_number(get("POLL_INTERVAL"), "POLL_INTERVAL", 3u64)?.max(1);

        let queue_path = get("SCROBBLE_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_queue_path);
        let queue_capacity = parse_number(
            get("SCROBBLE_CACHE_LIMIT"),
            "SCROBBLE_CACHE_LIMIT",
            DEFAULT_QUEUE_CAPACITY,
        )?
        .max(1);

        let app_tag = get("APP_TAG").unwrap_or_else(|| "bluos-scrobbler".to_string());

        let webhook = get("NOTIFY_WEBHOOK_URL").map(|url| WebhookSettings {
            url,
            min_level: min_level(get("NOTIFY_MIN_LEVEL")),
        });

        let gotify = match (get("GOTIFY_URL"), get("GOTIFY_TOKEN")) {
            (Some(url), Some(token)) => Some(GotifySettings {
                url,
                token,
                min_level: min_level(get("GOTIFY_MIN_LEVEL")),
                priority: parse_number(get("GOTIFY_PRIORITY"), "GOTIFY_PRIORITY", 5u8)?,
            }),
            _ => None,
        };

        Ok(Config {
            bluos_host,
            bluos_port,
            poll_interval,
            lastfm_api_key: api_key,
            lastfm_api_secret: api_secret,
            lastfm_auth,
            queue_path,
            queue_capacity,
            app_tag,
            webhook,
            gotify,
        })
    }

    /// Apply command-line overrides on top of the environment config.
    pub fn apply(&mut self, args: &Args) {
        if let Some(host) = &args.host {
            self.bluos_host = host.clone();
        }
        if let Some(port) = args.port {
            self.bluos_port = port;
        }
        if let Some(interval) = args.interval {
            self.poll_interval = interval.max(1);
        }
        if let Some(path) = &args.queue_file {
            self.queue_path = path.clone();
        }
    }
}

/// XDG data dir fallback for the queue file, relative as a last resort.
fn default_queue_path() -> PathBuf {
    match dirs::data_dir() {
        Some(data) => data.join("bluos-scrobbler").join("queue.json"),
        None => PathBuf::from("scrobble_queue.json"),
    }
}

fn min_level(raw: Option<String>) -> Severity {
    raw.and_then(|v| Severity::parse(&v))
        .unwrap_or(Severity::Warning)
}

fn parse_number<T: std::str::FromStr>(
    raw: Option<String>,
    name: &str,
    default: T,
) -> Result<T> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ScrobbleError::Config(format!("{name} is not a valid number: {value}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("LASTFM_API_KEY", "key"),
            ("LASTFM_API_SECRET", "secret"),
            ("LASTFM_SESSION_KEY", "session"),
        ]))
        .unwrap();

        assert_eq!(config.bluos_host, "127.0.0.1");
        assert_eq!(config.bluos_port, 11000);
        assert_eq!(config.poll_interval, 3);
        assert_eq!(config.queue_capacity, 500);
        assert_eq!(config.app_tag, "bluos-scrobbler");
        assert!(matches!(config.lastfm_auth, LastFmAuth::SessionKey(_)));
        assert!(config.webhook.is_none());
        assert!(config.gotify.is_none());
    }

    #[test]
    fn missing_api_credentials_are_fatal() {
        let err = Config::from_lookup(lookup_from(&[("LASTFM_API_KEY", "key")])).unwrap_err();
        assert!(matches!(err, ScrobbleError::Config(_)));

        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ScrobbleError::Config(_)));
    }

    #[test]
    fn password_auth_requires_both_halves() {
        let config = Config::from_lookup(lookup_from(&[
            ("LASTFM_API_KEY", "key"),
            ("LASTFM_API_SECRET", "secret"),
            ("LASTFM_USERNAME", "user"),
            ("LASTFM_PASSWORD_MD5", "0123456789abcdef"),
        ]))
        .unwrap();
        assert!(matches!(config.lastfm_auth, LastFmAuth::Password { .. }));

        let err = Config::from_lookup(lookup_from(&[
            ("LASTFM_API_KEY", "key"),
            ("LASTFM_API_SECRET", "secret"),
            ("LASTFM_USERNAME", "user"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ScrobbleError::Config(_)));
    }

    #[test]
    fn poll_interval_is_clamped_to_one() {
        let config = Config::from_lookup(lookup_from(&[
            ("LASTFM_API_KEY", "key"),
            ("LASTFM_API_SECRET", "secret"),
            ("LASTFM_SESSION_KEY", "session"),
            ("POLL_INTERVAL", "0"),
        ]))
        .unwrap();
        assert_eq!(config.poll_interval, 1);
    }

    #[test]
    fn bad_numbers_are_fatal() {
        let err = Config::from_lookup(lookup_from(&[
            ("LASTFM_API_KEY", "key"),
            ("LASTFM_API_SECRET", "secret"),
            ("LASTFM_SESSION_KEY", "session"),
            ("BLUOS_PORT", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ScrobbleError::Config(_)));
    }

    #[test]
    fn notifier_settings_require_their_variables() {
        let config = Config::from_lookup(lookup_from(&[
            ("LASTFM_API_KEY", "key"),
            ("LASTFM_API_SECRET", "secret"),
            ("LASTFM_SESSION_KEY", "session"),
            ("NOTIFY_WEBHOOK_URL", "https://hooks.example/x"),
            ("NOTIFY_MIN_LEVEL", "error"),
            ("GOTIFY_URL", "https://gotify.example"),
        ]))
        .unwrap();

        let webhook = config.webhook.expect("webhook configured");
        assert_eq!(webhook.min_level, Severity::Error);
        // Gotify needs both URL and token
        assert!(config.gotify.is_none());
    }

    #[test]
    fn unknown_min_level_falls_back_to_warning() {
        let config = Config::from_lookup(lookup_from(&[
            ("LASTFM_API_KEY", "key"),
            ("LASTFM_API_SECRET", "secret"),
            ("LASTFM_SESSION_KEY", "session"),
            ("NOTIFY_WEBHOOK_URL", "https://hooks.example/x"),
            ("NOTIFY_MIN_LEVEL", "shouty"),
        ]))
        .unwrap();
        assert_eq!(config.webhook.unwrap().min_level, Severity::Warning);
    }

    #[test]
    fn cli_overrides_win() {
        let mut config = Config::from_lookup(lookup_from(&[
            ("LASTFM_API_KEY", "key"),
            ("LASTFM_API_SECRET", "secret"),
            ("LASTFM_SESSION_KEY", "session"),
            ("BLUOS_HOST", "10.0.0.5"),
        ]))
        .unwrap();

        let args = Args {
            host: Some("10.0.0.9".to_string()),
            port: Some(11001),
            interval: Some(0),
            queue_file: Some(PathBuf::from("/tmp/q.json")),
        };
        config.apply(&args);

        assert_eq!(config.bluos_host, "10.0.0.9");
        assert_eq!(config.bluos_port, 11001);
        assert_eq!(config.poll_interval, 1);
        assert_eq!(config.queue_path, PathBuf::from("/tmp/q.json"));
    }
}
