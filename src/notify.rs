//! Best-effort operator alerting.
//!
//! Two sink flavors, both optional: a generic JSON webhook (Slack and
//! Discord compatible payload shape) and a Gotify server. Sinks drop
//! events below their configured minimum severity, and every send is
//! fire-and-forget: failures are logged at debug and never bubble up into
//! the delivery path.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Parse a severity name, case-insensitively. `CRITICAL` folds into
    /// [`Severity::Error`]; anything unrecognized is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Some(Severity::Debug),
            "INFO" => Some(Severity::Info),
            "WARNING" | "WARN" => Some(Severity::Warning),
            "ERROR" | "CRITICAL" => Some(Severity::Error),
            _ => None,
        }
    }

    /// Uppercase label used in outgoing payloads.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

/// A single alert destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one alert. Implementations never fail the caller; a lost
    /// notification is preferable to a disturbed delivery loop.
    async fn notify(
        &self,
        severity: Severity,
        title: &str,
        message: &str,
        context: Option<&serde_json::Value>,
    );
}

/// Generic webhook sink: POSTs a JSON body to a configured URL.
pub struct WebhookNotifier {
    url: String,
    min_level: Severity,
    app_tag: String,
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str, min_level: Severity, app_tag: &str) -> crate::Result<Self> {
        Ok(Self {
            url: url.trim().to_string(),
            min_level,
            app_tag: app_tag.to_string(),
            http: build_http_client()?,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        severity: Severity,
        title: &str,
        message: &str,
        context: Option<&serde_json::Value>,
    ) {
        if severity < self.min_level {
            return;
        }

        let payload = json!({
            "level": severity.label(),
            "title": format!("{}: {title}", self.app_tag),
            "message": message,
            "extra": context.cloned().unwrap_or_else(|| json!({})),
        });

        if let Err(e) = self.http.post(&self.url).json(&payload).send().await {
            log::debug!("Webhook notification failed: {e}");
        }
    }
}

/// Gotify sink: POSTs to `{server}/message` with an app token.
pub struct GotifyNotifier {
    url: String,
    token: String,
    min_level: Severity,
    priority: u8,
    app_tag: String,
    http: reqwest::Client,
}

impl GotifyNotifier {
    pub fn new(
        url: &str,
        token: &str,
        min_level: Severity,
        priority: u8,
        app_tag: &str,
    ) -> crate::Result<Self> {
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
            min_level,
            priority,
            app_tag: app_tag.to_string(),
            http: build_http_client()?,
        })
    }
}

#[async_trait]
impl Notifier for GotifyNotifier {
    async fn notify(
        &self,
        severity: Severity,
        title: &str,
        message: &str,
        context: Option<&serde_json::Value>,
    ) {
        if severity < self.min_level {
            return;
        }

        let body = match context {
            Some(extra) => format!("{message}\n\n{extra}"),
            None => message.to_string(),
        };
        let payload = json!({
            "title": format!("{}: {title}", self.app_tag),
            "message": body,
            "priority": self.priority,
        });

        let result = self
            .http
            .post(format!("{}/message", self.url))
            .header("X-Gotify-Key", &self.token)
            .json(&payload)
            .send()
            .await;

        if let Err(e) = result {
            log::debug!("Gotify notification failed: {e}");
        }
    }
}

/// Fan-out over all configured sinks.
///
/// Holding zero sinks is fine; [`alert`](Self::alert) is then a no-op.
#[derive(Default)]
pub struct Alerter {
    sinks: Vec<Box<dyn Notifier>>,
}

impl Alerter {
    pub fn new(sinks: Vec<Box<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    /// Send one alert to every sink. Individual sink failures (or
    /// min-level drops) don't affect the others.
    pub async fn alert(
        &self,
        severity: Severity,
        title: &str,
        message: &str,
        context: Option<&serde_json::Value>,
    ) {
        for sink in &self.sinks {
            sink.notify(severity, title, message, context).await;
        }
    }
}

fn build_http_client() -> crate::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| crate::ScrobbleError::Http(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn severity_parsing() {
        assert_eq!(Severity::parse("debug"), Some(Severity::Debug));
        assert_eq!(Severity::parse("INFO"), Some(Severity::Info));
        assert_eq!(Severity::parse("Warning"), Some(Severity::Warning));
        assert_eq!(Severity::parse("warn"), Some(Severity::Warning));
        assert_eq!(Severity::parse("ERROR"), Some(Severity::Error));
        assert_eq!(Severity::parse("critical"), Some(Severity::Error));
        assert_eq!(Severity::parse("loud"), None);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    struct RecordingSink {
        seen: Arc<Mutex<Vec<(Severity, String)>>>,
    }

    #[async_trait]
    impl Notifier for RecordingSink {
        async fn notify(
            &self,
            severity: Severity,
            title: &str,
            _message: &str,
            _context: Option<&serde_json::Value>,
        ) {
            self.seen.lock().unwrap().push((severity, title.to_string()));
        }
    }

    #[tokio::test]
    async fn alerter_fans_out_to_every_sink() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let alerter = Alerter::new(vec![
            Box::new(RecordingSink { seen: first.clone() }),
            Box::new(RecordingSink { seen: second.clone() }),
        ]);

        alerter
            .alert(Severity::Error, "auth failed", "details", None)
            .await;

        assert_eq!(first.lock().unwrap().len(), 1);
        assert_eq!(second.lock().unwrap().len(), 1);
        assert_eq!(first.lock().unwrap()[0].0, Severity::Error);
    }

    #[tokio::test]
    async fn empty_alerter_is_a_noop() {
        let alerter = Alerter::default();
        alerter.alert(Severity::Info, "started", "hello", None).await;
    }
}
