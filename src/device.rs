//! BluOS status source.
//!
//! A BluOS player exposes its transport state as an XML document at
//! `http://{host}:{port}/Status`. Field names vary across firmware
//! generations and sources (the title shows up as `name` on some devices
//! and `title1` on others), so every lookup walks a fallback chain.
//!
//! Fetching is deliberately tolerant: any missing tag becomes `None` and
//! the bridge decides what a partial snapshot means.

use crate::error::ScrobbleError;
use crate::types::{PlayerStatus, TransportState};
use crate::Result;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::time::Duration;

/// Timeout for status requests, so an unreachable player cannot stall
/// the poll loop.
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of player status snapshots.
///
/// Abstracted so the bridge can be driven by a scripted source in tests.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch one status snapshot. Errors mean "player unavailable this
    /// tick" and are not fatal to the caller.
    async fn fetch(&self) -> Result<PlayerStatus>;
}

/// HTTP client for a single BluOS player.
#[derive(Debug, Clone)]
pub struct BluOsClient {
    base_url: String,
    http: reqwest::Client,
}

impl BluOsClient {
    /// Create a client for the player at `host:port`.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ScrobbleError::Http(e.to_string()))?;

        Ok(Self {
            base_url: format!("http://{host}:{port}"),
            http,
        })
    }
}

#[async_trait]
impl StatusSource for BluOsClient {
    async fn fetch(&self) -> Result<PlayerStatus> {
        let url = format!("{}/Status", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ScrobbleError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| ScrobbleError::Http(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| ScrobbleError::Http(e.to_string()))?;

        parse_status(&body)
    }
}

/// Parse a BluOS `/Status` document into a status snapshot.
///
/// Returns an error only for malformed XML; missing fields are simply
/// `None` in the result.
pub fn parse_status(xml: &str) -> Result<PlayerStatus> {
    validate(xml)?;

    let text = |tags: &[&str]| -> Option<String> {
        tags.iter().find_map(|tag| extract_text(xml, tag))
    };
    let seconds = |tags: &[&str]| -> Option<u32> {
        tags.iter()
            .find_map(|tag| extract_text(xml, tag))
            .and_then(|raw| parse_seconds(&raw))
    };

    let state = text(&["state", "status", "mode"])
        .map(|raw| TransportState::parse(&raw))
        .unwrap_or(TransportState::Unknown);

    Ok(PlayerStatus {
        // The title appears as <name> on current firmware and <title1>
        // on older devices
        title: text(&["name", "title1", "title", "song"]),
        artist: text(&["artist", "title2"]),
        album: text(&["album", "title3"]),
        elapsed: seconds(&["secs", "elapsed", "position", "time"]),
        duration: seconds(&["totlen", "duration", "total", "trackLength", "length"]),
        state,
    })
}

/// Reject documents that are not well-formed XML, so a device answering
/// with an HTML error page is a skipped tick rather than a bogus
/// all-empty snapshot.
fn validate(xml: &str) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => return Ok(()),
            Ok(_) => {}
            Err(e) => return Err(ScrobbleError::Parse(e.to_string())),
        }
        buf.clear();
    }
}

/// Extract the text content of the first element with the given name.
fn extract_text(xml: &str, element_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let target_bytes = element_name.as_bytes();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == target_bytes => {
                return match reader.read_text(e.name()) {
                    Ok(text) => {
                        // Some firmwares double-encode entities
                        let decoded = html_escape::decode_html_entities(&text);
                        let trimmed = decoded.trim();
                        (!trimmed.is_empty()).then(|| trimmed.to_string())
                    }
                    Err(_) => None,
                };
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

/// Parse a seconds value, tolerating fractional strings like `"185.2"`.
fn parse_seconds(raw: &str) -> Option<u32> {
    let value: f64 = raw.trim().parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value as u32)
    } else {
        None
    }
}
