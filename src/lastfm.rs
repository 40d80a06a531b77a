//! Last.fm Audioscrobbler API client.
//!
//! Thin wrapper over the `ws.audioscrobbler.com/2.0` endpoint covering
//! the two write operations the bridge needs: `track.updateNowPlaying`
//! and `track.scrobble`. Every request is signed with the API secret per
//! the Last.fm rules: md5 over the lexicographically sorted `key value`
//! concatenation, with `format` excluded from the signature.
//!
//! API failures are mapped onto the closed error set the bridge branches
//! on: codes 4/9/14 are authentication problems, 29 is rate limiting,
//! transport failures are [`ScrobbleError::Http`], and any other API code
//! surfaces as [`ScrobbleError::Api`].

use crate::error::ScrobbleError;
use crate::types::ScrobblePayload;
use crate::Result;
use async_trait::async_trait;
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::time::Duration;

const API_ROOT: &str = "https://ws.audioscrobbler.com/2.0/";

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default wait when Last.fm rate limits without a Retry-After header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Delivery operations the bridge performs against the tracking service.
///
/// Abstracted so orchestrator tests can substitute a scripted service.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait ScrobbleService: Send + Sync {
    /// Push a best-effort "now playing" update. Callers are expected to
    /// ignore failures.
    async fn update_now_playing(
        &self,
        artist: &str,
        title: &str,
        album: Option<&str>,
        duration: Option<u32>,
    ) -> Result<()>;

    /// Submit one completed listen.
    async fn scrobble(&self, payload: &ScrobblePayload) -> Result<()>;
}

/// Authenticated Last.fm API client.
#[derive(Debug, Clone)]
pub struct LastFmClient {
    http: reqwest::Client,
    api_key: String,
    api_secret: String,
    session_key: String,
}

impl LastFmClient {
    /// Create a client from an existing session key.
    pub fn with_session(api_key: &str, api_secret: &str, session_key: &str) -> Result<Self> {
        Ok(Self {
            http: build_http_client()?,
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            session_key: session_key.to_string(),
        })
    }

    /// Create a client by exchanging username + md5(password) for a
    /// session key via `auth.getMobileSession`.
    ///
    /// The session key obtained this way does not expire; log it and set
    /// `LASTFM_SESSION_KEY` to skip this exchange on future starts.
    pub async fn authenticate(
        api_key: &str,
        api_secret: &str,
        username: &str,
        password_md5: &str,
    ) -> Result<Self> {
        let http = build_http_client()?;

        let auth_token = md5_hex(&format!("{username}{password_md5}"));
        let mut params = BTreeMap::new();
        params.insert("method".to_string(), "auth.getMobileSession".to_string());
        params.insert("api_key".to_string(), api_key.to_string());
        params.insert("username".to_string(), username.to_string());
        params.insert("authToken".to_string(), auth_token);

        let body = post_signed(&http, api_secret, params).await?;
        let session_key = body
            .pointer("/session/key")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ScrobbleError::Auth("auth.getMobileSession returned no session key".to_string())
            })?;

        log::info!("Obtained Last.fm session key for {username}");
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            session_key: session_key.to_string(),
        })
    }

    async fn call(&self, method: &str, extra: Vec<(&str, String)>) -> Result<serde_json::Value> {
        let mut params = BTreeMap::new();
        params.insert("method".to_string(), method.to_string());
        params.insert("api_key".to_string(), self.api_key.clone());
        params.insert("sk".to_string(), self.session_key.clone());
        for (key, value) in extra {
            params.insert(key.to_string(), value);
        }
        post_signed(&self.http, &self.api_secret, params).await
    }
}

#[async_trait]
impl ScrobbleService for LastFmClient {
    async fn update_now_playing(
        &self,
        artist: &str,
        title: &str,
        album: Option<&str>,
        duration: Option<u32>,
    ) -> Result<()> {
        let mut extra = vec![
            ("artist", artist.to_string()),
            ("track", title.to_string()),
        ];
        if let Some(album) = album {
            extra.push(("album", album.to_string()));
        }
        if let Some(duration) = duration {
            extra.push(("duration", duration.to_string()));
        }

        self.call("track.updateNowPlaying", extra).await?;
        log::debug!("Now playing updated: {artist} - {title}");
        Ok(())
    }

    async fn scrobble(&self, payload: &ScrobblePayload) -> Result<()> {
        let mut extra = vec![
            ("artist", payload.artist.clone()),
            ("track", payload.title.clone()),
            ("timestamp", payload.timestamp.to_string()),
        ];
        if let Some(album) = &payload.album {
            extra.push(("album", album.clone()));
        }
        if let Some(duration) = payload.duration {
            extra.push(("duration", duration.to_string()));
        }

        self.call("track.scrobble", extra).await?;
        Ok(())
    }
}

fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| ScrobbleError::Http(e.to_string()))
}

/// Sign `params` and POST them as a form, returning the decoded JSON body.
async fn post_signed(
    http: &reqwest::Client,
    api_secret: &str,
    mut params: BTreeMap<String, String>,
) -> Result<serde_json::Value> {
    let api_sig = signature(&params, api_secret);
    params.insert("api_sig".to_string(), api_sig);
    // format is excluded from the signature
    params.insert("format".to_string(), "json".to_string());

    let response = http
        .post(API_ROOT)
        .form(&params)
        .send()
        .await
        .map_err(|e| ScrobbleError::Http(e.to_string()))?;

    if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ScrobbleError::RateLimit { retry_after });
    }

    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        // Gateways in front of the API occasionally answer with HTML;
        // treat that like any other transport failure
        .map_err(|e| ScrobbleError::Http(format!("undecodable response ({status}): {e}")))?;

    if let Some(code) = body.get("error").and_then(|v| v.as_u64()) {
        let message = body
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(map_api_error(code as u32, message));
    }

    Ok(body)
}

/// Map a Last.fm API error code onto the bridge's error kinds.
///
/// 4 = authentication failed, 9 = invalid session key, 14 = token not
/// authorized, 29 = rate limit exceeded.
fn map_api_error(code: u32, message: String) -> ScrobbleError {
    match code {
        4 | 9 | 14 => ScrobbleError::Auth(message),
        29 => ScrobbleError::RateLimit {
            retry_after: DEFAULT_RETRY_AFTER_SECS,
        },
        _ => ScrobbleError::Api { code, message },
    }
}

/// Build the request signature: md5 over the sorted `key value`
/// concatenation followed by the shared secret.
fn signature(params: &BTreeMap<String, String>, api_secret: &str) -> String {
    let mut base = String::new();
    for (key, value) in params {
        base.push_str(key);
        base.push_str(value);
    }
    base.push_str(api_secret);
    md5_hex(&base)
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_hex_matches_reference_vectors() {
        // RFC 1321 test suite
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn signature_concatenates_sorted_params_then_secret() {
        let mut params = BTreeMap::new();
        params.insert("method".to_string(), "track.scrobble".to_string());
        params.insert("api_key".to_string(), "KEY".to_string());
        params.insert("artist".to_string(), "Low".to_string());

        let expected = md5_hex("api_keyKEYartistLowmethodtrack.scrobbleSECRET");
        assert_eq!(signature(&params, "SECRET"), expected);
    }

    #[test]
    fn api_error_codes_map_to_branchable_kinds() {
        assert!(matches!(
            map_api_error(4, "bad auth".to_string()),
            ScrobbleError::Auth(_)
        ));
        assert!(matches!(
            map_api_error(9, "invalid session".to_string()),
            ScrobbleError::Auth(_)
        ));
        assert!(matches!(
            map_api_error(14, "token not authorized".to_string()),
            ScrobbleError::Auth(_)
        ));
        assert!(matches!(
            map_api_error(29, "slow down".to_string()),
            ScrobbleError::RateLimit { retry_after: 60 }
        ));
        assert!(matches!(
            map_api_error(11, "service offline".to_string()),
            ScrobbleError::Api { code: 11, .. }
        ));
    }
}
