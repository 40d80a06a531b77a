use thiserror::Error;

/// Error types for bridge operations.
///
/// The delivery path branches on exactly four kinds of scrobble failure:
/// [`Http`](ScrobbleError::Http) and [`RateLimit`](ScrobbleError::RateLimit)
/// are recoverable (the payload is queued for a later retry),
/// [`Auth`](ScrobbleError::Auth) means the credentials are bad and retrying
/// is pointless, and anything else is unexpected but still retried.
#[derive(Error, Debug)]
pub enum ScrobbleError {
    /// HTTP/network related errors.
    ///
    /// Connection failures, timeouts, DNS errors and other low-level
    /// transport issues, for any of the collaborators.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication failures.
    ///
    /// Invalid API credentials, an expired or revoked session key, or a
    /// rejected auth token. Requires operator intervention.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Rate limiting from Last.fm.
    ///
    /// The `retry_after` field indicates how many seconds to wait before
    /// the next request attempt.
    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimit {
        /// Number of seconds to wait before retrying
        retry_after: u64,
    },

    /// Any other error code returned by the Last.fm API.
    ///
    /// The service accepted the request but rejected it for a reason the
    /// bridge doesn't specifically handle.
    #[error("Last.fm API error {code}: {message}")]
    Api {
        /// Numeric Last.fm error code
        code: u32,
        /// Error message from the API response
        message: String,
    },

    /// Failed to decode a collaborator's response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// File system I/O errors (queue persistence).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or incomplete startup configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}
