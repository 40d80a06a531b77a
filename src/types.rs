//! Data types shared across the bridge.
//!
//! This module contains the track identity used for duplicate detection,
//! the transport state reported by the player, the parsed status snapshot,
//! and the scrobble payload that is delivered to Last.fm (and persisted in
//! the retry queue).

use serde::{Deserialize, Serialize};

/// Playback transport state as reported by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// Actively playing a track
    Playing,
    /// Playback paused
    Paused,
    /// Playback stopped
    Stopped,
    /// Missing or unrecognized state
    #[default]
    Unknown,
}

impl TransportState {
    /// Map a raw BluOS state string onto a transport state.
    ///
    /// Matching is case-insensitive; anything that isn't `play`, `pause`
    /// or `stop` becomes [`TransportState::Unknown`].
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "play" => TransportState::Playing,
            "pause" => TransportState::Paused,
            "stop" => TransportState::Stopped,
            _ => TransportState::Unknown,
        }
    }
}

/// Stable identity of a track, used to detect track changes.
///
/// Two observations belong to the same listen iff every field matches.
/// The identity is only compared, never persisted on its own.
///
/// # Examples
///
/// ```rust
/// use bluos_scrobbler::TrackIdentity;
///
/// let a = TrackIdentity {
///     artist: Some("Radiohead".to_string()),
///     title: Some("Paranoid Android".to_string()),
///     album: Some("OK Computer".to_string()),
///     duration: Some(386),
/// };
/// assert_eq!(a, a.clone());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackIdentity {
    /// The artist name, if the player reported one
    pub artist: Option<String>,
    /// The track title, if the player reported one
    pub title: Option<String>,
    /// The album name, if the player reported one
    pub album: Option<String>,
    /// Track length in seconds, if known
    pub duration: Option<u32>,
}

/// One status snapshot fetched from the player.
///
/// Every field is optional: BluOS devices omit tags freely depending on
/// the source (radio streams have no duration, stopped players report no
/// track at all). Consumers must tolerate `None` everywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStatus {
    /// The artist name, if present in the status document
    pub artist: Option<String>,
    /// The track title, if present
    pub title: Option<String>,
    /// The album name, if present
    pub album: Option<String>,
    /// Track length in seconds, if present
    pub duration: Option<u32>,
    /// Elapsed playback time in seconds, if present
    pub elapsed: Option<u32>,
    /// Transport state; [`TransportState::Unknown`] when absent
    pub state: TransportState,
}

impl PlayerStatus {
    /// Build the track identity for this snapshot.
    pub fn identity(&self) -> TrackIdentity {
        TrackIdentity {
            artist: self.artist.clone(),
            title: self.title.clone(),
            album: self.album.clone(),
            duration: self.duration,
        }
    }
}

/// A pending scrobble, as submitted to Last.fm and as persisted in the
/// retry queue.
///
/// `timestamp` is the unix time the listen *started*, computed once when
/// the payload is built so retries carry a stable value. Payloads have no
/// identity beyond their field values; the queue stores duplicates as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrobblePayload {
    /// The artist name
    pub artist: String,
    /// The track title
    pub title: String,
    /// The album name, if known
    pub album: Option<String>,
    /// Track length in seconds, if known
    pub duration: Option<u32>,
    /// Unix timestamp (seconds) of when the listen started
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_state_parsing() {
        assert_eq!(TransportState::parse("play"), TransportState::Playing);
        assert_eq!(TransportState::parse("PAUSE"), TransportState::Paused);
        assert_eq!(TransportState::parse("Stop"), TransportState::Stopped);
        assert_eq!(TransportState::parse("stream"), TransportState::Unknown);
        assert_eq!(TransportState::parse(""), TransportState::Unknown);
    }

    #[test]
    fn identity_equality_is_structural() {
        let status = PlayerStatus {
            artist: Some("Low".to_string()),
            title: Some("Especially Me".to_string()),
            album: Some("C'mon".to_string()),
            duration: Some(275),
            elapsed: Some(10),
            state: TransportState::Playing,
        };

        let mut other = status.clone();
        assert_eq!(status.identity(), other.identity());

        other.album = None;
        assert_ne!(status.identity(), other.identity());
    }

    #[test]
    fn payload_round_trips_through_json() {
        let payload = ScrobblePayload {
            artist: "Neko Case".to_string(),
            title: "Hold On, Hold On".to_string(),
            album: None,
            duration: Some(166),
            timestamp: 1_640_995_200,
        };

        let json = serde_json::to_string(&payload).unwrap();
        let restored: ScrobblePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(payload, restored);
    }
}
