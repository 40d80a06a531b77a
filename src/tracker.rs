//! Playback tracking and the scrobble-eligibility decision.
//!
//! [`PlaybackTracker`] consumes one `(identity, transport state, elapsed)`
//! observation per poll tick and decides the unique instant a listen
//! qualifies for delivery. Last.fm's guideline: a play counts once half of
//! the track, capped at 240 seconds, has elapsed.
//!
//! The tracker holds no persistent state. A process restart mid-listen
//! starts over from elapsed 0 if the device still reports the track, or
//! drops the partial listen entirely. That loss is accepted; the flip side
//! is that a delivered listen is never re-delivered by a restart.

use crate::types::{TrackIdentity, TransportState};

/// Fallback threshold in seconds when the track duration is unknown.
const DEFAULT_THRESHOLD_SECS: u32 = 240;

/// Single-owner state machine deciding when a listen counts.
///
/// Driven exclusively by the bridge loop, one [`update`](Self::update) per
/// observation. `delivered` flips to true at most once per identity, via
/// [`mark_delivered`](Self::mark_delivered), and resets only when the
/// identity changes.
#[derive(Debug, Default)]
pub struct PlaybackTracker {
    current: Option<TrackIdentity>,
    delivered: bool,
    elapsed: u32,
    state: TransportState,
}

impl PlaybackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one status observation into the tracker.
    ///
    /// A change of identity (any field differs) resets the delivered flag
    /// and the elapsed counter. Within one identity, elapsed only ever
    /// grows: devices occasionally report stale positions, so regressions
    /// are ignored and the maximum seen value kept. A `None` elapsed
    /// leaves the counter untouched.
    pub fn update(
        &mut self,
        identity: TrackIdentity,
        state: TransportState,
        elapsed: Option<u32>,
    ) {
        if self.current.as_ref() != Some(&identity) {
            self.current = Some(identity);
            self.delivered = false;
            self.elapsed = 0;
        }

        self.state = state;
        if let Some(secs) = elapsed {
            self.elapsed = self.elapsed.max(secs);
        }
    }

    /// Elapsed seconds after which the current track qualifies.
    ///
    /// `min(240, duration / 2)` when the current identity carries a known
    /// positive duration, otherwise the fixed 240-second fallback.
    pub fn threshold(&self) -> u32 {
        match self.current.as_ref().and_then(|id| id.duration) {
            Some(duration) if duration > 0 => DEFAULT_THRESHOLD_SECS.min(duration / 2),
            _ => DEFAULT_THRESHOLD_SECS,
        }
    }

    /// Whether the current listen qualifies for delivery right now.
    ///
    /// True iff a track is set, it hasn't been delivered yet, the player
    /// is actually playing, and the threshold has been reached. Pure; the
    /// caller confirms delivery via [`mark_delivered`](Self::mark_delivered).
    pub fn should_deliver(&self) -> bool {
        if self.current.is_none() || self.delivered {
            return false;
        }
        if self.state != TransportState::Playing {
            return false;
        }
        self.elapsed >= self.threshold()
    }

    /// Record that the current listen was successfully delivered.
    ///
    /// Only call after a confirmed success. Skipping the call leaves the
    /// identity eligible, so the delivery is retried on the next
    /// qualifying tick rather than silently lost.
    pub fn mark_delivered(&mut self) {
        self.delivered = true;
    }
}
