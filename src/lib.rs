pub mod bridge;
pub mod config;
pub mod device;
pub mod error;
pub mod lastfm;
pub mod notify;
pub mod queue;
pub mod tracker;
pub mod types;

pub use bridge::ScrobbleBridge;
pub use config::{Args, Config, GotifySettings, LastFmAuth, WebhookSettings};
pub use device::{parse_status, BluOsClient, StatusSource};
pub use error::ScrobbleError;
pub use lastfm::{LastFmClient, ScrobbleService};
pub use notify::{Alerter, GotifyNotifier, Notifier, Severity, WebhookNotifier};
pub use queue::{ScrobbleQueue, DEFAULT_QUEUE_CAPACITY};
pub use tracker::PlaybackTracker;
pub use types::{PlayerStatus, ScrobblePayload, TrackIdentity, TransportState};

// Re-export generated mocks for downstream tests
#[cfg(feature = "mock")]
pub use device::MockStatusSource;
#[cfg(feature = "mock")]
pub use lastfm::MockScrobbleService;

pub type Result<T> = std::result::Result<T, ScrobbleError>;
