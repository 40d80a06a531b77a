//! The bridge control loop.
//!
//! One tick: fetch a status snapshot, feed the tracker, push a
//! best-effort "now playing" update, and deliver the scrobble the moment
//! the tracker says the listen qualifies. Failed deliveries land in the
//! durable queue; the queue is drained oldest-first after every
//! successful foreground delivery, and only then. Each success doubling
//! as the backlog's recovery opportunity means there is no separate
//! retry timer to hammer a service that is still down.

use crate::device::StatusSource;
use crate::error::ScrobbleError;
use crate::lastfm::ScrobbleService;
use crate::notify::{Alerter, Severity};
use crate::queue::ScrobbleQueue;
use crate::tracker::PlaybackTracker;
use crate::types::{ScrobblePayload, TransportState};
use crate::Result;
use chrono::Utc;
use serde_json::json;
use std::time::Duration;

/// Polls a player and delivers completed listens to the tracking service.
pub struct ScrobbleBridge<S: StatusSource, C: ScrobbleService> {
    status_source: S,
    service: C,
    tracker: PlaybackTracker,
    queue: ScrobbleQueue,
    alerter: Alerter,
    poll_interval: Duration,
}

impl<S: StatusSource, C: ScrobbleService> ScrobbleBridge<S, C> {
    pub fn new(
        status_source: S,
        service: C,
        queue: ScrobbleQueue,
        alerter: Alerter,
        poll_interval: Duration,
    ) -> Self {
        Self {
            status_source,
            service,
            tracker: PlaybackTracker::new(),
            queue,
            alerter,
            poll_interval,
        }
    }

    /// The retry queue, for inspection.
    pub fn queue(&self) -> &ScrobbleQueue {
        &self.queue
    }

    /// Run the poll loop until the process is terminated.
    ///
    /// Tick errors are logged and absorbed; nothing that happens during a
    /// tick may kill the loop.
    pub async fn run(&mut self) {
        log::info!(
            "Bridge running; poll interval {}s, queue size {}",
            self.poll_interval.as_secs(),
            self.queue.size()
        );

        loop {
            if let Err(e) = self.tick().await {
                log::warn!("Tick failed: {e}");
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Execute one full poll cycle.
    ///
    /// Public so tests (and manual tooling) can drive the bridge tick by
    /// tick without the sleep in between.
    pub async fn tick(&mut self) -> Result<()> {
        let status = match self.status_source.fetch().await {
            Ok(status) => status,
            Err(e) => {
                // Player unreachable or talking garbage; try again next tick
                log::warn!("Status fetch failed: {e}");
                return Ok(());
            }
        };

        log::debug!(
            "Status: state={:?} artist={:?} title={:?} elapsed={:?} duration={:?}",
            status.state,
            status.artist,
            status.title,
            status.elapsed,
            status.duration
        );

        self.tracker
            .update(status.identity(), status.state, status.elapsed);

        if status.state != TransportState::Playing {
            return Ok(());
        }
        let (Some(artist), Some(title)) = (status.artist.as_deref(), status.title.as_deref())
        else {
            log::debug!("Playing without artist/title metadata; skipping");
            return Ok(());
        };

        if let Err(e) = self
            .service
            .update_now_playing(artist, title, status.album.as_deref(), status.duration)
            .await
        {
            log::debug!("Now playing update failed: {e}");
        }

        if !self.tracker.should_deliver() {
            return Ok(());
        }

        // Anchor the scrobble at when the listen started, so a payload
        // that ends up queued keeps the same timestamp across retries
        let elapsed = status.elapsed.unwrap_or(0);
        let payload = ScrobblePayload {
            artist: artist.to_string(),
            title: title.to_string(),
            album: status.album.clone(),
            duration: status.duration,
            timestamp: Utc::now().timestamp() - i64::from(elapsed),
        };

        match self.service.scrobble(&payload).await {
            Ok(()) => {
                self.tracker.mark_delivered();
                log::info!(
                    "Scrobbled: {} - {}{}",
                    payload.artist,
                    payload.title,
                    payload
                        .album
                        .as_deref()
                        .map(|album| format!(" [{album}]"))
                        .unwrap_or_default()
                );
                self.drain_backlog().await?;
            }
            Err(ScrobbleError::Auth(message)) => {
                // Retrying with bad credentials is pointless; don't queue
                log::error!("Scrobble failed (auth): {message}");
                self.alerter
                    .alert(
                        Severity::Error,
                        "Last.fm authentication failed",
                        &message,
                        Some(&payload_context(&payload)),
                    )
                    .await;
            }
            Err(ScrobbleError::RateLimit { retry_after }) => {
                self.queue.enqueue(payload)?;
                log::info!(
                    "Rate limited (retry after {retry_after}s); queued scrobble. queue={}",
                    self.queue.size()
                );
            }
            Err(ScrobbleError::Http(message)) => {
                self.queue.enqueue(payload)?;
                log::info!(
                    "Network error ({message}); queued scrobble. queue={}",
                    self.queue.size()
                );
            }
            Err(e) => {
                let context = payload_context(&payload);
                self.queue.enqueue(payload)?;
                log::warn!(
                    "Unexpected Last.fm error: {e}; queued scrobble. queue={}",
                    self.queue.size()
                );
                self.alerter
                    .alert(
                        Severity::Warning,
                        "Last.fm scrobble error",
                        &e.to_string(),
                        Some(&context),
                    )
                    .await;
            }
        }

        Ok(())
    }

    /// Retry queued scrobbles oldest-first, stopping at the first failure.
    ///
    /// A failed item goes back to the front of the queue so the backlog
    /// keeps its order for the next opportunity.
    async fn drain_backlog(&mut self) -> Result<()> {
        let mut drained = 0usize;

        for item in self.queue.drain_iter() {
            let payload = item?;
            match self.service.scrobble(&payload).await {
                Ok(()) => drained += 1,
                Err(ScrobbleError::Auth(message)) => {
                    self.queue.requeue_front(payload)?;
                    log::error!("Auth failure while draining: {message}");
                    self.alerter
                        .alert(
                            Severity::Error,
                            "Last.fm auth error while draining",
                            &message,
                            Some(&json!({ "pending_queue_size": self.queue.size() })),
                        )
                        .await;
                    break;
                }
                Err(e) => {
                    self.queue.requeue_front(payload)?;
                    log::info!("Draining paused: {e}; queue size={}", self.queue.size());
                    break;
                }
            }
        }

        if drained > 0 {
            log::info!(
                "Drained {drained} cached scrobbles. Queue size now {}",
                self.queue.size()
            );
        }
        Ok(())
    }
}

fn payload_context(payload: &ScrobblePayload) -> serde_json::Value {
    serde_json::to_value(payload).unwrap_or_else(|_| json!({}))
}
