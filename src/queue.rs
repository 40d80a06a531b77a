//! Persistent, capacity-capped scrobble queue.
//!
//! Pending scrobbles are kept on disk as a JSON array so plays survive
//! network outages and process restarts. The queue is bounded: at capacity
//! the oldest entry is dropped to make room, so enqueueing always
//! succeeds. Every mutation rewrites the file through a temp-file rename,
//! which keeps the on-disk copy whole even if the process dies mid-write.
//!
//! A corrupt or unreadable file at load time is not fatal; the queue just
//! starts empty.

use crate::types::ScrobblePayload;
use crate::Result;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Default maximum number of queued scrobbles.
pub const DEFAULT_QUEUE_CAPACITY: usize = 500;

/// Ordered, disk-backed queue of pending scrobbles.
///
/// One lock guards both the in-memory deque and the persistence write, so
/// the queue is safe to share even though the bridge itself is
/// single-threaded.
#[derive(Debug)]
pub struct ScrobbleQueue {
    path: PathBuf,
    capacity: usize,
    items: Mutex<VecDeque<ScrobblePayload>>,
}

impl ScrobbleQueue {
    /// Open the queue at `path`, loading any previously persisted entries.
    ///
    /// A missing file means an empty queue. An unparsable file is logged
    /// and discarded; losing a corrupt backlog beats refusing to start.
    /// Only the newest `capacity` records survive a reload.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let items = Self::load(&path, capacity);
        Self {
            path,
            capacity,
            items: Mutex::new(items),
        }
    }

    fn load(path: &Path, capacity: usize) -> VecDeque<ScrobblePayload> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No queue file at {}; starting empty", path.display());
                return VecDeque::new();
            }
            Err(e) => {
                log::warn!("Failed to read queue file {}: {e}", path.display());
                return VecDeque::new();
            }
        };

        match serde_json::from_str::<Vec<ScrobblePayload>>(&raw) {
            Ok(mut entries) => {
                if entries.len() > capacity {
                    entries.drain(..entries.len() - capacity);
                }
                entries.into()
            }
            Err(e) => {
                log::warn!(
                    "Queue file {} is corrupt ({e}); starting empty",
                    path.display()
                );
                VecDeque::new()
            }
        }
    }

    /// Append a payload at the tail, evicting the oldest entry when full.
    ///
    /// The full sequence is persisted before this returns; a crash right
    /// after a successful enqueue cannot lose the item. Persistence
    /// failures propagate, since silently dropping the durability
    /// guarantee would be worse than failing loudly.
    pub fn enqueue(&self, payload: ScrobblePayload) -> Result<()> {
        let mut items = self.items.lock().expect("queue lock poisoned");
        if items.len() >= self.capacity {
            items.pop_front();
        }
        items.push_back(payload);
        self.persist(&items)
    }

    /// Reinsert a payload at the head of the queue.
    ///
    /// Used to put back an item whose redelivery attempt failed, keeping
    /// it first in line and leaving the rest of the backlog untouched.
    pub fn requeue_front(&self, payload: ScrobblePayload) -> Result<()> {
        let mut items = self.items.lock().expect("queue lock poisoned");
        if items.len() >= self.capacity {
            items.pop_back();
        }
        items.push_front(payload);
        self.persist(&items)
    }

    /// Pop the oldest payload, persisting the shrunk queue before
    /// returning it.
    ///
    /// Persisting per pop (not per batch) means a crash mid-drain loses at
    /// most the one item currently in flight, never the on-disk remainder.
    pub fn pop_front(&self) -> Result<Option<ScrobblePayload>> {
        let mut items = self.items.lock().expect("queue lock poisoned");
        let popped = items.pop_front();
        if popped.is_some() {
            self.persist(&items)?;
        }
        Ok(popped)
    }

    /// Lazily drain the queue oldest-first.
    ///
    /// Each step pops one item (persisting as it goes). The iterator is
    /// finite and non-restartable; a caller that stops early must
    /// [`requeue_front`](Self::requeue_front) the item it failed to
    /// redeliver.
    pub fn drain_iter(&self) -> Drain<'_> {
        Drain { queue: self }
    }

    /// Current number of queued payloads.
    pub fn size(&self) -> usize {
        self.items.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn persist(&self, items: &VecDeque<ScrobblePayload>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Atomic replace: write the sibling temp file, then rename over
        // the canonical path.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let json = serde_json::to_string(items)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Oldest-first draining iterator returned by
/// [`ScrobbleQueue::drain_iter`].
pub struct Drain<'a> {
    queue: &'a ScrobbleQueue,
}

impl Iterator for Drain<'_> {
    type Item = Result<ScrobblePayload>;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop_front().transpose()
    }
}
