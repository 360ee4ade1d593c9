//! Bounded cache of preloaded tracks
//!
//! Entries carry a recency stamp from a monotonically increasing clock. When
//! an insertion pushes the cache over capacity, the entry with the oldest
//! stamp is evicted (ties broken by insertion order). Fetches are
//! deduplicated per track: while one is running, further requests for the
//! same track wait on its outcome instead of starting another.

use super::fetcher::{TrackFetcher, TrackHandle};
use crate::error::{Result, StreamError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Outcome published to callers waiting on an in-flight fetch.
/// `None` while running, `Some(success)` once finished.
type FetchOutcome = Option<bool>;

#[derive(Debug)]
struct PreloadEntry {
    handle: TrackHandle,
    last_touched: u64,
    inserted: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, PreloadEntry>,
    in_flight: HashMap<String, watch::Receiver<FetchOutcome>>,
    clock: u64,
    insert_seq: u64,
    hits: u64,
    misses: u64,
    fetches: u64,
    failures: u64,
    evictions: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn insert(&mut self, track_id: &str, handle: TrackHandle, capacity: usize) {
        let stamp = self.tick();
        self.insert_seq += 1;
        self.entries.insert(
            track_id.to_string(),
            PreloadEntry {
                handle,
                last_touched: stamp,
                inserted: self.insert_seq,
            },
        );

        while self.entries.len() > capacity {
            let victim = self
                .entries
                .iter()
                .min_by_key(|(_, e)| (e.last_touched, e.inserted))
                .map(|(id, _)| id.clone());

            match victim {
                Some(id) => {
                    self.entries.remove(&id);
                    self.evictions += 1;
                    debug!("Evicted least recently touched track {}", id);
                }
                None => break,
            }
        }
    }
}

enum Claim {
    Present,
    Attach(watch::Receiver<FetchOutcome>),
    Owner(watch::Sender<FetchOutcome>),
}

/// Preload cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadStats {
    pub entries: usize,
    pub capacity: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub failures: u64,
    pub evictions: u64,
}

/// LRU-bounded cache of ready-to-play tracks, owned by one playback session
pub struct TrackPreloadCache {
    fetcher: Arc<dyn TrackFetcher>,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl TrackPreloadCache {
    /// Create a cache holding at most `capacity` tracks (at least one)
    pub fn new(fetcher: Arc<dyn TrackFetcher>, capacity: usize) -> Self {
        TrackPreloadCache {
            fetcher,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn fetcher(&self) -> &Arc<dyn TrackFetcher> {
        &self.fetcher
    }

    /// Cached handle for `track_id`; never triggers a fetch
    pub async fn get(&self, track_id: &str) -> Option<TrackHandle> {
        let mut state = self.state.lock().await;
        match state.entries.get(track_id).map(|e| e.handle.clone()) {
            Some(handle) => {
                state.hits += 1;
                Some(handle)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Mark `track_id` as most recently used; returns false if it is not cached
    pub async fn touch(&self, track_id: &str) -> bool {
        let mut state = self.state.lock().await;
        let stamp = state.tick();
        match state.entries.get_mut(track_id) {
            Some(entry) => {
                entry.last_touched = stamp;
                true
            }
            None => false,
        }
    }

    pub async fn contains(&self, track_id: &str) -> bool {
        self.state.lock().await.entries.contains_key(track_id)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Preload `track_id` unless it is cached or already being fetched
    ///
    /// Never fails: a fetch error is logged and swallowed, since preloading
    /// only hides latency.
    pub async fn warm(&self, track_id: &str) {
        if let Err(e) = self.fetch_shared(track_id).await {
            if e.is_transient() {
                warn!("Preload of {} failed: {}", track_id, e);
            } else {
                warn!("Preload of {} failed permanently: {}", track_id, e);
            }
        }
    }

    /// Fire-and-forget variant of [`warm`](Self::warm)
    pub fn spawn_warm(self: &Arc<Self>, track_id: impl Into<String>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let track_id = track_id.into();
        tokio::spawn(async move { cache.warm(&track_id).await })
    }

    /// Return the track from the cache, fetching (and caching) it when absent
    ///
    /// Unlike `warm`, errors are returned: this is the path for the track that
    /// is about to play.
    pub async fn load(&self, track_id: &str) -> Result<TrackHandle> {
        if let Some(handle) = self.get(track_id).await {
            return Ok(handle);
        }

        self.fetch_shared(track_id).await?;

        let mut state = self.state.lock().await;
        if let Some(entry) = state.entries.get(track_id) {
            return Ok(entry.handle.clone());
        }
        drop(state);

        // Evicted between insertion and now; fetch directly.
        let handle = self.fetcher.fetch_track(track_id).await?;
        state = self.state.lock().await;
        state.fetches += 1;
        state.insert(track_id, handle.clone(), self.capacity);
        Ok(handle)
    }

    pub async fn stats(&self) -> PreloadStats {
        let state = self.state.lock().await;
        PreloadStats {
            entries: state.entries.len(),
            capacity: self.capacity,
            in_flight: state.in_flight.len(),
            hits: state.hits,
            misses: state.misses,
            fetches: state.fetches,
            failures: state.failures,
            evictions: state.evictions,
        }
    }

    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
    }

    /// Make sure `track_id` is cached, running at most one fetch for it
    ///
    /// The caller that runs the fetch gets its error verbatim; callers that
    /// attached to it get an `UpstreamFetchFailure` if it failed.
    async fn fetch_shared(&self, track_id: &str) -> Result<()> {
        loop {
            match self.claim(track_id).await {
                Claim::Present => return Ok(()),
                Claim::Attach(mut rx) => {
                    let outcome = match rx.wait_for(|o| o.is_some()).await {
                        Ok(outcome) => *outcome,
                        Err(_) => None,
                    };
                    match outcome {
                        Some(true) => return Ok(()),
                        Some(false) => {
                            return Err(StreamError::fetch_failure(
                                track_id,
                                "shared fetch failed",
                            ))
                        }
                        // Owner went away without finishing; try again.
                        None => continue,
                    }
                }
                Claim::Owner(tx) => return self.run_fetch(track_id, tx).await,
            }
        }
    }

    async fn claim(&self, track_id: &str) -> Claim {
        let mut state = self.state.lock().await;
        if state.entries.contains_key(track_id) {
            return Claim::Present;
        }

        if let Some(rx) = state.in_flight.get(track_id) {
            // A closed channel means the owner was dropped mid-fetch.
            if rx.has_changed().is_ok() {
                debug!("Attaching to in-flight fetch of {}", track_id);
                return Claim::Attach(rx.clone());
            }
        }

        let (tx, rx) = watch::channel(None);
        state.in_flight.insert(track_id.to_string(), rx);
        Claim::Owner(tx)
    }

    async fn run_fetch(&self, track_id: &str, tx: watch::Sender<FetchOutcome>) -> Result<()> {
        let result = self.fetcher.fetch_track(track_id).await;

        let mut state = self.state.lock().await;
        state.in_flight.remove(track_id);
        state.fetches += 1;
        let outcome = match result {
            Ok(handle) => {
                debug!("Cached track {} ({} bytes)", track_id, handle.len());
                state.insert(track_id, handle, self.capacity);
                Ok(())
            }
            Err(e) => {
                state.failures += 1;
                Err(e)
            }
        };
        drop(state);

        tx.send_replace(Some(outcome.is_ok()));
        outcome
    }
}
