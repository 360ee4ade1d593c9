//! Playback session: cursor, play state and adjacent-track preloading
//!
//! Every state transition takes `&mut self`, so an end-of-track advance and
//! a manual next/previous can never interleave; the owner serializes them.

use super::cache::TrackPreloadCache;
use super::fetcher::{HttpTrackFetcher, TrackFetcher, TrackHandle};
use crate::catalog::track_title;
use crate::config::PreloadConfig;
use crate::error::{Result, StreamError};
use bytes::Bytes;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const DEFAULT_VOLUME: f32 = 0.5;

/// One listener's playback state over a fixed, already shuffled track order
pub struct PlaybackSession {
    tracks: Vec<String>,
    cursor: usize,
    cache: Arc<TrackPreloadCache>,
    playing: bool,
    volume: f32,
    preloads: Vec<JoinHandle<()>>,
}

impl PlaybackSession {
    /// Create a session over `tracks`
    ///
    /// An empty catalog is reported as `NotFound` so callers can tell it
    /// apart from a catalog that could not be fetched.
    pub fn new(tracks: Vec<String>, cache: Arc<TrackPreloadCache>) -> Result<Self> {
        if tracks.is_empty() {
            return Err(StreamError::NotFound("No music files available".to_string()));
        }

        Ok(PlaybackSession {
            tracks,
            cursor: 0,
            cache,
            playing: false,
            volume: DEFAULT_VOLUME,
            preloads: Vec::new(),
        })
    }

    /// Fetch the catalog from a server and start a session over it
    pub async fn connect(config: &PreloadConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpTrackFetcher::new(config)?);
        let tracks = fetcher.fetch_catalog().await?;
        info!("Loaded catalog of {} tracks from {}", tracks.len(), config.base_url);

        let cache = Arc::new(TrackPreloadCache::new(fetcher, config.capacity));
        Self::new(tracks, cache)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[String] {
        &self.tracks
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn current_track(&self) -> &str {
        &self.tracks[self.cursor]
    }

    /// Display title of the current track
    pub fn current_title(&self) -> &str {
        track_title(self.current_track())
    }

    pub fn cache(&self) -> &Arc<TrackPreloadCache> {
        &self.cache
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Flip between playing and paused; returns the new state
    pub fn toggle_play(&mut self) -> bool {
        self.playing = !self.playing;
        self.playing
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Set the volume, clamped to 0.0..=1.0
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_nan() {
            DEFAULT_VOLUME
        } else {
            volume.clamp(0.0, 1.0)
        };
    }

    /// Make `index` (modulo the track count) the active track and start playing it
    pub async fn select(&mut self, index: usize) -> Result<TrackHandle> {
        self.cursor = index % self.tracks.len();
        self.activate().await
    }

    pub async fn next(&mut self) -> Result<TrackHandle> {
        self.cursor = (self.cursor + 1) % self.tracks.len();
        self.activate().await
    }

    pub async fn previous(&mut self) -> Result<TrackHandle> {
        let n = self.tracks.len();
        self.cursor = (self.cursor + n - 1) % n;
        self.activate().await
    }

    /// The current track finished playing: advance and keep going
    pub async fn track_ended(&mut self) -> Result<TrackHandle> {
        debug!("Track {} ended", self.current_track());
        self.next().await
    }

    /// Bytes of the current track from `offset` onwards
    ///
    /// Served from the cached handle when present, otherwise fetched with a
    /// range request.
    pub async fn seek(&self, offset: u64) -> Result<Bytes> {
        let track_id = self.current_track();
        if let Some(handle) = self.cache.get(track_id).await {
            return handle
                .slice_from(offset)
                .ok_or(StreamError::RangeNotSatisfiable { total: handle.len() });
        }

        debug!("Seek to {} in uncached track {}", offset, track_id);
        self.cache.fetcher().fetch_from(track_id, offset).await
    }

    /// Wait for all background preloads started so far
    pub async fn wait_for_preloads(&mut self) {
        for handle in self.preloads.drain(..) {
            let _ = handle.await;
        }
    }

    /// Neighbours of the cursor that get preloaded, wrapping at both ends
    pub fn neighbours(&self) -> (usize, usize) {
        let n = self.tracks.len();
        ((self.cursor + n - 1) % n, (self.cursor + 1) % n)
    }

    async fn activate(&mut self) -> Result<TrackHandle> {
        let track_id = self.tracks[self.cursor].clone();
        info!("Now playing [{}] {}", self.cursor, track_title(&track_id));

        self.preloads.retain(|h| !h.is_finished());
        let (prev, next) = self.neighbours();
        for index in [prev, next] {
            if index != self.cursor {
                let neighbour = self.tracks[index].clone();
                self.preloads.push(self.cache.spawn_warm(neighbour));
            }
        }

        let handle = self.cache.load(&track_id).await?;
        self.cache.touch(&track_id).await;
        self.playing = true;
        Ok(handle)
    }
}
