//! Network access for the playback client

use crate::config::PreloadConfig;
use crate::error::{Result, StreamError};
use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Characters escaped inside one path segment of a track URL
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A fully downloaded track, ready to hand to a decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackHandle {
    pub track_id: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl TrackHandle {
    pub fn new(track_id: impl Into<String>, content_type: Option<String>, data: Bytes) -> Self {
        TrackHandle {
            track_id: track_id.into(),
            content_type,
            data,
        }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes from `offset` to the end, or `None` when `offset` is past the end
    pub fn slice_from(&self, offset: u64) -> Option<Bytes> {
        if offset >= self.len() {
            return None;
        }
        Some(self.data.slice(offset as usize..))
    }
}

/// Source of track bodies for the preload cache and the playback session
#[async_trait]
pub trait TrackFetcher: Send + Sync {
    /// Download a whole track
    async fn fetch_track(&self, track_id: &str) -> Result<TrackHandle>;

    /// Download a track from `offset` to its end
    async fn fetch_from(&self, track_id: &str, offset: u64) -> Result<Bytes>;
}

/// Fetches tracks and the catalog from a tunestream server over HTTP
pub struct HttpTrackFetcher {
    client: Client,
    base_url: String,
    media_prefix: String,
}

impl HttpTrackFetcher {
    /// Create a fetcher from the preload section of the configuration
    pub fn new(config: &PreloadConfig) -> Result<Self> {
        Self::with_timeout(&config.base_url, config.fetch_timeout())
    }

    /// Create a fetcher for `base_url` with a custom timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| StreamError::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpTrackFetcher {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            media_prefix: "/music/".to_string(),
        })
    }

    /// Serve media from a different URL prefix than `/music/`
    pub fn with_media_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.media_prefix = prefix.into();
        self
    }

    /// URL of a track, escaping each path segment
    pub fn track_url(&self, track_id: &str) -> String {
        let encoded: Vec<String> = track_id
            .split('/')
            .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
            .collect();
        format!("{}{}{}", self.base_url, self.media_prefix, encoded.join("/"))
    }

    /// Fetch the track listing from `/api/music`
    ///
    /// An empty catalog is `Ok(vec![])`; transport failures, non-success
    /// statuses and unparsable bodies are `CatalogUnavailable`.
    pub async fn fetch_catalog(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/music", self.base_url);
        debug!("Fetching catalog from {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("Catalog request failed for url={}: {}", url, e);
            StreamError::CatalogUnavailable(format!("request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Catalog request returned status={} for url={}", status, url);
            return Err(StreamError::CatalogUnavailable(format!(
                "server returned {}",
                status
            )));
        }

        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| StreamError::CatalogUnavailable(format!("invalid catalog body: {}", e)))
    }
}

#[async_trait]
impl TrackFetcher for HttpTrackFetcher {
    async fn fetch_track(&self, track_id: &str) -> Result<TrackHandle> {
        let url = self.track_url(track_id);
        debug!("Fetching track {} from {}", track_id, url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("Track request failed for url={}: {}", url, e);
            StreamError::fetch_failure(track_id, format!("request failed: {}", e))
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StreamError::NotFound(track_id.to_string()));
        }
        if !status.is_success() {
            return Err(StreamError::fetch_failure(
                track_id,
                format!("unexpected status {}", status),
            ));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let data = response.bytes().await.map_err(|e| {
            StreamError::fetch_failure(track_id, format!("failed to read body: {}", e))
        })?;

        debug!("Fetched track {} ({} bytes)", track_id, data.len());
        Ok(TrackHandle::new(track_id, content_type, data))
    }

    async fn fetch_from(&self, track_id: &str, offset: u64) -> Result<Bytes> {
        let url = self.track_url(track_id);
        let range_header = format!("bytes={}-", offset);
        debug!("Fetching {} of track {}", range_header, track_id);

        let response = self
            .client
            .get(&url)
            .header("Range", range_header)
            .send()
            .await
            .map_err(|e| StreamError::fetch_failure(track_id, format!("request failed: {}", e)))?;

        let status = response.status();
        match status {
            StatusCode::PARTIAL_CONTENT => {
                let content_range = response
                    .headers()
                    .get("content-range")
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        StreamError::fetch_failure(track_id, "206 response without Content-Range")
                    })?;
                let start = content_range_start(content_range)?;
                if start != offset {
                    return Err(StreamError::fetch_failure(
                        track_id,
                        format!("Content-Range mismatch: asked {}, got {}", offset, content_range),
                    ));
                }
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                let total = response
                    .headers()
                    .get("content-range")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("bytes */"))
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(0);
                return Err(StreamError::RangeNotSatisfiable { total });
            }
            StatusCode::NOT_FOUND => return Err(StreamError::NotFound(track_id.to_string())),
            s if s.is_success() => {
                // Server ignored the range; cut the window out ourselves.
                let body = response.bytes().await.map_err(|e| {
                    StreamError::fetch_failure(track_id, format!("failed to read body: {}", e))
                })?;
                if offset >= body.len() as u64 {
                    return Err(StreamError::RangeNotSatisfiable {
                        total: body.len() as u64,
                    });
                }
                return Ok(body.slice(offset as usize..));
            }
            other => {
                return Err(StreamError::fetch_failure(
                    track_id,
                    format!("unexpected status {}", other),
                ))
            }
        }

        response
            .bytes()
            .await
            .map_err(|e| StreamError::fetch_failure(track_id, format!("failed to read body: {}", e)))
    }
}

/// Parse the start offset of a `Content-Range: bytes <start>-<end>/<total>` value
fn content_range_start(value: &str) -> Result<u64> {
    value
        .trim()
        .strip_prefix("bytes ")
        .and_then(|rest| rest.split_once('-'))
        .and_then(|(start, _)| start.trim().parse::<u64>().ok())
        .ok_or_else(|| StreamError::ParseError(format!("invalid Content-Range: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_url_escapes_segments() {
        let fetcher = HttpTrackFetcher::with_timeout("http://host:3000/", Duration::from_secs(1))
            .unwrap();
        assert_eq!(
            fetcher.track_url("My Album/01 #1 hit.mp3"),
            "http://host:3000/music/My%20Album/01%20%231%20hit.mp3"
        );
    }

    #[test]
    fn test_custom_media_prefix() {
        let fetcher = HttpTrackFetcher::with_timeout("http://host", Duration::from_secs(1))
            .unwrap()
            .with_media_prefix("/audio/");
        assert_eq!(fetcher.track_url("a.ogg"), "http://host/audio/a.ogg");
    }

    #[test]
    fn test_content_range_start() {
        assert_eq!(content_range_start("bytes 100-199/200").unwrap(), 100);
        assert!(content_range_start("bytes */200").is_err());
        assert!(content_range_start("items 1-2/3").is_err());
    }

    #[test]
    fn test_handle_slice_from() {
        let handle = TrackHandle::new("a.mp3", None, Bytes::from_static(b"0123456789"));
        assert_eq!(handle.slice_from(7).unwrap(), Bytes::from_static(b"789"));
        assert_eq!(handle.slice_from(0).unwrap().len(), 10);
        assert!(handle.slice_from(10).is_none());
    }
}
