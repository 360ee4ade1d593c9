//! tunestream
//!
//! A small music streaming server with range-aware media delivery, plus the
//! client-side preload cache used by its player.
//!
//! # Overview
//!
//! The server lists the audio files under a media root at `/api/music` and
//! serves them under `/music/`. Media responses support HTTP Range requests
//! (a single `bytes=start-end` range), conditional revalidation with
//! `If-None-Match`, and long-lived caching headers. Everything else is served
//! from a document root with short-lived caching.
//!
//! On the client side, [`PlaybackSession`] walks a shuffled track order and
//! keeps the neighbours of the current track warm in a bounded
//! [`TrackPreloadCache`], so skipping forward or backward starts playback
//! without waiting for the network.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tunestream::{MediaServer, ServerConfig};
//!
//! # async fn run() -> tunestream::Result<()> {
//! let config = ServerConfig::from_file("tunestream.yaml")?;
//! let server = Arc::new(MediaServer::new(Arc::new(config)));
//! server.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`ContentTypeResolver`]: maps audio file extensions to MIME types
//! - [`AssetTypeResolver`]: the same, widened to player page assets
//! - [`ConditionalCacheValidator`]: compares `If-None-Match` to the current entity tag
//! - [`RangeRequestPlanner`]: turns a `Range` header into a serving decision
//! - [`MediaResponder`]: builds 200/206/304/404/416 responses for files
//! - [`CatalogLister`]: enumerates the audio files of the media root
//! - [`MediaServer`]: the HTTP front end routing to all of the above
//! - [`TrackPreloadCache`] and [`PlaybackSession`]: client-side preloading
//!
//! # Configuration
//!
//! ```yaml
//! listen_address: "127.0.0.1:3000"
//! media_root: "music"
//! media_url_prefix: "/music/"
//! audio_max_age_secs: 31536000
//! preload:
//!   capacity: 10
//!   base_url: "http://127.0.0.1:3000"
//! ```
//!
//! See [`ServerConfig`] for every option.

pub mod catalog;
pub mod config;
pub mod content_type;
pub mod error;
pub mod media_responder;
pub mod metrics;
pub mod models;
pub mod preload;
pub mod range_planner;
pub mod server;
pub mod validator;

// Re-export commonly used types
pub use catalog::{track_title, CatalogLister};
pub use config::{PreloadConfig, ServerConfig};
pub use content_type::{AssetTypeResolver, ContentTypeResolver};
pub use error::{Result, StreamError};
pub use media_responder::{CachePolicy, MediaBody, MediaResponder, MediaResponse, ServeProfile};
pub use metrics::{MediaMetrics, MetricsSnapshot};
pub use models::{ByteRange, Fingerprint, ResourceMetadata};
pub use preload::{
    HttpTrackFetcher, PlaybackSession, PreloadStats, TrackFetcher, TrackHandle, TrackPreloadCache,
};
pub use range_planner::{PlanResult, RangeRequestPlanner};
pub use server::MediaServer;
pub use validator::{ConditionalCacheValidator, Validation};
