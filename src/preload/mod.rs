//! Client-side track preloading
//!
//! - [`fetcher`]: HTTP access to the server's catalog and media routes
//! - [`cache`]: the bounded, deduplicating preload cache
//! - [`session`]: cursor and play state driving the cache

pub mod cache;
pub mod fetcher;
pub mod session;

pub use cache::{PreloadStats, TrackPreloadCache};
pub use fetcher::{HttpTrackFetcher, TrackFetcher, TrackHandle};
pub use session::PlaybackSession;
