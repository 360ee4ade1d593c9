//! Integration tests for PlaybackSession: navigation, neighbour preloading,
//! and a full round trip against a live server

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tunestream::{
    MediaServer, PlaybackSession, PreloadConfig, Result, ServerConfig, StreamError, TrackFetcher,
    TrackHandle, TrackPreloadCache,
};

/// Records which tracks were fetched, in order
#[derive(Default)]
struct RecordingFetcher {
    fetched: Mutex<Vec<String>>,
}

impl RecordingFetcher {
    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackFetcher for RecordingFetcher {
    async fn fetch_track(&self, track_id: &str) -> Result<TrackHandle> {
        self.fetched.lock().unwrap().push(track_id.to_string());
        Ok(TrackHandle::new(track_id, None, Bytes::from(vec![0u8; 100])))
    }

    async fn fetch_from(&self, _track_id: &str, offset: u64) -> Result<Bytes> {
        if offset >= 100 {
            return Err(StreamError::RangeNotSatisfiable { total: 100 });
        }
        Ok(Bytes::from(vec![0u8; 100 - offset as usize]))
    }
}

fn session(n: usize, capacity: usize) -> (Arc<RecordingFetcher>, PlaybackSession) {
    let fetcher = Arc::new(RecordingFetcher::default());
    let cache = Arc::new(TrackPreloadCache::new(fetcher.clone(), capacity));
    let tracks = (0..n).map(|i| format!("t{}.mp3", i)).collect();
    (fetcher, PlaybackSession::new(tracks, cache).unwrap())
}

#[tokio::test]
async fn test_selecting_first_track_warms_last_and_second() {
    let (_fetcher, mut s) = session(5, 10);
    s.select(0).await.unwrap();
    s.wait_for_preloads().await;

    let cache = s.cache();
    assert!(cache.contains("t0.mp3").await);
    assert!(cache.contains("t1.mp3").await);
    assert!(cache.contains("t4.mp3").await);
    assert_eq!(cache.len().await, 3);
}

#[tokio::test]
async fn test_next_wraps_to_start() {
    let (_fetcher, mut s) = session(3, 10);
    s.select(2).await.unwrap();
    let handle = s.next().await.unwrap();
    assert_eq!(s.current_index(), 0);
    assert_eq!(handle.track_id, "t0.mp3");
}

#[tokio::test]
async fn test_select_index_wraps() {
    let (_fetcher, mut s) = session(3, 10);
    s.select(7).await.unwrap();
    assert_eq!(s.current_index(), 1);
    assert_eq!(s.current_title(), "t1");
}

#[tokio::test]
async fn test_preloaded_neighbour_is_not_refetched() {
    let (fetcher, mut s) = session(6, 10);
    s.select(0).await.unwrap();
    s.wait_for_preloads().await;

    s.next().await.unwrap();
    s.wait_for_preloads().await;

    let fetched = fetcher.fetched();
    let count = |id: &str| fetched.iter().filter(|f| f.as_str() == id).count();
    assert_eq!(count("t0.mp3"), 1);
    assert_eq!(count("t1.mp3"), 1);
    assert_eq!(count("t2.mp3"), 1);
}

#[tokio::test]
async fn test_small_cache_keeps_current_track() {
    let (_fetcher, mut s) = session(10, 3);
    for _ in 0..6 {
        s.next().await.unwrap();
        s.wait_for_preloads().await;
        assert!(s.cache().len().await <= 3);
    }
    assert_eq!(s.current_index(), 6);
    assert!(s.cache().contains("t6.mp3").await);
}

#[tokio::test]
async fn test_single_track_session() {
    let (fetcher, mut s) = session(1, 10);
    s.next().await.unwrap();
    s.previous().await.unwrap();
    s.wait_for_preloads().await;

    assert_eq!(s.current_index(), 0);
    assert_eq!(fetcher.fetched(), vec!["t0.mp3".to_string()]);
}

#[tokio::test]
async fn test_seek_past_end() {
    let (_fetcher, s) = session(2, 10);
    // Nothing cached yet, so this goes through the fetcher
    let bytes = s.seek(40).await.unwrap();
    assert_eq!(bytes.len(), 60);
    assert!(matches!(
        s.seek(100).await,
        Err(StreamError::RangeNotSatisfiable { total: 100 })
    ));
}

#[tokio::test]
async fn test_connect_to_live_server() {
    let media = TempDir::new().unwrap();
    for name in ["a.mp3", "b.ogg", "c.wav"] {
        std::fs::write(media.path().join(name), vec![5u8; 2000]).unwrap();
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig {
        media_root: media.path().to_path_buf(),
        ..Default::default()
    };
    let server = Arc::new(MediaServer::new(Arc::new(config)));
    tokio::spawn(server.serve(listener));

    let preload = PreloadConfig {
        capacity: 2,
        base_url: format!("http://{}", addr),
        ..Default::default()
    };
    let mut s = PlaybackSession::connect(&preload).await.unwrap();
    assert_eq!(s.len(), 3);

    let handle = s.select(0).await.unwrap();
    assert_eq!(handle.len(), 2000);
    assert!(handle.content_type.as_deref().unwrap().starts_with("audio/"));

    let tail = s.seek(1500).await.unwrap();
    assert_eq!(tail.len(), 500);
    s.wait_for_preloads().await;
    assert!(s.cache().len().await <= 2);
}

#[tokio::test]
async fn test_connect_to_empty_catalog() {
    let media = TempDir::new().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig {
        media_root: media.path().to_path_buf(),
        ..Default::default()
    };
    tokio::spawn(Arc::new(MediaServer::new(Arc::new(config))).serve(listener));

    let preload = PreloadConfig {
        base_url: format!("http://{}", addr),
        ..Default::default()
    };
    let err = PlaybackSession::connect(&preload).await.err().unwrap();
    assert!(matches!(err, StreamError::NotFound(_)));
}
