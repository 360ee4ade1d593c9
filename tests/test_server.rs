//! End-to-end tests: a real MediaServer on a loopback port, driven with reqwest

use reqwest::{Client, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tunestream::{MediaServer, ServerConfig};

struct TestServer {
    addr: SocketAddr,
    server: Arc<MediaServer>,
    _media: TempDir,
    _docs: TempDir,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn start(shuffle: bool, with_favicon: bool) -> TestServer {
    let media = TempDir::new().unwrap();
    std::fs::write(media.path().join("one.mp3"), vec![1u8; 5000]).unwrap();
    std::fs::create_dir(media.path().join("My Album")).unwrap();
    std::fs::write(media.path().join("My Album").join("two.flac"), vec![2u8; 300]).unwrap();
    std::fs::write(media.path().join("notes.txt"), b"liner notes").unwrap();

    let docs = TempDir::new().unwrap();
    std::fs::write(docs.path().join("index.html"), b"<html>player</html>").unwrap();
    std::fs::write(docs.path().join("app.js"), b"console.log('hi')").unwrap();
    if with_favicon {
        std::fs::write(docs.path().join("favicon.ico"), vec![0u8; 16]).unwrap();
    }

    let config = ServerConfig {
        listen_address: "127.0.0.1:0".to_string(),
        media_root: media.path().to_path_buf(),
        document_root: docs.path().to_path_buf(),
        shuffle_catalog: shuffle,
        ..Default::default()
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(MediaServer::new(Arc::new(config)));
    tokio::spawn(Arc::clone(&server).serve(listener));

    TestServer {
        addr,
        server,
        _media: media,
        _docs: docs,
    }
}

#[tokio::test]
async fn test_catalog_listing() {
    let server = start(false, false).await;
    let response = Client::new().get(server.url("/api/music")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    assert_eq!(
        response.headers()["cache-control"].to_str().unwrap(),
        "public, max-age=300"
    );
    let tracks: Vec<String> = response.json().await.unwrap();
    assert_eq!(tracks, vec!["My Album/two.flac", "one.mp3"]);
}

#[tokio::test]
async fn test_shuffled_catalog_is_a_permutation() {
    let server = start(true, false).await;
    let mut tracks: Vec<String> = Client::new()
        .get(server.url("/api/music"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    tracks.sort();
    assert_eq!(tracks, vec!["My Album/two.flac", "one.mp3"]);
}

#[tokio::test]
async fn test_media_range_request() {
    let server = start(false, false).await;
    let response = Client::new()
        .get(server.url("/music/one.mp3"))
        .header("Range", "bytes=0-1023")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers()["content-range"].to_str().unwrap(),
        "bytes 0-1023/5000"
    );
    assert_eq!(response.bytes().await.unwrap().len(), 1024);
}

#[tokio::test]
async fn test_media_percent_encoded_path() {
    let server = start(false, false).await;
    let response = Client::new()
        .get(server.url("/music/My%20Album/two.flac"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "audio/flac"
    );
    assert_eq!(response.bytes().await.unwrap().len(), 300);
}

#[tokio::test]
async fn test_media_revalidation() {
    let server = start(false, false).await;
    let client = Client::new();

    let first = client.get(server.url("/music/one.mp3")).send().await.unwrap();
    let etag = first.headers()["etag"].to_str().unwrap().to_string();

    let second = client
        .get(server.url("/music/one.mp3"))
        .header("If-None-Match", &etag)
        .header("Range", "bytes=0-10")
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    assert!(second.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_media_unsatisfiable_range() {
    let server = start(false, false).await;
    let response = Client::new()
        .get(server.url("/music/one.mp3"))
        .header("Range", "bytes=6000-")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        response.headers()["content-range"].to_str().unwrap(),
        "bytes */5000"
    );
}

#[tokio::test]
async fn test_media_not_found() {
    let server = start(false, false).await;
    let client = Client::new();
    for path in ["/music/missing.mp3", "/music/My%20Album", "/music/..%2F..%2Fetc%2Fpasswd"] {
        let response = client.get(server.url(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", path);
    }
}

#[tokio::test]
async fn test_index_and_static_files() {
    let server = start(false, false).await;
    let client = Client::new();

    let index = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(index.status(), StatusCode::OK);
    assert_eq!(
        index.headers()["content-type"].to_str().unwrap(),
        "text/html; charset=utf-8"
    );
    assert_eq!(
        index.headers()["cache-control"].to_str().unwrap(),
        "public, max-age=3600"
    );
    assert_eq!(index.text().await.unwrap(), "<html>player</html>");

    let script = client.get(server.url("/app.js")).send().await.unwrap();
    assert_eq!(script.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_favicon_fallback() {
    let missing = start(false, false).await;
    let response = Client::new().get(missing.url("/favicon.ico")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let present = start(false, true).await;
    let response = Client::new().get(present.url("/favicon.ico")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.bytes().await.unwrap().len(), 16);
}

#[tokio::test]
async fn test_head_request() {
    let server = start(false, false).await;
    let response = Client::new().head(server.url("/music/one.mp3")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-length"].to_str().unwrap(), "5000");
}

#[tokio::test]
async fn test_method_not_allowed() {
    let server = start(false, false).await;
    let response = Client::new()
        .post(server.url("/music/one.mp3"))
        .body("x")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["allow"].to_str().unwrap(), "GET, HEAD");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = start(false, false).await;
    let client = Client::new();

    client
        .get(server.url("/music/one.mp3"))
        .header("Range", "bytes=0-99")
        .send()
        .await
        .unwrap();
    client.get(server.url("/music/nope.mp3")).send().await.unwrap();

    let text = client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains("tunestream_partial_responses_total 1"));
    assert!(text.contains("tunestream_not_found_responses_total 1"));

    let stats = server.server.metrics().get_stats();
    assert!(stats.total_requests >= 3);
    assert!(stats.bytes_served >= 100);
}
