//! HTTP front end
//!
//! Routes requests to the catalog listing, the media responder and the
//! static file responder, and serves every connection with hyper's HTTP/1
//! server on its own task.

use crate::catalog::CatalogLister;
use crate::config::ServerConfig;
use crate::error::{Result, StreamError};
use crate::media_responder::{
    empty_body, full_body, plain_response, CachePolicy, MediaResponder, MediaResponse,
};
use crate::metrics::{format_prometheus_metrics, MediaMetrics};
use http::header::{ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use http::request::Parts;
use http::{HeaderMap, Method, Request, Response, StatusCode};
use hyper::body::Body as _;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

const CATALOG_ROUTE: &str = "/api/music";
const METRICS_ROUTE: &str = "/metrics";
const FAVICON_ROUTE: &str = "/favicon.ico";
const INDEX_FILE: &str = "index.html";

/// The media server: configuration, responders and metrics shared by all connections
pub struct MediaServer {
    config: Arc<ServerConfig>,
    media: MediaResponder,
    static_files: MediaResponder,
    catalog: CatalogLister,
    metrics: Arc<MediaMetrics>,
}

impl MediaServer {
    /// Create a server from a validated configuration
    pub fn new(config: Arc<ServerConfig>) -> Self {
        let policy = CachePolicy {
            audio_max_age_secs: config.audio_max_age_secs,
            static_max_age_secs: config.static_max_age_secs,
        };

        MediaServer {
            media: MediaResponder::for_media(&config.media_root, policy),
            static_files: MediaResponder::for_static(&config.document_root, policy),
            catalog: CatalogLister::new(&config.media_root),
            metrics: Arc::new(MediaMetrics::new()),
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MediaMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        info!("Media server listening on http://{}", addr);

        tokio::select! {
            result = Arc::clone(&self).serve(listener) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                Ok(())
            }
        }
    }

    /// Accept connections from `listener` forever
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = Arc::clone(&self);

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let server = Arc::clone(&server);
                    async move {
                        let (parts, _body) = req.into_parts();
                        Ok::<_, std::convert::Infallible>(server.handle(&parts).await)
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Connection error from {}: {}", peer_addr, err);
                }
            });
        }
    }

    /// Route one request and produce its response
    ///
    /// Request bodies are never read, so only the head is needed.
    pub async fn handle(&self, req: &Parts) -> MediaResponse {
        self.metrics.record_request();

        let method = &req.method;
        let path = req.uri.path();

        let response = if *method != Method::GET && *method != Method::HEAD {
            method_not_allowed()
        } else {
            self.route(method, path, &req.headers).await
        };

        let status = response.status();
        self.metrics
            .record_response(status.as_u16(), served_bytes(method, &response));

        info!("{} {} -> {}", method, path, status.as_u16());
        response
    }

    async fn route(&self, method: &Method, path: &str, headers: &HeaderMap) -> MediaResponse {
        if path == CATALOG_ROUTE {
            return self.catalog_response().await;
        }

        if path == METRICS_ROUTE && self.config.metrics_enabled {
            return metrics_response(&self.metrics);
        }

        if let Some(rest) = path.strip_prefix(self.config.media_url_prefix.as_str()) {
            return match decode_path(rest) {
                Ok(decoded) => self.media.respond(method, headers, &decoded).await,
                Err(e) => {
                    debug!("Undecodable media path {}: {}", path, e);
                    plain_response(StatusCode::NOT_FOUND, "File not found")
                }
            };
        }

        if path == FAVICON_ROUTE {
            let response = self.static_files.respond(method, headers, "favicon.ico").await;
            if response.status() == StatusCode::NOT_FOUND {
                return no_content();
            }
            return response;
        }

        if path == "/" {
            return self.static_files.respond(method, headers, INDEX_FILE).await;
        }

        match decode_path(path) {
            Ok(decoded) => self.static_files.respond(method, headers, &decoded).await,
            Err(_) => plain_response(StatusCode::NOT_FOUND, "Not found"),
        }
    }

    async fn catalog_response(&self) -> MediaResponse {
        self.metrics.record_catalog_request();

        let listing = if self.config.shuffle_catalog {
            self.catalog.list_shuffled().await
        } else {
            self.catalog.list().await
        };

        let built = match listing {
            Ok(tracks) => serde_json::to_vec(&tracks)
                .map_err(|e| StreamError::InternalError(e.to_string()))
                .and_then(|body| {
                    Response::builder()
                        .status(StatusCode::OK)
                        .header(CONTENT_TYPE, "application/json")
                        .header(
                            CACHE_CONTROL,
                            format!("public, max-age={}", self.config.catalog_max_age_secs),
                        )
                        .body(full_body(body))
                        .map_err(|e| StreamError::InternalError(e.to_string()))
                }),
            Err(e) => {
                warn!("Catalog listing failed: {}", e);
                error_json(&e)
            }
        };

        built.unwrap_or_else(|e| {
            error!("Failed to build catalog response: {}", e);
            plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        })
    }
}

/// Body bytes a response will put on the wire
///
/// Streamed file bodies carry no size hint, so Content-Length is preferred.
fn served_bytes(method: &Method, response: &MediaResponse) -> u64 {
    if *method == Method::HEAD {
        return 0;
    }
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .or_else(|| response.body().size_hint().exact())
        .unwrap_or(0)
}

/// Percent-decode a URL path segment sequence
fn decode_path(raw: &str) -> Result<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| StreamError::InvalidPath(e.to_string()))
}

fn error_json(err: &StreamError) -> Result<MediaResponse> {
    let status = StatusCode::from_u16(err.to_http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::json!({ "error": err.to_string() }).to_string();

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full_body(body))
        .map_err(|e| StreamError::InternalError(e.to_string()))
}

fn metrics_response(metrics: &MediaMetrics) -> MediaResponse {
    let body = format_prometheus_metrics(&metrics.get_stats());
    let mut response = Response::new(full_body(body));
    response.headers_mut().insert(
        CONTENT_TYPE,
        http::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    response
}

fn method_not_allowed() -> MediaResponse {
    let mut response = plain_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    response
        .headers_mut()
        .insert(ALLOW, http::HeaderValue::from_static("GET, HEAD"));
    response
}

fn no_content() -> MediaResponse {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}
