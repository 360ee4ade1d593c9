//! Answers a single request for a single file
//!
//! The responder re-reads size and modification time for every request and
//! chooses one of five response shapes, in strict precedence order:
//! not-found, not-modified, partial-content, range-not-satisfiable and
//! full-content. Classification never escapes as an error; every outcome is
//! an HTTP response. Failures opening the file become 500.
//!
//! File bodies are streamed in chunks straight from disk; only the requested
//! window is ever read.

use crate::content_type::{AssetTypeResolver, ContentTypeResolver};
use crate::error::{Result, StreamError};
use crate::models::{ByteRange, Fingerprint, ResourceMetadata};
use crate::range_planner::{PlanResult, RangeRequestPlanner};
use crate::validator::ConditionalCacheValidator;
use bytes::Bytes;
use futures_util::TryStreamExt;
use http::header::{
    ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, EXPIRES,
};
use http::{HeaderMap, Method, Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

/// Read size for streamed file bodies
const CHUNK_SIZE: usize = 64 * 1024;

/// Body of every response the server produces: buffered or streamed from disk
pub type MediaBody = UnsyncBoxBody<Bytes, std::io::Error>;

/// Response type produced by the responder
pub type MediaResponse = Response<MediaBody>;

/// How a responder treats the files under its root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeProfile {
    /// Music files: byte ranges for audio, long-lived caching
    Media,
    /// Player page and assets: whole files, short-lived caching
    Static,
}

/// Cache lifetimes applied to responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// max-age for audio (seconds)
    pub audio_max_age_secs: u64,
    /// max-age for everything else (seconds)
    pub static_max_age_secs: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy {
            audio_max_age_secs: 365 * 24 * 3600,
            static_max_age_secs: 3600,
        }
    }
}

impl CachePolicy {
    fn long_lived(&self) -> String {
        format!("public, max-age={}, immutable", self.audio_max_age_secs)
    }

    fn short_lived(&self) -> String {
        format!("public, max-age={}", self.static_max_age_secs)
    }

    fn expires(&self) -> String {
        let at = chrono::Utc::now() + chrono::Duration::seconds(self.audio_max_age_secs as i64);
        at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
    }
}

/// Serves files below a root directory with range and conditional support
#[derive(Debug, Clone)]
pub struct MediaResponder {
    root: PathBuf,
    profile: ServeProfile,
    policy: CachePolicy,
}

impl MediaResponder {
    /// Create a responder for music files under `root`
    pub fn for_media(root: impl Into<PathBuf>, policy: CachePolicy) -> Self {
        MediaResponder {
            root: root.into(),
            profile: ServeProfile::Media,
            policy,
        }
    }

    /// Create a responder for static files under `root`
    pub fn for_static(root: impl Into<PathBuf>, policy: CachePolicy) -> Self {
        MediaResponder {
            root: root.into(),
            profile: ServeProfile::Static,
            policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn profile(&self) -> ServeProfile {
        self.profile
    }

    /// Answer one request for `resource_path` (relative to the root, already URL-decoded)
    ///
    /// `HEAD` gets the same status and headers as `GET` without reading the body.
    pub async fn respond(
        &self,
        method: &Method,
        headers: &HeaderMap,
        resource_path: &str,
    ) -> MediaResponse {
        match self.try_respond(method, headers, resource_path).await {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to serve {}: {}", resource_path, e);
                plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }

    async fn try_respond(
        &self,
        method: &Method,
        headers: &HeaderMap,
        resource_path: &str,
    ) -> Result<MediaResponse> {
        // Step 1: existence
        let Some(path) = resolve_under(&self.root, resource_path) else {
            debug!("Rejected path outside root: {}", resource_path);
            return Ok(plain_response(StatusCode::NOT_FOUND, "File not found"));
        };

        let resource = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => ResourceMetadata::from_fs(&meta),
            Ok(_) => return Ok(plain_response(StatusCode::NOT_FOUND, "File not found")),
            Err(e) => match StreamError::from(e) {
                StreamError::NotFound(_) => {
                    return Ok(plain_response(StatusCode::NOT_FOUND, "File not found"))
                }
                other => return Err(other),
            },
        };

        let is_audio = ContentTypeResolver::is_audio(&path);

        // Step 2: conditional validation wins over everything else
        let validation = ConditionalCacheValidator::validate(
            &resource,
            ConditionalCacheValidator::client_validator(headers),
        );
        if validation.matched {
            return self.not_modified(validation.current);
        }

        let mime = match self.profile {
            ServeProfile::Media => ContentTypeResolver::resolve(&path),
            ServeProfile::Static => AssetTypeResolver::resolve(&path),
        };
        let head_only = *method == Method::HEAD;

        // Steps 3-4: ranges for audio only
        if self.profile == ServeProfile::Media && is_audio {
            let range_header = RangeRequestPlanner::range_header(headers);
            match RangeRequestPlanner::plan(range_header, resource.length) {
                PlanResult::Satisfiable(range) => {
                    let body = if head_only {
                        empty_body()
                    } else {
                        file_body(&path, range.start, range.size()).await?
                    };
                    return self.partial(range, &resource, mime, body);
                }
                PlanResult::NotSatisfiable => {
                    debug!(
                        "Unsatisfiable range {:?} for {} ({} bytes)",
                        range_header, resource_path, resource.length
                    );
                    return self.not_satisfiable(resource.length);
                }
                PlanResult::NoRange => {
                    if range_header.is_some() {
                        warn!(
                            "Malformed Range {:?} for {}, serving full content",
                            range_header, resource_path
                        );
                    }
                }
            }
        }

        // Step 5: full content
        let body = if head_only {
            empty_body()
        } else {
            file_body(&path, 0, resource.length).await?
        };
        self.full(validation.current, is_audio, mime, resource.length, body)
    }

    fn not_modified(&self, fingerprint: Fingerprint) -> Result<MediaResponse> {
        let cache_control = match self.profile {
            ServeProfile::Media => self.policy.long_lived(),
            ServeProfile::Static => self.policy.short_lived(),
        };

        Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(ETAG, fingerprint.to_etag())
            .header(CACHE_CONTROL, cache_control)
            .body(empty_body())
            .map_err(build_error)
    }

    fn partial(
        &self,
        range: ByteRange,
        resource: &ResourceMetadata,
        mime: &str,
        body: MediaBody,
    ) -> Result<MediaResponse> {
        Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(CONTENT_RANGE, range.to_content_range(resource.length))
            .header(ACCEPT_RANGES, "bytes")
            .header(CONTENT_LENGTH, range.size())
            .header(CONTENT_TYPE, mime)
            .header(ETAG, resource.fingerprint().to_etag())
            .header(CACHE_CONTROL, self.policy.long_lived())
            .body(body)
            .map_err(build_error)
    }

    fn not_satisfiable(&self, total: u64) -> Result<MediaResponse> {
        Response::builder()
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(CONTENT_RANGE, format!("bytes */{}", total))
            .body(empty_body())
            .map_err(build_error)
    }

    fn full(
        &self,
        fingerprint: Fingerprint,
        is_audio: bool,
        mime: &str,
        length: u64,
        body: MediaBody,
    ) -> Result<MediaResponse> {
        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(ACCEPT_RANGES, "bytes")
            .header(CONTENT_TYPE, mime)
            .header(CONTENT_LENGTH, length)
            .header(ETAG, fingerprint.to_etag());

        builder = if is_audio && self.profile == ServeProfile::Media {
            builder
                .header(CACHE_CONTROL, self.policy.long_lived())
                .header(EXPIRES, self.policy.expires())
        } else {
            builder.header(CACHE_CONTROL, self.policy.short_lived())
        };

        builder.body(body).map_err(build_error)
    }
}

/// Join `relative` onto `root`, refusing anything that could climb out of it
pub fn resolve_under(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        return None;
    }

    let mut resolved = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

/// Build a small text response; used for 404, 405 and 500 bodies
pub fn plain_response(status: StatusCode, message: &'static str) -> MediaResponse {
    let mut response = Response::new(full_body(Bytes::from_static(message.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        http::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// A fully buffered body
pub fn full_body(data: impl Into<Bytes>) -> MediaBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn empty_body() -> MediaBody {
    full_body(Bytes::new())
}

/// Stream `length` bytes of the file at `path`, starting at `offset`
async fn file_body(path: &Path, offset: u64, length: u64) -> Result<MediaBody> {
    let mut file = tokio::fs::File::open(path).await?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }

    let stream = ReaderStream::with_capacity(file.take(length), CHUNK_SIZE).map_ok(Frame::data);
    Ok(StreamBody::new(stream).boxed_unsync())
}

fn build_error(e: http::Error) -> StreamError {
    StreamError::InternalError(format!("Failed to build response: {}", e))
}
