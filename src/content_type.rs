//! MIME type lookup by file extension

use std::path::Path;

/// Fallback type for anything not in the table
pub const OCTET_STREAM: &str = "application/octet-stream";

const AUDIO_TYPES: &[(&str, &str)] = &[
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("m4a", "audio/mp4"),
    ("flac", "audio/flac"),
    ("aac", "audio/aac"),
];

// Player page assets; only the static route consults these.
const ASSET_TYPES: &[(&str, &str)] = &[
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("js", "text/javascript; charset=utf-8"),
    ("css", "text/css; charset=utf-8"),
    ("json", "application/json"),
    ("ico", "image/x-icon"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
];

/// Maps a resource path to a MIME type by case-insensitive suffix match
pub struct ContentTypeResolver;

impl ContentTypeResolver {
    /// Resolve the MIME type of `path`
    ///
    /// Total function: unknown or missing extensions yield
    /// `application/octet-stream`.
    pub fn resolve(path: impl AsRef<Path>) -> &'static str {
        let Some(ext) = extension(path.as_ref()) else {
            return OCTET_STREAM;
        };

        lookup(AUDIO_TYPES, &ext).unwrap_or(OCTET_STREAM)
    }

    /// Whether `path` names one of the supported audio formats
    pub fn is_audio(path: impl AsRef<Path>) -> bool {
        match extension(path.as_ref()) {
            Some(ext) => AUDIO_TYPES.iter().any(|(suffix, _)| *suffix == ext),
            None => false,
        }
    }
}

/// MIME lookup for the player page and its assets
///
/// Audio extensions resolve as in [`ContentTypeResolver`]; a handful of web
/// asset types are added on top. Media responses never use this.
pub struct AssetTypeResolver;

impl AssetTypeResolver {
    pub fn resolve(path: impl AsRef<Path>) -> &'static str {
        let Some(ext) = extension(path.as_ref()) else {
            return OCTET_STREAM;
        };

        lookup(AUDIO_TYPES, &ext)
            .or_else(|| lookup(ASSET_TYPES, &ext))
            .unwrap_or(OCTET_STREAM)
    }
}

fn lookup(table: &[(&str, &'static str)], ext: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(suffix, _)| *suffix == ext)
        .map(|(_, mime)| *mime)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
