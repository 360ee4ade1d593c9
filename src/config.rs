//! Configuration management for tunestream

use crate::error::{Result, StreamError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the media server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to (default: 127.0.0.1:3000)
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Directory holding the music catalog (default: "music")
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,

    /// Directory holding the player page and other static files (default: "public")
    #[serde(default = "default_document_root")]
    pub document_root: PathBuf,

    /// URL prefix under which media files are served (default: "/music/")
    #[serde(default = "default_media_url_prefix")]
    pub media_url_prefix: String,

    /// max-age for audio responses in seconds (default: 1 year)
    #[serde(default = "default_audio_max_age")]
    pub audio_max_age_secs: u64,

    /// max-age for non-audio files in seconds (default: 1 hour)
    #[serde(default = "default_static_max_age")]
    pub static_max_age_secs: u64,

    /// max-age for the catalog listing in seconds (default: 5 minutes)
    #[serde(default = "default_catalog_max_age")]
    pub catalog_max_age_secs: u64,

    /// Whether `/api/music` randomizes the order on every call (default: true)
    #[serde(default = "default_true")]
    pub shuffle_catalog: bool,

    /// Whether `/metrics` is served (default: true)
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Log level used when RUST_LOG is not set (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Client-side preload settings (optional)
    #[serde(default)]
    pub preload: Option<PreloadConfig>,
}

/// Configuration for the client-side preload cache
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreloadConfig {
    /// Maximum number of cached tracks (default: 10)
    #[serde(default = "default_preload_capacity")]
    pub capacity: usize,

    /// Timeout for a single track fetch in seconds (default: 30)
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Base URL of the media server (default: http://127.0.0.1:3000)
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            capacity: default_preload_capacity(),
            fetch_timeout_secs: default_fetch_timeout(),
            base_url: default_base_url(),
        }
    }
}

impl PreloadConfig {
    /// Validate the preload configuration
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(StreamError::ConfigError(
                "preload capacity must be greater than 0".to_string(),
            ));
        }

        if self.fetch_timeout_secs == 0 {
            return Err(StreamError::ConfigError(
                "preload fetch_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(StreamError::ConfigError(format!(
                "preload base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }

        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

// Default value functions for serde
fn default_listen_address() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_media_root() -> PathBuf {
    PathBuf::from("music")
}

fn default_document_root() -> PathBuf {
    PathBuf::from("public")
}

fn default_media_url_prefix() -> String {
    "/music/".to_string()
}

fn default_audio_max_age() -> u64 {
    365 * 24 * 3600 // 1 year
}

fn default_static_max_age() -> u64 {
    3600 // 1 hour
}

fn default_catalog_max_age() -> u64 {
    300 // 5 minutes
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_preload_capacity() -> usize {
    10
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_address: default_listen_address(),
            media_root: default_media_root(),
            document_root: default_document_root(),
            media_url_prefix: default_media_url_prefix(),
            audio_max_age_secs: default_audio_max_age(),
            static_max_age_secs: default_static_max_age(),
            catalog_max_age_secs: default_catalog_max_age(),
            shuffle_catalog: default_true(),
            metrics_enabled: default_true(),
            log_level: default_log_level(),
            preload: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    ///
    /// # Returns
    /// * `Ok(ServerConfig)` if loading and validation succeed
    /// * `Err(StreamError)` if the file cannot be read or the config is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            StreamError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: ServerConfig = serde_yaml::from_str(content).map_err(|e| {
            StreamError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Validation Rules
    /// - listen_address must parse as a socket address
    /// - media_root must not be empty
    /// - media_url_prefix must start and end with '/' and not be "/" alone
    /// - preload section, when present, must be valid
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.media_root.as_os_str().is_empty() {
            return Err(StreamError::ConfigError(
                "media_root must not be empty".to_string(),
            ));
        }

        let prefix = &self.media_url_prefix;
        if prefix.len() < 3 || !prefix.starts_with('/') || !prefix.ends_with('/') {
            return Err(StreamError::ConfigError(format!(
                "media_url_prefix must look like '/name/', got '{}'",
                prefix
            )));
        }

        if let Some(ref preload) = self.preload {
            preload.validate()?;
        }

        Ok(())
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_address.parse::<SocketAddr>().map_err(|e| {
            StreamError::ConfigError(format!(
                "invalid listen_address '{}': {}",
                self.listen_address, e
            ))
        })
    }

    /// Preload settings, falling back to defaults when the section is absent
    pub fn preload_or_default(&self) -> PreloadConfig {
        self.preload.clone().unwrap_or_default()
    }
}
