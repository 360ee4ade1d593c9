//! tunestream server
//!
//! Loads configuration, sets up logging, and serves the music catalog and
//! media files over HTTP.

use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tunestream::{MediaServer, ServerConfig};

/// Main entry point for the tunestream server
///
/// # Usage
/// ```bash
/// # Start with default config (tunestream.yaml, or built-in defaults if absent)
/// tunestream
///
/// # Start with custom config
/// tunestream /path/to/config.yaml
/// ```
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "tunestream.yaml".to_string());

    let config = if Path::new(&config_path).exists() {
        match ServerConfig::from_file(&config_path) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                eprintln!("Failed to load configuration from {}: {}", config_path, e);
                std::process::exit(1);
            }
        }
    } else {
        None
    };
    let loaded = config.is_some();
    let config = config.unwrap_or_default();

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting tunestream server");
    if loaded {
        info!("Configuration loaded from: {}", config_path);
    } else {
        warn!("{} not found, using built-in defaults", config_path);
    }
    info!("  - Listen address: {}", config.listen_address);
    info!("  - Media root: {}", config.media_root.display());
    info!("  - Document root: {}", config.document_root.display());
    info!("  - Media URL prefix: {}", config.media_url_prefix);
    info!("  - Audio max-age: {} seconds", config.audio_max_age_secs);
    info!("  - Metrics enabled: {}", config.metrics_enabled);

    if !config.media_root.is_dir() {
        warn!(
            "Media root {} does not exist; the catalog will be unavailable",
            config.media_root.display()
        );
    }

    let server = Arc::new(MediaServer::new(Arc::new(config)));
    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}
