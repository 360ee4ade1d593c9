//! Music catalog enumeration
//!
//! The catalog is re-derived from the media directory on every call; nothing
//! is indexed or persisted.

use crate::content_type::ContentTypeResolver;
use crate::error::{Result, StreamError};
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lists the audio files below a media root
#[derive(Debug, Clone)]
pub struct CatalogLister {
    root: PathBuf,
}

impl CatalogLister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CatalogLister { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the media root and return track identifiers in sorted order
    ///
    /// Identifiers are paths relative to the root joined with `/`. Only files
    /// with a supported audio extension are listed. An empty directory gives
    /// an empty list; a missing or unreadable root is `CatalogUnavailable`.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut tracks = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
                warn!("Cannot read catalog directory {}: {}", dir.display(), e);
                StreamError::CatalogUnavailable(format!("{}: {}", dir.display(), e))
            })?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StreamError::CatalogUnavailable(e.to_string()))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StreamError::CatalogUnavailable(e.to_string()))?;
                let path = entry.path();

                if file_type.is_dir() {
                    pending.push(path);
                } else if ContentTypeResolver::is_audio(&path) {
                    if let Some(id) = self.track_id(&path) {
                        tracks.push(id);
                    }
                }
            }
        }

        tracks.sort();
        debug!("Catalog of {} lists {} tracks", self.root.display(), tracks.len());
        Ok(tracks)
    }

    /// List the catalog and randomize its order
    pub async fn list_shuffled(&self) -> Result<Vec<String>> {
        let mut tracks = self.list().await?;
        tracks.shuffle(&mut rand::rng());
        Ok(tracks)
    }

    fn track_id(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = relative.iter().map(|p| p.to_str()).collect();
        Some(parts?.join("/"))
    }
}

/// Display title of a track: its file name without the extension
pub fn track_title(track_id: &str) -> &str {
    let name = track_id.rsplit('/').next().unwrap_or(track_id);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}
