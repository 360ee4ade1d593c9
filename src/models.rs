//! Core data models for tunestream

use crate::error::{Result, StreamError};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Represents a closed byte interval of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// Starting byte position (inclusive)
    pub start: u64,
    /// Ending byte position (inclusive)
    pub end: u64,
}

impl ByteRange {
    /// Create a new ByteRange
    ///
    /// # Returns
    /// * `Ok(ByteRange)` if `start <= end`
    /// * `Err(StreamError::MalformedRange)` otherwise
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if start > end {
            return Err(StreamError::MalformedRange(format!(
                "start ({}) must be <= end ({})",
                start, end
            )));
        }
        Ok(ByteRange { start, end })
    }

    /// Get the size of this byte range in bytes
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Check whether the range lies inside a resource of `total` bytes
    pub fn fits_within(&self, total: u64) -> bool {
        self.start <= self.end && self.end < total
    }

    /// Build the `Content-Range` response header value for a resource of `total` bytes
    pub fn to_content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Validator derived from a resource's size and modification time
///
/// Two fingerprints are equal iff both components are equal. The serialized
/// form is only ever compared, never parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    length: u64,
    modified_nanos: u128,
}

impl Fingerprint {
    /// Modification time is kept at full nanosecond resolution; times before
    /// the epoch collapse to zero.
    pub fn new(length: u64, modified: SystemTime) -> Self {
        let modified_nanos = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Fingerprint {
            length,
            modified_nanos,
        }
    }

    /// Serialized form used in `ETag` and matched against `If-None-Match`
    pub fn to_etag(&self) -> String {
        format!("\"{:x}-{:x}\"", self.length, self.modified_nanos)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_etag())
    }
}

/// Size and modification time of a resource, read fresh per request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceMetadata {
    /// Total size of the file in bytes
    pub length: u64,
    /// Last modification time reported by the filesystem
    pub modified: SystemTime,
}

impl ResourceMetadata {
    pub fn new(length: u64, modified: SystemTime) -> Self {
        ResourceMetadata { length, modified }
    }

    /// Build from filesystem metadata; platforms without mtime fall back to the epoch
    pub fn from_fs(metadata: &std::fs::Metadata) -> Self {
        ResourceMetadata {
            length: metadata.len(),
            modified: metadata.modified().unwrap_or(UNIX_EPOCH),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.length, self.modified)
    }
}
