//! Conditional request validation (`If-None-Match`)

use crate::models::{Fingerprint, ResourceMetadata};
use http::HeaderMap;
use tracing::debug;

/// Outcome of validating a client validator against the current resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validation {
    /// Whether the client's cached copy is still current
    pub matched: bool,
    /// Fingerprint computed from the resource at request time
    pub current: Fingerprint,
}

/// Decides whether a request's validator matches the resource fingerprint
pub struct ConditionalCacheValidator;

impl ConditionalCacheValidator {
    /// Compare `client_validator` with the fingerprint of `resource`
    ///
    /// `matched` is true iff the validator is present and string-equal to the
    /// fingerprint's serialized form (surrounding whitespace ignored).
    pub fn validate(resource: &ResourceMetadata, client_validator: Option<&str>) -> Validation {
        let current = resource.fingerprint();
        let matched = match client_validator {
            Some(v) => v.trim() == current.to_etag(),
            None => false,
        };

        debug!(
            "Conditional check: client={:?}, current={}, matched={}",
            client_validator, current, matched
        );

        Validation { matched, current }
    }

    /// Extract the `If-None-Match` value from request headers
    pub fn client_validator(headers: &HeaderMap) -> Option<&str> {
        headers
            .get(http::header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
    }
}
