//! Byte-range request planning
//!
//! Turns a `Range` request header and the resource length into one of three
//! outcomes. Only single ranges of the `bytes` unit are understood; anything
//! else is reported as [`PlanResult::NoRange`] so the caller degrades to a
//! full response.

use crate::models::ByteRange;
use http::HeaderMap;
use tracing::debug;

/// Outcome of planning a range request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanResult {
    /// No usable Range header (absent, malformed, or multi-range)
    NoRange,
    /// The requested window lies inside the resource
    Satisfiable(ByteRange),
    /// The requested window does not fit the resource
    NotSatisfiable,
}

/// Plans byte windows for `Range` requests
pub struct RangeRequestPlanner;

impl RangeRequestPlanner {
    /// Plan a response window for `range_header` against a resource of `total_length` bytes
    ///
    /// # Logic
    /// 1. Absent header, unit other than `bytes`, multiple ranges, or an
    ///    unparsable start (including suffix ranges such as `bytes=-500`)
    ///    yield `NoRange`.
    /// 2. A missing end means "to the end of the resource".
    /// 3. `start >= total`, `end >= total` or `start > end` yield `NotSatisfiable`.
    pub fn plan(range_header: Option<&str>, total_length: u64) -> PlanResult {
        let Some(header) = range_header else {
            return PlanResult::NoRange;
        };

        let Some((start, end)) = Self::parse(header) else {
            debug!("Ignoring unusable Range header: {}", header);
            return PlanResult::NoRange;
        };

        if start >= total_length {
            debug!(
                "Range start {} beyond resource length {}",
                start, total_length
            );
            return PlanResult::NotSatisfiable;
        }

        let end = end.unwrap_or(total_length - 1);
        match ByteRange::new(start, end) {
            Ok(range) if range.fits_within(total_length) => PlanResult::Satisfiable(range),
            _ => {
                debug!(
                    "Range {}-{} not satisfiable for length {}",
                    start, end, total_length
                );
                PlanResult::NotSatisfiable
            }
        }
    }

    /// Extract the `Range` header from request headers
    pub fn range_header(headers: &HeaderMap) -> Option<&str> {
        headers
            .get(http::header::RANGE)
            .and_then(|v| v.to_str().ok())
    }

    /// Parse `bytes=<start>-[<end>]` into its numeric parts
    fn parse(header: &str) -> Option<(u64, Option<u64>)> {
        let header = header.trim();
        let (unit, spec) = header.split_once('=')?;
        if !unit.trim().eq_ignore_ascii_case("bytes") {
            return None;
        }

        // Multi-range requests degrade to a full response.
        if spec.contains(',') {
            return None;
        }

        let (start, end) = spec.split_once('-')?;
        let start = parse_position(start)?;

        let end = end.trim();
        if end.is_empty() {
            Some((start, None))
        } else {
            Some((start, Some(parse_position(end)?)))
        }
    }
}

/// A byte position: ASCII digits only, so signs and other decorations are malformed
fn parse_position(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u64>().ok()
}
