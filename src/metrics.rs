//! Metrics collection for the media server
//!
//! Thread-safe counters updated with relaxed atomics, plus a renderer for
//! the Prometheus text exposition format served at `/metrics`.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for the media server
#[derive(Debug, Default)]
pub struct MediaMetrics {
    total_requests: AtomicU64,
    catalog_requests: AtomicU64,

    // Responses by outcome
    full_responses: AtomicU64,
    partial_responses: AtomicU64,
    not_modified_responses: AtomicU64,
    not_found_responses: AtomicU64,
    unsatisfiable_responses: AtomicU64,
    error_responses: AtomicU64,

    bytes_served: AtomicU64,
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub catalog_requests: u64,
    pub full_responses: u64,
    pub partial_responses: u64,
    pub not_modified_responses: u64,
    pub not_found_responses: u64,
    pub unsatisfiable_responses: u64,
    pub error_responses: u64,
    pub bytes_served: u64,
}

impl MetricsSnapshot {
    /// Share of media responses answered without a body (304), in percent
    pub fn revalidation_rate(&self) -> f64 {
        let answered = self.full_responses + self.partial_responses + self.not_modified_responses;
        if answered == 0 {
            0.0
        } else {
            (self.not_modified_responses as f64 / answered as f64) * 100.0
        }
    }
}

impl MediaMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound request, whatever its route
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_catalog_request(&self) {
        self.catalog_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a response by status code and body size
    pub fn record_response(&self, status: u16, body_bytes: u64) {
        let counter = match status {
            200 => &self.full_responses,
            206 => &self.partial_responses,
            304 => &self.not_modified_responses,
            404 => &self.not_found_responses,
            416 => &self.unsatisfiable_responses,
            500..=599 => &self.error_responses,
            _ => {
                self.bytes_served.fetch_add(body_bytes, Ordering::Relaxed);
                return;
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.bytes_served.fetch_add(body_bytes, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            catalog_requests: self.catalog_requests.load(Ordering::Relaxed),
            full_responses: self.full_responses.load(Ordering::Relaxed),
            partial_responses: self.partial_responses.load(Ordering::Relaxed),
            not_modified_responses: self.not_modified_responses.load(Ordering::Relaxed),
            not_found_responses: self.not_found_responses.load(Ordering::Relaxed),
            unsatisfiable_responses: self.unsatisfiable_responses.load(Ordering::Relaxed),
            error_responses: self.error_responses.load(Ordering::Relaxed),
            bytes_served: self.bytes_served.load(Ordering::Relaxed),
        }
    }
}

/// Format a snapshot in Prometheus exposition format
pub fn format_prometheus_metrics(snapshot: &MetricsSnapshot) -> String {
    let mut output = String::new();

    let counters: [(&str, &str, u64); 9] = [
        ("requests_total", "Total number of requests received", snapshot.total_requests),
        ("catalog_requests_total", "Number of catalog listings served", snapshot.catalog_requests),
        ("full_responses_total", "Number of 200 responses", snapshot.full_responses),
        ("partial_responses_total", "Number of 206 responses", snapshot.partial_responses),
        ("not_modified_responses_total", "Number of 304 responses", snapshot.not_modified_responses),
        ("not_found_responses_total", "Number of 404 responses", snapshot.not_found_responses),
        ("unsatisfiable_responses_total", "Number of 416 responses", snapshot.unsatisfiable_responses),
        ("error_responses_total", "Number of 5xx responses", snapshot.error_responses),
        ("bytes_served_total", "Total body bytes sent to clients", snapshot.bytes_served),
    ];

    for (name, help, value) in counters {
        let _ = writeln!(output, "# HELP tunestream_{} {}", name, help);
        let _ = writeln!(output, "# TYPE tunestream_{} counter", name);
        let _ = writeln!(output, "tunestream_{} {}", name, value);
        output.push('\n');
    }

    output.push_str("# HELP tunestream_revalidation_rate Percentage of media responses answered with 304\n");
    output.push_str("# TYPE tunestream_revalidation_rate gauge\n");
    let _ = writeln!(
        output,
        "tunestream_revalidation_rate {:.2}",
        snapshot.revalidation_rate()
    );

    output
}
