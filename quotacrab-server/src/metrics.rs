//! Simple metrics collection for observability
//!
//! This module provides lightweight metrics collection using atomic counters.
//! Nothing here allocates on the request path; the Prometheus text is only
//! built when `/metrics` is scraped.

use quotacrab::RejectReason;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// How a `/look` request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Admitted and answered with data
    Served,
    /// Admitted, but the lookup had no data
    NotFound,
    /// Admitted, but the lookup failed
    LookupFailed,
    /// Turned away before consuming quota
    Rejected(RejectReason),
    /// Target address did not parse
    Malformed,
    /// Store or actor failure
    Error,
}

/// Core metrics collected by the server
pub struct Metrics {
    /// Server start time
    start_time: Instant,

    /// Total `/look` requests received
    pub total_requests: AtomicU64,

    /// Admission decisions
    pub requests_admitted: AtomicU64,
    pub rejected_unauthenticated: AtomicU64,
    pub rejected_invalid_key: AtomicU64,
    pub rejected_quota: AtomicU64,
    pub requests_malformed: AtomicU64,
    pub requests_errors: AtomicU64,

    /// Lookup results for admitted requests
    pub lookups_empty: AtomicU64,
    pub lookups_failed: AtomicU64,

    /// Request latency buckets (in microseconds)
    pub latency_under_1ms: AtomicU64,
    pub latency_under_10ms: AtomicU64,
    pub latency_under_100ms: AtomicU64,
    pub latency_under_1s: AtomicU64,
    pub latency_over_1s: AtomicU64,

    /// Histogram support
    pub latency_sum_micros: AtomicU64,
    pub latency_count: AtomicU64,

    /// Sweeper activity
    pub sweeps_completed: AtomicU64,
    pub sweeps_skipped: AtomicU64,
    pub sweeps_failed: AtomicU64,
    pub windows_reset: AtomicU64,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_requests: AtomicU64::new(0),
            requests_admitted: AtomicU64::new(0),
            rejected_unauthenticated: AtomicU64::new(0),
            rejected_invalid_key: AtomicU64::new(0),
            rejected_quota: AtomicU64::new(0),
            requests_malformed: AtomicU64::new(0),
            requests_errors: AtomicU64::new(0),
            lookups_empty: AtomicU64::new(0),
            lookups_failed: AtomicU64::new(0),
            latency_under_1ms: AtomicU64::new(0),
            latency_under_10ms: AtomicU64::new(0),
            latency_under_100ms: AtomicU64::new(0),
            latency_under_1s: AtomicU64::new(0),
            latency_over_1s: AtomicU64::new(0),
            latency_sum_micros: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
            sweeps_completed: AtomicU64::new(0),
            sweeps_skipped: AtomicU64::new(0),
            sweeps_failed: AtomicU64::new(0),
            windows_reset: AtomicU64::new(0),
        }
    }

    /// Record a finished request and its latency
    pub fn record_request(&self, outcome: Outcome, latency: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        match outcome {
            Outcome::Served => {
                self.requests_admitted.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::NotFound => {
                self.requests_admitted.fetch_add(1, Ordering::Relaxed);
                self.lookups_empty.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::LookupFailed => {
                self.requests_admitted.fetch_add(1, Ordering::Relaxed);
                self.lookups_failed.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Rejected(RejectReason::Unauthenticated) => {
                self.rejected_unauthenticated.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Rejected(RejectReason::InvalidKey) => {
                self.rejected_invalid_key.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Rejected(RejectReason::QuotaExceeded) => {
                self.rejected_quota.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Malformed => {
                self.requests_malformed.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Error => {
                self.requests_errors.fetch_add(1, Ordering::Relaxed);
            }
        }

        let latency_us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        match latency_us {
            0..=999 => self.latency_under_1ms.fetch_add(1, Ordering::Relaxed),
            1000..=9999 => self.latency_under_10ms.fetch_add(1, Ordering::Relaxed),
            10000..=99999 => self.latency_under_100ms.fetch_add(1, Ordering::Relaxed),
            100000..=999999 => self.latency_under_1s.fetch_add(1, Ordering::Relaxed),
            _ => self.latency_over_1s.fetch_add(1, Ordering::Relaxed),
        };

        self.latency_sum_micros
            .fetch_add(latency_us, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed sweep
    pub fn record_sweep(&self, reset: usize) {
        self.sweeps_completed.fetch_add(1, Ordering::Relaxed);
        self.windows_reset
            .fetch_add(reset as u64, Ordering::Relaxed);
    }

    pub fn record_sweep_skipped(&self) {
        self.sweeps_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep_failure(&self) {
        self.sweeps_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        write_metric(
            &mut output,
            "quotacrab_uptime_seconds",
            "gauge",
            "Time since server start in seconds",
            &[("", self.uptime_seconds())],
        );
        write_metric(
            &mut output,
            "quotacrab_requests_total",
            "counter",
            "Total number of lookup requests",
            &[("", load(&self.total_requests))],
        );
        write_metric(
            &mut output,
            "quotacrab_requests_admitted",
            "counter",
            "Requests that consumed quota",
            &[("", load(&self.requests_admitted))],
        );
        write_metric(
            &mut output,
            "quotacrab_requests_rejected",
            "counter",
            "Requests turned away by admission",
            &[
                (
                    "reason=\"unauthenticated\"",
                    load(&self.rejected_unauthenticated),
                ),
                ("reason=\"invalid_key\"", load(&self.rejected_invalid_key)),
                ("reason=\"quota_exceeded\"", load(&self.rejected_quota)),
                ("reason=\"malformed\"", load(&self.requests_malformed)),
            ],
        );
        write_metric(
            &mut output,
            "quotacrab_requests_errors",
            "counter",
            "Requests failed by store or actor errors",
            &[("", load(&self.requests_errors))],
        );
        write_metric(
            &mut output,
            "quotacrab_lookups",
            "counter",
            "Admitted requests whose lookup did not return data",
            &[
                ("result=\"empty\"", load(&self.lookups_empty)),
                ("result=\"failed\"", load(&self.lookups_failed)),
            ],
        );

        // Latency distribution, cumulative
        let under_1ms = load(&self.latency_under_1ms);
        let under_10ms = under_1ms + load(&self.latency_under_10ms);
        let under_100ms = under_10ms + load(&self.latency_under_100ms);
        let under_1s = under_100ms + load(&self.latency_under_1s);
        output.push_str("# HELP quotacrab_request_duration Request latency distribution\n");
        output.push_str("# TYPE quotacrab_request_duration histogram\n");
        for (le, count) in [
            ("0.001", under_1ms),
            ("0.01", under_10ms),
            ("0.1", under_100ms),
            ("1", under_1s),
            ("+Inf", load(&self.latency_count)),
        ] {
            let _ = writeln!(
                output,
                "quotacrab_request_duration_bucket{{le=\"{le}\"}} {count}"
            );
        }
        let latency_sum_seconds = load(&self.latency_sum_micros) as f64 / 1_000_000.0;
        let _ = writeln!(
            output,
            "quotacrab_request_duration_sum {latency_sum_seconds:.6}"
        );
        let _ = writeln!(
            output,
            "quotacrab_request_duration_count {}\n",
            load(&self.latency_count)
        );

        write_metric(
            &mut output,
            "quotacrab_sweeps",
            "counter",
            "Stale window sweeps by result",
            &[
                ("result=\"completed\"", load(&self.sweeps_completed)),
                ("result=\"skipped\"", load(&self.sweeps_skipped)),
                ("result=\"failed\"", load(&self.sweeps_failed)),
            ],
        );
        write_metric(
            &mut output,
            "quotacrab_windows_reset",
            "counter",
            "Stale windows reset by the sweeper",
            &[("", load(&self.windows_reset))],
        );

        output
    }
}

fn write_metric(output: &mut String, name: &str, kind: &str, help: &str, values: &[(&str, u64)]) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {kind}");
    for (labels, value) in values {
        if labels.is_empty() {
            let _ = writeln!(output, "{name} {value}");
        } else {
            let _ = writeln!(output, "{name}{{{labels}}} {value}");
        }
    }
    output.push('\n');
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.requests_admitted.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.rejected_quota.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.requests_errors.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_request() {
        let metrics = Metrics::new();

        metrics.record_request(Outcome::Served, Duration::from_micros(500));
        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.requests_admitted.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_1ms.load(Ordering::Relaxed), 1);

        metrics.record_request(
            Outcome::Rejected(RejectReason::QuotaExceeded),
            Duration::from_millis(50),
        );
        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.requests_admitted.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.rejected_quota.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_100ms.load(Ordering::Relaxed), 1);

        // Admitted but empty still consumed quota
        metrics.record_request(Outcome::NotFound, Duration::from_micros(10));
        assert_eq!(metrics.requests_admitted.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.lookups_empty.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_latency_buckets() {
        let metrics = Metrics::new();

        for micros in [500, 5_000, 50_000, 500_000, 5_000_000] {
            metrics.record_request(Outcome::Served, Duration::from_micros(micros));
        }

        assert_eq!(metrics.latency_under_1ms.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_10ms.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_100ms.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_1s.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_over_1s.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_sweep_counters() {
        let metrics = Metrics::new();
        metrics.record_sweep(3);
        metrics.record_sweep(0);
        metrics.record_sweep_skipped();
        metrics.record_sweep_failure();

        assert_eq!(metrics.sweeps_completed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.windows_reset.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.sweeps_skipped.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.sweeps_failed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        metrics.record_request(Outcome::Served, Duration::from_micros(500));
        metrics.record_request(
            Outcome::Rejected(RejectReason::InvalidKey),
            Duration::from_millis(2),
        );
        metrics.record_sweep(4);

        let output = metrics.export_prometheus();
        assert!(output.contains("# TYPE quotacrab_requests_total counter"));
        assert!(output.contains("quotacrab_requests_total 2"));
        assert!(output.contains("quotacrab_requests_admitted 1"));
        assert!(output.contains("quotacrab_requests_rejected{reason=\"invalid_key\"} 1"));
        assert!(output.contains("quotacrab_request_duration_bucket{le=\"0.001\"} 1"));
        assert!(output.contains("quotacrab_request_duration_bucket{le=\"0.01\"} 2"));
        assert!(output.contains("quotacrab_request_duration_bucket{le=\"+Inf\"} 2"));
        assert!(output.contains("quotacrab_windows_reset 4"));
    }
}
