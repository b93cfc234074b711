//! Rolling aggregate statistics over request metrics.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use crate::types::{CacheOutcome, RequestMetric, RequestStatus};

/// Default number of latency samples retained for percentile estimation.
pub const DEFAULT_LATENCY_RESERVOIR: usize = 1024;

/// Aggregates request metrics into counters and a latency distribution.
///
/// Counters are atomic and exact. The latency distribution is a
/// fixed-size overwrite-oldest reservoir: percentiles reflect the most
/// recent window, which keeps them responsive under load at the cost of
/// exactness over all time — acceptable by contract. Ingestion is
/// constant-time and never awaits, so it cannot block request-path
/// completion; [`snapshot()`](Self::snapshot) copies the reservoir
/// under the same short-lived lock and never blocks ingestion beyond
/// that bounded critical section.
pub struct MetricsAggregator {
    total_requests: AtomicU64,
    error_count: AtomicU64,
    cache_hit_count: AtomicU64,
    cache_miss_count: AtomicU64,
    latencies: Mutex<LatencyReservoir>,
    started_at: Instant,
}

impl MetricsAggregator {
    /// Create an aggregator retaining `reservoir` latency samples.
    pub fn new(reservoir: usize) -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            cache_hit_count: AtomicU64::new(0),
            cache_miss_count: AtomicU64::new(0),
            latencies: Mutex::new(LatencyReservoir::new(reservoir.max(1))),
            started_at: Instant::now(),
        }
    }

    /// Fold one completed request into the aggregate.
    pub fn ingest(&self, metric: &RequestMetric) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if metric.status == RequestStatus::Error {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        match metric.cache_outcome {
            CacheOutcome::Hit => self.cache_hit_count.fetch_add(1, Ordering::Relaxed),
            CacheOutcome::Miss => self.cache_miss_count.fetch_add(1, Ordering::Relaxed),
        };
        lock_reservoir(&self.latencies).record(metric.latency_ms);
    }

    /// Read-only snapshot for the external scraper.
    ///
    /// Safe to call at arbitrary frequency; has no side effects on the
    /// aggregate.
    pub fn snapshot(&self) -> AggregateSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let cache_hit_count = self.cache_hit_count.load(Ordering::Relaxed);
        let cache_miss_count = self.cache_miss_count.load(Ordering::Relaxed);
        let attempts = cache_hit_count + cache_miss_count;

        let mut samples = lock_reservoir(&self.latencies).samples();
        samples.sort_by(|a, b| a.total_cmp(b));

        AggregateSnapshot {
            total_requests,
            error_count: self.error_count.load(Ordering::Relaxed),
            cache_hit_count,
            cache_miss_count,
            hit_rate: if attempts > 0 {
                cache_hit_count as f64 / attempts as f64
            } else {
                0.0
            },
            latency_p50_ms: percentile(&samples, 50.0),
            latency_p95_ms: percentile(&samples, 95.0),
            latency_p99_ms: percentile(&samples, 99.0),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

/// Point-in-time view of the aggregate, serializable for scraping.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateSnapshot {
    /// Requests completed since start, successful or not.
    pub total_requests: u64,
    /// Requests that surfaced an error.
    pub error_count: u64,
    /// Requests served without a backend call (cache hit or in-flight join).
    pub cache_hit_count: u64,
    /// Requests that triggered a backend call.
    pub cache_miss_count: u64,
    /// `cache_hit_count / (cache_hit_count + cache_miss_count)`, 0 when idle.
    pub hit_rate: f64,
    /// Median request latency over the recent window, in milliseconds.
    pub latency_p50_ms: f64,
    /// 95th-percentile latency over the recent window.
    pub latency_p95_ms: f64,
    /// 99th-percentile latency over the recent window.
    pub latency_p99_ms: f64,
    /// Seconds since the aggregator was constructed.
    pub uptime_secs: u64,
}

/// Fixed-size ring of the most recent latency samples.
struct LatencyReservoir {
    samples: Vec<f64>,
    capacity: usize,
    next: usize,
}

impl LatencyReservoir {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    fn record(&mut self, latency_ms: f64) {
        if self.samples.len() < self.capacity {
            self.samples.push(latency_ms);
        } else {
            self.samples[self.next] = latency_ms;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    fn samples(&self) -> Vec<f64> {
        self.samples.clone()
    }
}

/// Nearest-rank percentile over a sorted slice; 0 when empty.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[index.min(sorted.len() - 1)]
}

fn lock_reservoir(latencies: &Mutex<LatencyReservoir>) -> std::sync::MutexGuard<'_, LatencyReservoir> {
    latencies.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
