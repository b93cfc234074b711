//! Per-request measurement record.

use serde::Serialize;
use uuid::Uuid;

/// Whether a request was served without invoking the backend.
///
/// `Hit` covers both a direct cache hit and a follower that joined an
/// in-flight generation — in either case the request paid no backend
/// call of its own. `Miss` marks the one request per generation episode
/// that did (the leader).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOutcome {
    Hit,
    Miss,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
        }
    }
}

/// Final status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Ok,
    Error,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Ok => "ok",
            RequestStatus::Error => "error",
        }
    }
}

/// One immutable measurement record per request.
///
/// Created once by the [`MetricsRecorder`](crate::telemetry::MetricsRecorder)
/// when a request completes, then handed off to the aggregator and the
/// record sink. Never mutated after emission.
#[derive(Debug, Clone, Serialize)]
pub struct RequestMetric {
    /// Unique id for this request.
    pub request_id: Uuid,
    /// Served from cache / in-flight join, or via a backend call.
    pub cache_outcome: CacheOutcome,
    /// Final status.
    pub status: RequestStatus,
    /// Wall-clock latency from receipt to response, in milliseconds.
    pub latency_ms: f64,
    /// Process CPU utilisation sampled at completion, in percent.
    pub cpu_percent: f64,
    /// Process resident memory sampled at completion, in MiB.
    pub memory_mb: f64,
    /// Output tokens produced for this request (0 on failure).
    pub tokens_generated: u32,
    /// Derived throughput: `tokens_generated / (latency_ms / 1000)`.
    pub tokens_per_sec: f64,
    /// Unix epoch milliseconds at completion.
    pub timestamp_ms: u64,
}

/// Output tokens per second of wall-clock latency.
///
/// Defined as 0 when `latency_ms` is 0 so an instantaneous cache hit
/// never divides by zero.
pub(crate) fn tokens_per_sec(tokens_generated: u32, latency_ms: f64) -> f64 {
    if latency_ms <= 0.0 {
        return 0.0;
    }
    f64::from(tokens_generated) / (latency_ms / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throughput_derivation() {
        let tps = tokens_per_sec(20, 650.0);
        assert!((tps - 30.769).abs() < 0.01, "got {tps}");
    }

    #[test]
    fn throughput_zero_latency_is_zero() {
        assert_eq!(tokens_per_sec(20, 0.0), 0.0);
        assert_eq!(tokens_per_sec(0, 0.0), 0.0);
    }

    #[test]
    fn outcome_and_status_labels() {
        assert_eq!(CacheOutcome::Hit.as_str(), "hit");
        assert_eq!(CacheOutcome::Miss.as_str(), "miss");
        assert_eq!(RequestStatus::Ok.as_str(), "ok");
        assert_eq!(RequestStatus::Error.as_str(), "error");
    }

    #[test]
    fn metric_serializes_with_lowercase_outcome() {
        let metric = RequestMetric {
            request_id: Uuid::new_v4(),
            cache_outcome: CacheOutcome::Hit,
            status: RequestStatus::Ok,
            latency_ms: 1.5,
            cpu_percent: 12.0,
            memory_mb: 256.0,
            tokens_generated: 10,
            tokens_per_sec: 6666.6,
            timestamp_ms: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&metric).expect("serializable");
        assert_eq!(json["cache_outcome"], "hit");
        assert_eq!(json["status"], "ok");
        assert_eq!(json["tokens_generated"], 10);
    }
}
