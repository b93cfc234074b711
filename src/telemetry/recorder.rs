//! Per-request measurement.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::telemetry;
use crate::telemetry::aggregator::MetricsAggregator;
use crate::telemetry::resource::ResourceSampler;
use crate::telemetry::sink::RecordSink;
use crate::types::metric::tokens_per_sec;
use crate::types::{CacheOutcome, RequestMetric, RequestStatus};

/// Builds one [`RequestMetric`] per completed request and fans it out.
///
/// Measurement is decoupled from transport: the recorder feeds the
/// in-process [`MetricsAggregator`], the injected [`RecordSink`], and
/// the `metrics` facade; log shipping and scraping stay external.
pub struct MetricsRecorder {
    aggregator: Arc<MetricsAggregator>,
    sink: Arc<dyn RecordSink>,
    resources: ResourceSampler,
}

impl MetricsRecorder {
    pub fn new(aggregator: Arc<MetricsAggregator>, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            aggregator,
            sink,
            resources: ResourceSampler::new(),
        }
    }

    /// Record one completed request.
    ///
    /// `started` is the instant the request was received; latency is
    /// wall-clock from receipt to response. CPU and memory are
    /// point-in-time process samples taken here, at completion.
    pub fn record(
        &self,
        outcome: CacheOutcome,
        status: RequestStatus,
        tokens_generated: u32,
        started: Instant,
    ) -> RequestMetric {
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let resources = self.resources.sample();

        let metric = RequestMetric {
            request_id: Uuid::new_v4(),
            cache_outcome: outcome,
            status,
            latency_ms,
            cpu_percent: resources.cpu_percent,
            memory_mb: resources.memory_mb,
            tokens_generated,
            tokens_per_sec: tokens_per_sec(tokens_generated, latency_ms),
            timestamp_ms: epoch_ms(),
        };

        self.aggregator.ingest(&metric);
        self.sink.emit(&metric);

        metrics::counter!(
            telemetry::REQUESTS_TOTAL,
            "outcome" => outcome.as_str(),
            "status" => status.as_str()
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "outcome" => outcome.as_str())
            .record(latency_ms / 1000.0);
        if tokens_generated > 0 {
            metrics::counter!(telemetry::TOKENS_GENERATED_TOTAL).increment(u64::from(tokens_generated));
        }

        metric
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
