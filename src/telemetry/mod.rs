//! Telemetry: per-request measurement, aggregation, and metric names.
//!
//! Three layers, decoupled from transport:
//!
//! - [`MetricsRecorder`] — builds one immutable
//!   [`RequestMetric`](crate::RequestMetric) per completed request and
//!   fans it out to the aggregator, the record sink, and the `metrics`
//!   facade.
//! - [`MetricsAggregator`] — running counters plus a bounded latency
//!   reservoir; non-blocking [`snapshot()`](MetricsAggregator::snapshot)
//!   for pull-based scraping.
//! - [`RecordSink`] — the push-based seam for structured per-request
//!   records (log shipping). Delivery is best-effort by contract; a
//!   lost record never affects the request outcome.
//!
//! # Metric naming conventions
//!
//! Facade metrics are prefixed with `mimir_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`). Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all facade calls are no-ops.
//!
//! # Common labels
//!
//! - `outcome` — "hit" (served without a backend call) or "miss"
//! - `status` — "ok" or "error"

pub mod aggregator;
pub mod recorder;
pub(crate) mod resource;
pub mod sink;

pub use aggregator::{AggregateSnapshot, MetricsAggregator};
pub use recorder::MetricsRecorder;
pub use sink::{RecordSink, TracingSink, WriterSink};

/// Total requests dispatched.
///
/// Labels: `outcome` ("hit" | "miss"), `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "mimir_requests_total";

/// Request duration in seconds.
///
/// Labels: `outcome`.
pub const REQUEST_DURATION_SECONDS: &str = "mimir_request_duration_seconds";

/// Total output tokens produced.
pub const TOKENS_GENERATED_TOTAL: &str = "mimir_tokens_generated_total";

/// Total cache entries evicted to enforce the capacity bound.
pub const CACHE_EVICTIONS_TOTAL: &str = "mimir_cache_evictions_total";

/// Entries currently in the cache (gauge).
pub const CACHE_ENTRIES: &str = "mimir_cache_entries";

/// Generations currently outstanding in the in-flight registry (gauge).
pub const IN_FLIGHT_GENERATIONS: &str = "mimir_in_flight_generations";
