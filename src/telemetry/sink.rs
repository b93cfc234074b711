//! Push-based seam for per-request structured records.
//!
//! One [`RequestMetric`] is emitted per request through a [`RecordSink`].
//! Delivery is best-effort by contract: a sink that drops or fails to
//! write a record must not affect the request outcome, so `emit` is
//! infallible at the trait boundary and implementations swallow their
//! own I/O errors.
//!
//! [`TracingSink`] is the default — one `tracing` event per request
//! with fields matching [`RequestMetric`], which a shipping subscriber
//! (journald, OTLP, a TCP forwarder) picks up like any other event.
//! [`WriterSink`] writes JSON lines for pipelines that tail a stream
//! instead.

use std::io::Write;
use std::sync::Mutex;

use tracing::info;

use crate::types::RequestMetric;

/// Consumer of per-request structured records.
pub trait RecordSink: Send + Sync {
    /// Deliver one record. Must not block request completion and must
    /// not fail it — losses are acceptable, errors are the sink's own.
    fn emit(&self, metric: &RequestMetric);
}

/// Default sink: one structured `tracing` event per request.
pub struct TracingSink;

impl RecordSink for TracingSink {
    fn emit(&self, metric: &RequestMetric) {
        info!(
            target: "mimir::requests",
            request_id = %metric.request_id,
            cache_outcome = metric.cache_outcome.as_str(),
            status = metric.status.as_str(),
            latency_ms = metric.latency_ms,
            cpu_percent = metric.cpu_percent,
            memory_mb = metric.memory_mb,
            tokens_generated = metric.tokens_generated,
            tokens_per_sec = metric.tokens_per_sec,
            timestamp_ms = metric.timestamp_ms,
            "request completed"
        );
    }
}

/// JSON-lines sink: one serialized [`RequestMetric`] per line.
///
/// Useful where the shipping pipeline tails a stream rather than
/// subscribing to `tracing`. Write errors are dropped per the
/// best-effort contract.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl WriterSink<std::io::Stdout> {
    /// Convenience constructor writing to stdout.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> RecordSink for WriterSink<W> {
    fn emit(&self, metric: &RequestMetric) {
        let Ok(line) = serde_json::to_string(metric) else {
            return;
        };
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let _ = writeln!(writer, "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CacheOutcome, RequestStatus};
    use uuid::Uuid;

    fn metric() -> RequestMetric {
        RequestMetric {
            request_id: Uuid::new_v4(),
            cache_outcome: CacheOutcome::Miss,
            status: RequestStatus::Ok,
            latency_ms: 650.0,
            cpu_percent: 25.0,
            memory_mb: 512.0,
            tokens_generated: 20,
            tokens_per_sec: 30.77,
            timestamp_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn tracing_sink_does_not_panic_without_subscriber() {
        TracingSink.emit(&metric());
    }

    #[test]
    fn writer_sink_emits_one_json_line_per_record() {
        let sink = WriterSink::new(Vec::new());
        sink.emit(&metric());
        sink.emit(&metric());

        let buffer = sink.writer.into_inner().expect("no poison");
        let text = String::from_utf8(buffer).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).expect("valid json");
        assert_eq!(parsed["cache_outcome"], "miss");
        assert_eq!(parsed["tokens_generated"], 20);
    }
}
