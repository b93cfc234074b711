//! Builder for configuring dispatcher instances.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStore, DEFAULT_CAPACITY, KeyFields};
use crate::config::MimirConfig;
use crate::telemetry::aggregator::DEFAULT_LATENCY_RESERVOIR;
use crate::telemetry::{MetricsAggregator, MetricsRecorder, RecordSink, TracingSink};
use crate::traits::ModelBackend;
use crate::{Dispatcher, MimirError, Result};

/// Default per-request deadline.
pub(crate) const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Main entry point for creating dispatcher instances.
pub struct Mimir;

impl Mimir {
    /// Create a new builder for configuring the dispatcher.
    pub fn builder() -> MimirBuilder {
        MimirBuilder::new()
    }
}

/// Builder for configuring dispatcher instances.
pub struct MimirBuilder {
    backend: Option<Arc<dyn ModelBackend>>,
    capacity: usize,
    deadline: Duration,
    key_fields: KeyFields,
    latency_reservoir: usize,
    sink: Option<Arc<dyn RecordSink>>,
}

impl MimirBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            capacity: DEFAULT_CAPACITY,
            deadline: DEFAULT_DEADLINE,
            key_fields: KeyFields::default(),
            latency_reservoir: DEFAULT_LATENCY_RESERVOIR,
            sink: None,
        }
    }

    /// Start from a loaded [`MimirConfig`].
    pub fn from_config(config: &MimirConfig) -> Self {
        Self {
            backend: None,
            capacity: config.capacity,
            deadline: config.deadline(),
            key_fields: config.key_fields.clone(),
            latency_reservoir: config.latency_reservoir,
            sink: None,
        }
    }

    /// Set the model backend the dispatcher fronts. Required.
    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the cache capacity (default: 100).
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the per-request deadline (default: 30s).
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Select which request fields participate in key derivation.
    pub fn key_fields(mut self, fields: KeyFields) -> Self {
        self.key_fields = fields;
        self
    }

    /// Set the latency reservoir size for percentile estimation
    /// (default: 1024 samples).
    pub fn latency_reservoir(mut self, samples: usize) -> Self {
        self.latency_reservoir = samples;
        self
    }

    /// Inject a record sink for per-request structured records
    /// (default: [`TracingSink`]).
    pub fn record_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the dispatcher.
    pub fn build(self) -> Result<Dispatcher> {
        let backend = self.backend.ok_or(MimirError::NoBackend)?;
        let capacity = NonZeroUsize::new(self.capacity)
            .ok_or_else(|| MimirError::Configuration("cache capacity must be positive".into()))?;
        if self.deadline.is_zero() {
            return Err(MimirError::Configuration("deadline must be positive".into()));
        }
        if self.latency_reservoir == 0 {
            return Err(MimirError::Configuration(
                "latency reservoir must be positive".into(),
            ));
        }

        let aggregator = Arc::new(MetricsAggregator::new(self.latency_reservoir));
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let recorder = MetricsRecorder::new(Arc::clone(&aggregator), sink);

        Ok(Dispatcher::new(
            backend,
            CacheStore::new(capacity),
            recorder,
            aggregator,
            self.deadline,
            self.key_fields,
        ))
    }
}

impl Default for MimirBuilder {
    fn default() -> Self {
        Self::new()
    }
}
