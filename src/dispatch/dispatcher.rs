//! Generation dispatcher.
//!
//! Orchestrates the full request path:
//!
//! ```text
//! request ──► derive key ──► cache lookup ──► hit ──────────────► respond
//!                                │
//!                                ▼ miss
//!                      in-flight registry
//!                      ┌────────┴─────────┐
//!                      ▼ leader           ▼ follower
//!               backend (deadline)   await leader
//!                │          │             │
//!                ▼ ok       ▼ error       │
//!             store +     fail ──────────►│
//!             complete                    ▼
//!                └──────────────────► respond
//! ```
//!
//! Exactly one [`RequestMetric`](crate::RequestMetric) is emitted per
//! request regardless of outcome. A failed or timed-out generation
//! caches nothing and releases every follower with the same error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use crate::cache::{CacheKey, CacheStore, KeyFields};
use crate::flight::{Flight, FlightFailure, InFlightRegistry};
use crate::telemetry::{AggregateSnapshot, MetricsAggregator, MetricsRecorder};
use crate::traits::ModelBackend;
use crate::types::{CacheOutcome, GenerateRequest, GenerateResponse, RequestStatus};
use crate::{MimirError, Result};

/// Caching front for one [`ModelBackend`].
///
/// Owns the cache store, the in-flight registry, and the metrics
/// pipeline; constructed once at service start via
/// [`Mimir::builder()`](crate::Mimir::builder) and shared behind an
/// `Arc` by the transport layer. Correct under true parallelism — many
/// requests may be in `generate()` concurrently.
pub struct Dispatcher {
    backend: Arc<dyn ModelBackend>,
    cache: CacheStore,
    flights: InFlightRegistry,
    recorder: MetricsRecorder,
    aggregator: Arc<MetricsAggregator>,
    deadline: Duration,
    key_fields: KeyFields,
}

impl Dispatcher {
    pub(crate) fn new(
        backend: Arc<dyn ModelBackend>,
        cache: CacheStore,
        recorder: MetricsRecorder,
        aggregator: Arc<MetricsAggregator>,
        deadline: Duration,
        key_fields: KeyFields,
    ) -> Self {
        Self {
            backend,
            cache,
            flights: InFlightRegistry::new(),
            recorder,
            aggregator,
            deadline,
            key_fields,
        }
    }

    /// Serve one generation request.
    ///
    /// Returns exactly one of: the generated (possibly cached) text, a
    /// [`BackendTimeout`](MimirError::BackendTimeout), or a backend
    /// error — never a partial result.
    #[instrument(skip(self, request), fields(prompt_len = request.prompt.len()))]
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let started = Instant::now();
        let (outcome, result) = self.dispatch(request).await;
        let (status, tokens_generated) = match &result {
            Ok(response) => (RequestStatus::Ok, response.token_count),
            Err(_) => (RequestStatus::Error, 0),
        };
        self.recorder.record(outcome, status, tokens_generated, started);
        result
    }

    async fn dispatch(
        &self,
        request: &GenerateRequest,
    ) -> (CacheOutcome, Result<GenerateResponse>) {
        if let Err(err) = request.validate() {
            return (CacheOutcome::Miss, Err(err));
        }

        let key = CacheKey::derive(request, &self.key_fields);
        if let Some(entry) = self.cache.lookup(&key) {
            debug!(key = %key, "cache hit");
            return (
                CacheOutcome::Hit,
                Ok(GenerateResponse::from_entry(&entry, CacheOutcome::Hit)),
            );
        }

        match self.flights.acquire_or_join(key) {
            Flight::Leader => (CacheOutcome::Miss, self.lead(key, request).await),
            Flight::Follower(handle) => {
                debug!(key = %key, "joining in-flight generation");
                let result = handle
                    .wait(self.deadline)
                    .await
                    .map(|entry| GenerateResponse::from_entry(&entry, CacheOutcome::Hit));
                // A follower pays no backend call of its own — that is a
                // hit for accounting purposes even when the leader failed.
                (CacheOutcome::Hit, result)
            }
        }
    }

    /// Leader path: invoke the backend under the deadline, then resolve
    /// the flight exactly once.
    async fn lead(&self, key: CacheKey, request: &GenerateRequest) -> Result<GenerateResponse> {
        let generation = tokio::time::timeout(
            self.deadline,
            self.backend.generate(request, self.deadline),
        )
        .await;

        match generation {
            Ok(Ok(generation)) => {
                let entry = self.cache.insert(key, generation.text, generation.token_count);
                self.flights.complete(&key, entry.clone())?;
                Ok(GenerateResponse::from_entry(&entry, CacheOutcome::Miss))
            }
            Ok(Err(err)) => {
                warn!(key = %key, error = %err, "backend generation failed");
                self.flights
                    .fail(&key, FlightFailure::Backend(err.to_string()))?;
                Err(err)
            }
            Err(_elapsed) => {
                warn!(key = %key, deadline = ?self.deadline, "backend deadline exceeded");
                self.flights.fail(
                    &key,
                    FlightFailure::Timeout {
                        deadline: self.deadline,
                    },
                )?;
                Err(MimirError::BackendTimeout {
                    deadline: self.deadline,
                })
            }
        }
    }

    /// Aggregate statistics for the external scraper.
    pub fn snapshot(&self) -> AggregateSnapshot {
        self.aggregator.snapshot()
    }

    /// Number of cached generations.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Fixed cache capacity.
    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Number of generations currently outstanding.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// The per-request deadline this dispatcher enforces.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}
