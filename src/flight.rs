//! Single-flight coordination for concurrent identical requests.
//!
//! Without coordination, a burst of concurrent identical prompts pays
//! the full generation cost once per request — the check-then-insert
//! window of a naive cache lets the whole herd through. The
//! [`InFlightRegistry`] closes that window: the first caller for a key
//! becomes the **leader** and performs the generation; every concurrent
//! caller for the same key becomes a **follower** and awaits the
//! leader's outcome instead of invoking the backend.
//!
//! # Broadcast mechanism
//!
//! Each flight is a [`tokio::sync::watch`] channel holding
//! `Option<FlightResult>`. The registry keeps the sender; followers
//! subscribe and await the `None → Some` transition. One resolution
//! fans out to any number of waiters, and a follower that subscribes
//! after resolution observes the value immediately.
//!
//! # Invariants
//!
//! A key is present in the registry precisely while its generation is
//! outstanding: leadership is unique at any instant, and
//! [`complete()`](InFlightRegistry::complete) /
//! [`fail()`](InFlightRegistry::fail) — exactly one of which the leader
//! must call — remove the key. Resolving a key with no registered
//! flight is a [`RegistryInconsistency`](crate::MimirError::RegistryInconsistency).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tracing::error;

use crate::cache::CacheKey;
use crate::telemetry;
use crate::{CacheEntry, MimirError, Result};

/// Why a flight did not produce a cache entry.
///
/// `Clone` so one leader outcome can be delivered to every follower.
#[derive(Debug, Clone)]
pub enum FlightFailure {
    /// The leader's deadline elapsed while the backend was generating.
    Timeout { deadline: Duration },
    /// The backend reported an error.
    Backend(String),
}

impl From<FlightFailure> for MimirError {
    fn from(failure: FlightFailure) -> Self {
        match failure {
            FlightFailure::Timeout { deadline } => MimirError::BackendTimeout { deadline },
            FlightFailure::Backend(message) => MimirError::BackendFailure(message),
        }
    }
}

/// Outcome of one generation episode, shared across all its waiters.
pub type FlightResult = std::result::Result<CacheEntry, FlightFailure>;

/// Role assigned by [`InFlightRegistry::acquire_or_join`].
pub enum Flight {
    /// This caller performs the generation and must resolve the flight
    /// with exactly one `complete` or `fail`.
    Leader,
    /// Another caller is already generating; await its outcome.
    Follower(FlightHandle),
}

/// A follower's handle on the leader's eventual outcome.
pub struct FlightHandle {
    rx: watch::Receiver<Option<FlightResult>>,
}

impl FlightHandle {
    /// Await the leader's outcome, bounded by this request's own deadline.
    ///
    /// Suspends without busy-waiting. If the deadline fires first the
    /// follower is released with [`MimirError::BackendTimeout`] rather
    /// than hanging on the leader.
    pub async fn wait(mut self, deadline: Duration) -> Result<CacheEntry> {
        let resolved = tokio::time::timeout(deadline, self.rx.wait_for(Option::is_some)).await;
        match resolved {
            Err(_elapsed) => Err(MimirError::BackendTimeout { deadline }),
            Ok(Err(_closed)) => Err(MimirError::RegistryInconsistency(
                "flight abandoned without resolution".into(),
            )),
            Ok(Ok(outcome)) => match (*outcome).clone() {
                Some(Ok(entry)) => Ok(entry),
                Some(Err(failure)) => Err(failure.into()),
                None => Err(MimirError::RegistryInconsistency(
                    "flight resolved without an outcome".into(),
                )),
            },
        }
    }
}

/// Registry of pending generations, one flight per cache key.
pub struct InFlightRegistry {
    flights: Mutex<HashMap<CacheKey, watch::Sender<Option<FlightResult>>>>,
}

impl InFlightRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Become the leader for `key`, or join its in-flight generation.
    pub fn acquire_or_join(&self, key: CacheKey) -> Flight {
        let mut flights = lock_flights(&self.flights);
        if let Some(tx) = flights.get(&key) {
            return Flight::Follower(FlightHandle { rx: tx.subscribe() });
        }
        let (tx, _rx) = watch::channel(None);
        flights.insert(key, tx);
        metrics::gauge!(telemetry::IN_FLIGHT_GENERATIONS).set(flights.len() as f64);
        Flight::Leader
    }

    /// Deliver the leader's result to all followers and close the flight.
    pub fn complete(&self, key: &CacheKey, entry: CacheEntry) -> Result<()> {
        self.resolve(key, Ok(entry))
    }

    /// Deliver the leader's error to all followers and close the flight.
    ///
    /// The cache store is not touched — a failed generation leaves no
    /// entry behind.
    pub fn fail(&self, key: &CacheKey, failure: FlightFailure) -> Result<()> {
        self.resolve(key, Err(failure))
    }

    fn resolve(&self, key: &CacheKey, outcome: FlightResult) -> Result<()> {
        let tx = {
            let mut flights = lock_flights(&self.flights);
            let tx = flights.remove(key);
            metrics::gauge!(telemetry::IN_FLIGHT_GENERATIONS).set(flights.len() as f64);
            tx
        };
        let Some(tx) = tx else {
            error!(key = %key, "resolution for a key with no registered flight");
            return Err(MimirError::RegistryInconsistency(format!(
                "no flight registered for key {key}"
            )));
        };
        // A leader with zero followers has no receivers; that is fine.
        let _ = tx.send(Some(outcome));
        Ok(())
    }

    /// Number of generations currently outstanding.
    pub fn len(&self) -> usize {
        lock_flights(&self.flights).len()
    }

    /// Whether no generation is outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InFlightRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry state under the lock is a plain map; recover from poisoning
/// rather than propagating it.
fn lock_flights(
    flights: &Mutex<HashMap<CacheKey, watch::Sender<Option<FlightResult>>>>,
) -> std::sync::MutexGuard<'_, HashMap<CacheKey, watch::Sender<Option<FlightResult>>>> {
    flights.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
