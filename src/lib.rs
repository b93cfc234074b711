//! Mimir — request cache and single-flight core for text-generation services
//!
//! This crate sits in front of an autoregressive text-generation backend
//! and decides, for every inbound request, whether a previously computed
//! result can be reused. It guarantees that concurrent identical requests
//! trigger exactly one backend generation, bounds memory with strict LRU
//! eviction, and produces per-request and aggregate performance telemetry
//! for capacity planning and alerting.
//!
//! The backend itself, the HTTP transport, and the log-shipping/scraping
//! infrastructure are external collaborators behind trait seams
//! ([`ModelBackend`], [`RecordSink`]) — this crate owns only the cache,
//! the coordination, and the measurement.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use mimir::{GenerateRequest, Generation, Mimir, ModelBackend, Result};
//!
//! struct EchoBackend;
//!
//! #[async_trait]
//! impl ModelBackend for EchoBackend {
//!     async fn generate(&self, request: &GenerateRequest, _deadline: Duration) -> Result<Generation> {
//!         Ok(Generation {
//!             text: request.prompt.clone(),
//!             token_count: 1,
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let dispatcher = Mimir::builder()
//!         .backend(Arc::new(EchoBackend))
//!         .capacity(100)
//!         .deadline(Duration::from_secs(2))
//!         .build()?;
//!
//!     let request = GenerateRequest::new("What is the capital of France?").max_tokens(100);
//!     let response = dispatcher.generate(&request).await?;
//!     println!("{} ({})", response.text, response.outcome.as_str());
//!
//!     // Second identical request is served from cache without a backend call.
//!     let cached = dispatcher.generate(&request).await?;
//!     assert_eq!(cached.text, response.text);
//!
//!     println!("{}", serde_json::to_string(&dispatcher.snapshot()).expect("serializable"));
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod flight;
pub mod telemetry;
pub mod traits;
pub mod types;

// Re-export main types at crate root
pub use cache::{CacheEntry, CacheKey, CacheStore, KeyFields};
pub use config::MimirConfig;
pub use dispatch::{Dispatcher, Mimir, MimirBuilder};
pub use error::{MimirError, Result};
pub use flight::{Flight, FlightFailure, FlightHandle, FlightResult, InFlightRegistry};
pub use telemetry::{
    AggregateSnapshot, MetricsAggregator, MetricsRecorder, RecordSink, TracingSink, WriterSink,
};
pub use traits::ModelBackend;
pub use types::{
    CacheOutcome, GenerateRequest, GenerateResponse, Generation, RequestMetric, RequestStatus,
};
