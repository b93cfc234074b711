//! Model backend seam.

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;
use crate::types::{GenerateRequest, Generation};

/// The external text-generation backend this crate fronts.
///
/// Assumed potentially slow (seconds) — it is the sole source of miss
/// latency. The dispatcher enforces `deadline` by abandoning the call
/// when it elapses; backends that support native cancellation should
/// also honour the hint themselves so work stops promptly.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Generate text for the request, returning the text and how many
    /// output tokens were produced.
    async fn generate(&self, request: &GenerateRequest, deadline: Duration) -> Result<Generation>;
}
