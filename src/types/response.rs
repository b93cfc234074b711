//! Generation output types.

use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;
use crate::types::CacheOutcome;

/// Raw output of one backend generation: the text and how many tokens
/// it took to produce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// Generated text.
    pub text: String,

    /// Number of output tokens the backend produced.
    pub token_count: u32,
}

/// Response returned by the dispatcher for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateResponse {
    /// Generated text.
    pub text: String,

    /// Number of output tokens.
    pub token_count: u32,

    /// Whether this response was served without invoking the backend.
    pub outcome: CacheOutcome,
}

impl GenerateResponse {
    pub(crate) fn from_entry(entry: &CacheEntry, outcome: CacheOutcome) -> Self {
        Self {
            text: entry.text.clone(),
            token_count: entry.token_count,
            outcome,
        }
    }
}
