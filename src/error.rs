//! Mimir error types

use std::time::Duration;

/// Mimir error types
#[derive(Debug, thiserror::Error)]
pub enum MimirError {
    // Backend errors
    /// The per-request deadline elapsed while the backend was generating.
    /// Not retried by this crate; surfaced to the caller and to every
    /// follower waiting on the same key. Nothing is cached.
    #[error("backend deadline exceeded after {deadline:?}")]
    BackendTimeout { deadline: Duration },

    /// The backend reported an error. Surfaced, never cached.
    #[error("backend failure: {0}")]
    BackendFailure(String),

    // Coordination errors
    /// Invariant violation in the in-flight registry (e.g. a completion
    /// for a key with no registered flight). A programming-error signal,
    /// not a retryable condition.
    #[error("in-flight registry inconsistency: {0}")]
    RegistryInconsistency(String),

    // Request errors
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Configuration errors
    #[error("no backend configured")]
    NoBackend,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Mimir operations
pub type Result<T> = std::result::Result<T, MimirError>;
