//! Tests for the single-flight coordinator.

use std::time::{Duration, Instant};

use tokio_test::assert_ok;

use mimir::cache::{CacheKey, KeyFields};
use mimir::flight::{Flight, FlightFailure, InFlightRegistry};
use mimir::types::GenerateRequest;
use mimir::{CacheEntry, MimirError};

fn key_for(prompt: &str) -> CacheKey {
    CacheKey::derive(&GenerateRequest::new(prompt), &KeyFields::default())
}

fn entry_for(key: CacheKey, text: &str) -> CacheEntry {
    let now = Instant::now();
    CacheEntry {
        key,
        text: text.into(),
        token_count: text.len() as u32,
        created_at: now,
        last_accessed_at: now,
    }
}

// =========================================================================
// Leadership assignment
// =========================================================================

#[tokio::test]
async fn first_caller_becomes_leader() {
    let registry = InFlightRegistry::new();
    let key = key_for("prompt");

    assert!(matches!(registry.acquire_or_join(key), Flight::Leader));
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn subsequent_callers_become_followers() {
    let registry = InFlightRegistry::new();
    let key = key_for("prompt");

    let _leader = registry.acquire_or_join(key);
    assert!(matches!(registry.acquire_or_join(key), Flight::Follower(_)));
    assert!(matches!(registry.acquire_or_join(key), Flight::Follower(_)));
    // Leadership is unique: still one flight for the key.
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn distinct_keys_get_independent_leaders() {
    let registry = InFlightRegistry::new();

    assert!(matches!(registry.acquire_or_join(key_for("a")), Flight::Leader));
    assert!(matches!(registry.acquire_or_join(key_for("b")), Flight::Leader));
    assert_eq!(registry.len(), 2);
}

// =========================================================================
// Completion
// =========================================================================

#[tokio::test]
async fn complete_delivers_result_to_all_followers() {
    let registry = InFlightRegistry::new();
    let key = key_for("prompt");

    let _leader = registry.acquire_or_join(key);
    let followers: Vec<_> = (0..3)
        .map(|_| match registry.acquire_or_join(key) {
            Flight::Follower(handle) => handle,
            Flight::Leader => panic!("leadership must be unique"),
        })
        .collect();

    tokio_test::assert_ok!(registry.complete(&key, entry_for(key, "the result")));

    for handle in followers {
        let entry = handle.wait(Duration::from_secs(1)).await.expect("resolved");
        assert_eq!(entry.text, "the result");
    }
}

#[tokio::test]
async fn complete_removes_the_flight() {
    let registry = InFlightRegistry::new();
    let key = key_for("prompt");

    let _leader = registry.acquire_or_join(key);
    registry.complete(&key, entry_for(key, "r")).expect("registered");

    assert!(registry.is_empty());
    // The next caller for the key starts a fresh generation episode.
    assert!(matches!(registry.acquire_or_join(key), Flight::Leader));
}

#[tokio::test]
async fn follower_waiting_before_completion_is_woken() {
    let registry = std::sync::Arc::new(InFlightRegistry::new());
    let key = key_for("prompt");

    let _leader = registry.acquire_or_join(key);
    let Flight::Follower(handle) = registry.acquire_or_join(key) else {
        panic!("expected follower");
    };

    let waiter = tokio::spawn(handle.wait(Duration::from_secs(5)));
    tokio::task::yield_now().await;

    registry.complete(&key, entry_for(key, "late")).expect("registered");

    let entry = waiter.await.expect("join").expect("resolved");
    assert_eq!(entry.text, "late");
}

// =========================================================================
// Failure
// =========================================================================

#[tokio::test]
async fn fail_delivers_error_to_all_followers() {
    let registry = InFlightRegistry::new();
    let key = key_for("prompt");

    let _leader = registry.acquire_or_join(key);
    let Flight::Follower(handle) = registry.acquire_or_join(key) else {
        panic!("expected follower");
    };

    registry
        .fail(&key, FlightFailure::Backend("model exploded".into()))
        .expect("registered");

    match handle.wait(Duration::from_secs(1)).await {
        Err(MimirError::BackendFailure(message)) => assert_eq!(message, "model exploded"),
        other => panic!("expected BackendFailure, got {other:?}"),
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn timeout_failure_maps_to_backend_timeout() {
    let registry = InFlightRegistry::new();
    let key = key_for("prompt");

    let _leader = registry.acquire_or_join(key);
    let Flight::Follower(handle) = registry.acquire_or_join(key) else {
        panic!("expected follower");
    };

    registry
        .fail(
            &key,
            FlightFailure::Timeout {
                deadline: Duration::from_secs(2),
            },
        )
        .expect("registered");

    assert!(matches!(
        handle.wait(Duration::from_secs(1)).await,
        Err(MimirError::BackendTimeout { .. })
    ));
}

// =========================================================================
// Registry consistency
// =========================================================================

#[tokio::test]
async fn resolving_unregistered_key_is_an_inconsistency() {
    let registry = InFlightRegistry::new();
    let key = key_for("prompt");

    assert!(matches!(
        registry.complete(&key, entry_for(key, "r")),
        Err(MimirError::RegistryInconsistency(_))
    ));
    assert!(matches!(
        registry.fail(&key, FlightFailure::Backend("e".into())),
        Err(MimirError::RegistryInconsistency(_))
    ));
}

#[tokio::test]
async fn double_completion_is_an_inconsistency() {
    let registry = InFlightRegistry::new();
    let key = key_for("prompt");

    let _leader = registry.acquire_or_join(key);
    registry.complete(&key, entry_for(key, "r")).expect("first resolution");

    assert!(matches!(
        registry.complete(&key, entry_for(key, "r")),
        Err(MimirError::RegistryInconsistency(_))
    ));
}

// =========================================================================
// Follower deadline
// =========================================================================

#[tokio::test(start_paused = true)]
async fn follower_deadline_releases_without_resolution() {
    let registry = InFlightRegistry::new();
    let key = key_for("prompt");

    let _leader = registry.acquire_or_join(key);
    let Flight::Follower(handle) = registry.acquire_or_join(key) else {
        panic!("expected follower");
    };

    let waited = tokio::time::Instant::now();
    let result = handle.wait(Duration::from_secs(2)).await;

    assert!(matches!(result, Err(MimirError::BackendTimeout { .. })));
    assert_eq!(waited.elapsed(), Duration::from_secs(2));
}
