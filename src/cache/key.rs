//! Cache-key derivation.
//!
//! A [`CacheKey`] is a SHA-256 fingerprint of the normalized request.
//! Two requests with identical fingerprints are treated as requesting
//! the identical result. The hash is stable across process restarts —
//! there is no per-process salt — so a redeployed instance derives the
//! same keys for the same requests.
//!
//! Every sampling parameter that influences output participates in the
//! key by default. [`KeyFields`] lets a deployment exclude individual
//! parameters (e.g. treat requests differing only in `seed` as
//! identical); the prompt always participates. Each field is hashed
//! with a domain tag and a presence marker, so an absent parameter
//! never collides with a present one.

use std::fmt;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::types::GenerateRequest;

/// Deterministic fingerprint of a normalized generation request.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Derive the key for a request under the given field selection.
    pub fn derive(request: &GenerateRequest, fields: &KeyFields) -> Self {
        let mut hasher = Sha256::new();

        hash_str(&mut hasher, b"prompt", request.prompt_normalized());
        if fields.max_tokens {
            hash_opt(&mut hasher, b"max_tokens", request.max_tokens.map(u32::to_le_bytes));
        }
        if fields.temperature {
            hash_opt(&mut hasher, b"temperature", request.temperature.map(canon_f32));
        }
        if fields.top_p {
            hash_opt(&mut hasher, b"top_p", request.top_p.map(canon_f32));
        }
        if fields.top_k {
            hash_opt(&mut hasher, b"top_k", request.top_k.map(u32::to_le_bytes));
        }
        if fields.seed {
            hash_opt(&mut hasher, b"seed", request.seed.map(u64::to_le_bytes));
        }
        if fields.stop_sequences {
            hasher.update(b"stop_sequences");
            hasher.update((request.stop_sequences.len() as u64).to_le_bytes());
            for sequence in &request.stop_sequences {
                hash_str(&mut hasher, b"stop", sequence);
            }
        }

        Self(hasher.finalize().into())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Short hex prefix, enough to correlate log lines.
impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({self}…)")
    }
}

/// Length-prefixed string hashing — "ab" + "c" never collides with "a" + "bc".
fn hash_str(hasher: &mut Sha256, tag: &[u8], value: &str) {
    hasher.update(tag);
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// Presence-tagged optional field hashing.
fn hash_opt<const N: usize>(hasher: &mut Sha256, tag: &[u8], value: Option<[u8; N]>) {
    hasher.update(tag);
    match value {
        Some(bytes) => {
            hasher.update([1u8]);
            hasher.update(bytes);
        }
        None => hasher.update([0u8]),
    }
}

/// Canonical float encoding: `-0.0` folds into `0.0` so the two spellings
/// derive the same key. NaN is rejected upstream by request validation.
fn canon_f32(value: f32) -> [u8; 4] {
    let value = if value == 0.0 { 0.0 } else { value };
    value.to_le_bytes()
}

/// Which request fields participate in cache-key derivation.
///
/// The prompt always participates; each sampling parameter can be
/// excluded per deployment. All fields are included by default —
/// anything that can influence the generated output should distinguish
/// cache entries unless the operator decides otherwise.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyFields {
    #[serde(default = "default_true")]
    pub max_tokens: bool,
    #[serde(default = "default_true")]
    pub temperature: bool,
    #[serde(default = "default_true")]
    pub top_p: bool,
    #[serde(default = "default_true")]
    pub top_k: bool,
    #[serde(default = "default_true")]
    pub seed: bool,
    #[serde(default = "default_true")]
    pub stop_sequences: bool,
}

impl Default for KeyFields {
    fn default() -> Self {
        Self {
            max_tokens: true,
            temperature: true,
            top_p: true,
            top_k: true,
            seed: true,
            stop_sequences: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(request: &GenerateRequest) -> CacheKey {
        CacheKey::derive(request, &KeyFields::default())
    }

    #[test]
    fn key_deterministic() {
        let request = GenerateRequest::new("hello").max_tokens(100).temperature(0.7);
        assert_eq!(key(&request), key(&request.clone()));
    }

    #[test]
    fn key_differs_on_prompt() {
        let a = GenerateRequest::new("hello");
        let b = GenerateRequest::new("world");
        assert_ne!(key(&a), key(&b));
    }

    #[test]
    fn key_differs_on_sampling_parameters() {
        let base = GenerateRequest::new("hello");
        assert_ne!(key(&base), key(&base.clone().max_tokens(100)));
        assert_ne!(key(&base), key(&base.clone().temperature(0.7)));
        assert_ne!(key(&base), key(&base.clone().top_p(0.9)));
        assert_ne!(key(&base), key(&base.clone().top_k(40)));
        assert_ne!(key(&base), key(&base.clone().seed(7)));
        assert_ne!(key(&base), key(&base.clone().stop_sequence("\n")));
    }

    #[test]
    fn key_ignores_surrounding_whitespace() {
        let a = GenerateRequest::new("hello");
        let b = GenerateRequest::new("  hello\n");
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn excluded_field_does_not_affect_key() {
        let fields = KeyFields {
            seed: false,
            ..KeyFields::default()
        };
        let a = GenerateRequest::new("hello").seed(1);
        let b = GenerateRequest::new("hello").seed(2);
        assert_eq!(CacheKey::derive(&a, &fields), CacheKey::derive(&b, &fields));
        assert_ne!(key(&a), key(&b));
    }

    #[test]
    fn absent_differs_from_present() {
        let a = GenerateRequest::new("hello");
        let b = GenerateRequest::new("hello").temperature(0.0);
        assert_ne!(key(&a), key(&b));
    }

    #[test]
    fn negative_zero_folds_into_zero() {
        let a = GenerateRequest::new("hello").temperature(0.0);
        let b = GenerateRequest::new("hello").temperature(-0.0);
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn stop_sequence_split_does_not_collide() {
        let a = GenerateRequest::new("hello").stop_sequences(vec!["ab".into(), "c".into()]);
        let b = GenerateRequest::new("hello").stop_sequences(vec!["a".into(), "bc".into()]);
        assert_ne!(key(&a), key(&b));
    }
}
