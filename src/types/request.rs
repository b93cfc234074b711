//! Generation request type and sampling parameters.

use serde::{Deserialize, Serialize};

use crate::{MimirError, Result};

/// A normalized text-generation request.
///
/// Carries the prompt plus every sampling parameter that influences the
/// generated output. Two requests that are identical after normalization
/// (see [`prompt_normalized()`](Self::prompt_normalized)) are treated as
/// requesting the identical result and share one cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Prompt text to generate from.
    pub prompt: String,

    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 to 2.0).
    /// Higher values make output more random.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Top-k sampling: only consider the k most likely tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Seed for deterministic generation (where supported).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Sequences where generation should stop.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl GenerateRequest {
    /// Create a request with the given prompt and no sampling overrides.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
            top_p: None,
            top_k: None,
            seed: None,
            stop_sequences: Vec::new(),
        }
    }

    /// Set max tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set top_p.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set top-k sampling.
    pub fn top_k(mut self, k: u32) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Set seed for deterministic generation.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set stop sequences.
    pub fn stop_sequences(mut self, sequences: Vec<String>) -> Self {
        self.stop_sequences = sequences;
        self
    }

    /// Add a single stop sequence.
    pub fn stop_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.stop_sequences.push(sequence.into());
        self
    }

    /// The prompt as it participates in cache-key derivation:
    /// leading and trailing whitespace stripped.
    pub fn prompt_normalized(&self) -> &str {
        self.prompt.trim()
    }

    /// Validate the request before dispatch.
    ///
    /// Rejects empty prompts, zero `max_tokens`, and non-finite sampling
    /// parameters (a NaN temperature would also break key derivation).
    pub fn validate(&self) -> Result<()> {
        if self.prompt_normalized().is_empty() {
            return Err(MimirError::InvalidRequest("prompt must not be empty".into()));
        }
        if self.max_tokens == Some(0) {
            return Err(MimirError::InvalidRequest("max_tokens must be positive".into()));
        }
        for (name, value) in [("temperature", self.temperature), ("top_p", self.top_p)] {
            if let Some(v) = value
                && !v.is_finite()
            {
                return Err(MimirError::InvalidRequest(format!("{name} must be finite")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_parameters() {
        let request = GenerateRequest::new("hello")
            .max_tokens(100)
            .temperature(0.7)
            .top_p(0.9)
            .top_k(40)
            .seed(42)
            .stop_sequence("\n\n");

        assert_eq!(request.max_tokens, Some(100));
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.top_p, Some(0.9));
        assert_eq!(request.top_k, Some(40));
        assert_eq!(request.seed, Some(42));
        assert_eq!(request.stop_sequences, vec!["\n\n".to_string()]);
    }

    #[test]
    fn prompt_normalized_trims_whitespace() {
        let request = GenerateRequest::new("  hello world \n");
        assert_eq!(request.prompt_normalized(), "hello world");
    }

    #[test]
    fn validate_rejects_empty_prompt() {
        assert!(GenerateRequest::new("   ").validate().is_err());
        assert!(GenerateRequest::new("hi").validate().is_ok());
    }

    #[test]
    fn validate_rejects_nan_temperature() {
        let request = GenerateRequest::new("hello").temperature(f32::NAN);
        assert!(request.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_max_tokens() {
        let request = GenerateRequest::new("hello").max_tokens(0);
        assert!(request.validate().is_err());
    }
}
