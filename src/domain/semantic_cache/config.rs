//! Semantic cache configuration

use serde::{Deserialize, Serialize};

use crate::domain::prompt::DEFAULT_MAX_PROMPT_CHARS;
use crate::domain::DomainError;

/// Configuration for the semantic image cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticCacheConfig {
    /// Similarity threshold for cache hits (0.0 to 1.0)
    /// A hit requires similarity strictly greater than this value
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Maximum prompt length in characters
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    /// Serialize concurrent misses for the same prompt so only one generates
    #[serde(default)]
    pub dedupe_in_flight: bool,
}

fn default_similarity_threshold() -> f32 {
    0.80
}

fn default_max_prompt_chars() -> usize {
    DEFAULT_MAX_PROMPT_CHARS
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_prompt_chars: default_max_prompt_chars(),
            dedupe_in_flight: false,
        }
    }
}

impl SemanticCacheConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the similarity threshold
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the maximum prompt length
    pub fn with_max_prompt_chars(mut self, max: usize) -> Self {
        self.max_prompt_chars = max;
        self
    }

    /// Set whether concurrent misses for the same prompt are de-duplicated
    pub fn with_dedupe_in_flight(mut self, dedupe: bool) -> Self {
        self.dedupe_in_flight = dedupe;
        self
    }

    /// Reject values that deserialization lets through unchecked
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(DomainError::configuration(format!(
                "cache.similarity_threshold must be between 0.0 and 1.0, got {}",
                self.similarity_threshold
            )));
        }

        if self.max_prompt_chars == 0 {
            return Err(DomainError::configuration(
                "cache.max_prompt_chars must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Strict threshold policy: equality is a miss
    pub fn is_hit(&self, similarity: f32) -> bool {
        similarity > self.similarity_threshold
    }
}
