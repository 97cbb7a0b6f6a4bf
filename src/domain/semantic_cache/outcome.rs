//! Request outcome and statistics

use serde::{Deserialize, Serialize};

/// Where a returned artifact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
    /// Served from a previously generated artifact
    Cache,
    /// Freshly produced by the image generator
    Api,
}

/// Result of a successful `generate_or_fetch`
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOutcome {
    /// Filename of the artifact, resolvable by the static file route
    pub artifact_reference: String,
    pub source: CacheSource,
    /// Similarity of the nearest prior entry, `None` if the index was empty
    pub similarity: Option<f32>,
}

impl CacheOutcome {
    pub fn hit(artifact_reference: impl Into<String>, similarity: f32) -> Self {
        Self {
            artifact_reference: artifact_reference.into(),
            source: CacheSource::Cache,
            similarity: Some(similarity),
        }
    }

    pub fn generated(artifact_reference: impl Into<String>, similarity: Option<f32>) -> Self {
        Self {
            artifact_reference: artifact_reference.into(),
            source: CacheSource::Api,
            similarity,
        }
    }

    pub fn cached(&self) -> bool {
        self.source == CacheSource::Cache
    }
}

/// Statistics for the semantic cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticCacheStats {
    /// Total number of entries in the index
    pub total_entries: usize,
    /// Requests served from cache
    pub hits: u64,
    /// Requests that went to the generator
    pub misses: u64,
    /// Generator calls that failed
    pub generation_failures: u64,
}

impl SemanticCacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;

        if total == 0 {
            return 0.0;
        }

        self.hits as f32 / total as f32
    }
}
