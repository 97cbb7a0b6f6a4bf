//! Image generation request and response types

use serde::{Deserialize, Serialize};

use crate::domain::{CacheOutcome, CacheSource, SemanticCacheStats};

/// Route prefix under which artifacts are served
pub const IMAGES_ROUTE: &str = "/images";

/// `POST /api/generate-image` body
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateImageRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// `POST /api/generate-image` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    pub image_url: String,
    pub source: CacheSource,
    pub cached: bool,
    pub similarity: Option<f32>,
}

impl From<CacheOutcome> for GenerateImageResponse {
    fn from(outcome: CacheOutcome) -> Self {
        Self {
            image_url: format!("{}/{}", IMAGES_ROUTE, outcome.artifact_reference),
            cached: outcome.cached(),
            source: outcome.source,
            similarity: outcome.similarity,
        }
    }
}

/// `GET /api/cache/stats` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsResponse {
    pub total_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub generation_failures: u64,
    pub hit_rate: f32,
}

impl From<SemanticCacheStats> for CacheStatsResponse {
    fn from(stats: SemanticCacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            total_entries: stats.total_entries,
            hits: stats.hits,
            misses: stats.misses,
            generation_failures: stats.generation_failures,
        }
    }
}
