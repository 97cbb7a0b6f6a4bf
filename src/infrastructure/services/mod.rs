//! Infrastructure services

mod semantic_image_cache_service;

pub use semantic_image_cache_service::{SemanticImageCacheService, SemanticImageCacheServiceTrait};
