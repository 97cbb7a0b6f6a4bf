//! Semantic image cache
//!
//! Serves generated images for text prompts, reusing a stored image when a
//! semantically similar prompt has been seen before:
//! - Pluggable prompt encoders (local feature hashing, OpenAI embeddings)
//! - Similarity index backends (in-memory, append-only file, pgvector)
//! - Stability AI image generation on cache misses
//! - Filesystem artifact storage served over HTTP

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use api::state::AppState;
use infrastructure::{
    artifact::FilesystemArtifactStore,
    embedding::EncoderFactory,
    generator::StabilityImageGenerator,
    http::HttpClient,
    semantic_cache::SimilarityIndexFactory,
    services::SemanticImageCacheService,
};
use tracing::info;

/// Create the application state with custom configuration
///
/// Fails if any backend cannot be opened or the index was built by a
/// different encoder.
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let encoder = EncoderFactory::create(&config.encoder)?;
    info!(encoder = %encoder.identity(), "Encoder ready");

    let index = SimilarityIndexFactory::create(&config.index, encoder.identity().clone()).await?;
    info!(backend = %config.index.backend, "Similarity index ready");

    let artifacts = FilesystemArtifactStore::open(&config.artifacts.dir).await?;
    info!(dir = %config.artifacts.dir.display(), "Artifact store ready");

    let client = HttpClient::with_timeout(Duration::from_secs(config.generator.timeout_secs))?;
    let generator = StabilityImageGenerator::new(client, &config.generator)?;

    let service = SemanticImageCacheService::with_config(
        encoder,
        index,
        Arc::new(generator),
        Arc::new(artifacts),
        config.cache.clone(),
    )?;

    Ok(AppState::new(Arc::new(service), config.artifacts.dir.clone()))
}
