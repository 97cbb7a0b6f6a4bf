//! Image generation endpoints

use axum::extract::State;
use tracing::debug;

use super::state::AppState;
use super::types::{
    ApiError, CacheStatsResponse, GenerateImageRequest, GenerateImageResponse, Json,
};

/// `POST /api/generate-image`
pub async fn generate_image(
    State(state): State<AppState>,
    Json(request): Json<GenerateImageRequest>,
) -> Result<Json<GenerateImageResponse>, ApiError> {
    let prompt = request
        .prompt
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("Prompt is required").with_param("prompt"))?;

    let outcome = state.cache_service.generate_or_fetch(&prompt).await?;

    debug!(
        source = ?outcome.source,
        artifact = %outcome.artifact_reference,
        "Served image request"
    );

    Ok(Json(outcome.into()))
}

/// `GET /api/cache/stats`
pub async fn cache_stats(
    State(state): State<AppState>,
) -> Result<Json<CacheStatsResponse>, ApiError> {
    let stats = state.cache_service.stats().await?;

    Ok(Json(stats.into()))
}
