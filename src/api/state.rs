//! Application state for shared services

use std::path::PathBuf;
use std::sync::Arc;

use crate::infrastructure::services::SemanticImageCacheServiceTrait;

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub cache_service: Arc<dyn SemanticImageCacheServiceTrait>,
    /// Directory served under `/images`
    pub artifacts_dir: PathBuf,
}

impl AppState {
    pub fn new(
        cache_service: Arc<dyn SemanticImageCacheServiceTrait>,
        artifacts_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cache_service,
            artifacts_dir: artifacts_dir.into(),
        }
    }
}
