//! Local sentence-embedding encoder
//!
//! Runs all-MiniLM-L6-v2 through fastembed (ONNX Runtime) on the CPU. The
//! model is downloaded into the cache directory on first start.

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use crate::domain::embedding::{Embedding, Encoder, EncoderIdentity};
use crate::domain::{DomainError, Prompt};

pub const FASTEMBED_PROVIDER: &str = "fastembed";
pub const FASTEMBED_MODEL: &str = "all-MiniLM-L6-v2";
pub const FASTEMBED_DIMENSIONS: usize = 384;

/// Identity of the vectors produced by [`FastEmbedEncoder`]
pub fn fastembed_identity() -> EncoderIdentity {
    EncoderIdentity::new(FASTEMBED_PROVIDER, FASTEMBED_MODEL, FASTEMBED_DIMENSIONS)
}

/// Sentence-transformer encoder running in-process
pub struct FastEmbedEncoder {
    // `TextEmbedding::embed` needs exclusive access
    model: Arc<Mutex<TextEmbedding>>,
    identity: EncoderIdentity,
}

impl Debug for FastEmbedEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedEncoder")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl FastEmbedEncoder {
    /// Load the model, downloading it into `cache_dir` if it is not there yet
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self, DomainError> {
        let mut options =
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);

        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let model = TextEmbedding::try_new(options).map_err(|e| {
            DomainError::configuration(format!("Failed to load {}: {}", FASTEMBED_MODEL, e))
        })?;

        info!(model = FASTEMBED_MODEL, "Loaded local embedding model");

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            identity: fastembed_identity(),
        })
    }
}

#[async_trait]
impl Encoder for FastEmbedEncoder {
    async fn encode(&self, prompt: &Prompt) -> Result<Embedding, DomainError> {
        let model = self.model.clone();
        let text = prompt.as_str().to_string();

        let vectors = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| DomainError::internal(format!("Lock error: {}", e)))?;

            model.embed(vec![text], None).map_err(|e| {
                DomainError::provider(FASTEMBED_PROVIDER, format!("Embedding failed: {}", e))
            })
        })
        .await
        .map_err(|e| DomainError::internal(format!("Embedding task failed: {}", e)))??;

        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::provider(FASTEMBED_PROVIDER, "No embedding returned"))?;

        self.identity.ensure_dimensions(&vector)?;

        Ok(Embedding::new(vector).normalized())
    }

    fn identity(&self) -> &EncoderIdentity {
        &self.identity
    }
}
