//! Image generator domain trait
//!
//! The generator is an opaque, expensive call: prompt in, image bytes out,
//! or a single failure. It is never retried by the cache.

use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::{DomainError, Prompt};

/// Binary asset returned by a generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    bytes: Bytes,
    extension: String,
}

impl GeneratedImage {
    pub fn new(bytes: impl Into<Bytes>, extension: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            extension: extension.into(),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// File extension matching the output format (e.g. `webp`)
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Trait for image generation backends
#[async_trait]
pub trait ImageGenerator: Send + Sync + Debug {
    /// Generate an image for the prompt; failures map to `GenerationFailed`
    async fn generate(&self, prompt: &Prompt) -> Result<GeneratedImage, DomainError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}
