//! Encoder factory for runtime selection

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{DomainError, Encoder};
use crate::infrastructure::http::HttpClient;

use super::hashing::HashingEncoder;
use super::local::{FastEmbedEncoder, FASTEMBED_DIMENSIONS};
use super::openai::OpenAiEncoder;

const DEFAULT_DIMENSIONS: usize = 384;
const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

/// Supported encoder backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderBackend {
    /// Local all-MiniLM-L6-v2 sentence embeddings
    #[default]
    Fastembed,
    /// Lexical feature hashing, for tests and offline use
    Hashing,
    /// OpenAI embeddings API
    #[serde(alias = "open_ai")]
    Openai,
}

impl std::fmt::Display for EncoderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncoderBackend::Fastembed => write!(f, "fastembed"),
            EncoderBackend::Hashing => write!(f, "hashing"),
            EncoderBackend::Openai => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for EncoderBackend {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fastembed" | "local" => Ok(EncoderBackend::Fastembed),
            "hashing" | "hash" => Ok(EncoderBackend::Hashing),
            "openai" | "open_ai" => Ok(EncoderBackend::Openai),
            _ => Err(DomainError::configuration(format!(
                "Unknown encoder backend: {}. Valid backends: fastembed, hashing, openai",
                s
            ))),
        }
    }
}

/// Encoder configuration
#[derive(Clone, Deserialize)]
pub struct EncoderConfig {
    #[serde(default)]
    pub backend: EncoderBackend,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Remote model name (openai backend)
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Model download directory (fastembed backend)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl std::fmt::Debug for EncoderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderConfig")
            .field("backend", &self.backend)
            .field("dimensions", &self.dimensions)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

fn default_dimensions() -> usize {
    DEFAULT_DIMENSIONS
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            backend: EncoderBackend::default(),
            dimensions: default_dimensions(),
            model: None,
            api_key: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
            cache_dir: None,
        }
    }
}

impl EncoderConfig {
    pub fn hashing(dimensions: usize) -> Self {
        Self {
            backend: EncoderBackend::Hashing,
            dimensions,
            ..Default::default()
        }
    }

    pub fn openai(api_key: impl Into<String>, dimensions: usize) -> Self {
        Self {
            backend: EncoderBackend::Openai,
            dimensions,
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }
}

/// Factory for creating encoders
#[derive(Debug)]
pub struct EncoderFactory;

impl EncoderFactory {
    pub fn create(config: &EncoderConfig) -> Result<Arc<dyn Encoder>, DomainError> {
        if config.dimensions == 0 {
            return Err(DomainError::configuration(
                "encoder.dimensions must be greater than zero",
            ));
        }

        match config.backend {
            EncoderBackend::Fastembed => {
                if config.dimensions != FASTEMBED_DIMENSIONS {
                    return Err(DomainError::configuration(format!(
                        "fastembed encoder produces {} dimensions, encoder.dimensions is {}",
                        FASTEMBED_DIMENSIONS, config.dimensions
                    )));
                }

                Ok(Arc::new(FastEmbedEncoder::new(config.cache_dir.clone())?))
            }
            EncoderBackend::Hashing => Ok(Arc::new(HashingEncoder::new(config.dimensions)?)),
            EncoderBackend::Openai => {
                let api_key = config
                    .api_key
                    .as_deref()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| {
                        DomainError::configuration(
                            "OpenAI encoder requires encoder.api_key or OPENAI_API_KEY",
                        )
                    })?;

                let client = HttpClient::with_timeout(Duration::from_secs(config.timeout_secs))?;
                let model = config.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL);

                let encoder = match config.base_url {
                    Some(ref base_url) => OpenAiEncoder::with_base_url(
                        client,
                        api_key,
                        model,
                        config.dimensions,
                        base_url,
                    ),
                    None => OpenAiEncoder::new(client, api_key, model, config.dimensions),
                };

                Ok(Arc::new(encoder))
            }
        }
    }
}
