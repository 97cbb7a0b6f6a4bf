//! Similarity index factory for runtime selection

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::domain::embedding::EncoderIdentity;
use crate::domain::{DomainError, SimilarityIndex};

use super::file::FileSimilarityIndex;
use super::in_memory::InMemorySimilarityIndex;
use super::pgvector::{PgvectorIndexConfig, PgvectorSimilarityIndex};

/// Supported index backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    /// JSON-lines files on local disk
    #[default]
    File,
    /// Non-durable, process lifetime only
    #[serde(alias = "in_memory")]
    Memory,
    /// PostgreSQL with pgvector
    #[serde(alias = "pgvector")]
    Postgres,
}

impl std::fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexBackend::File => write!(f, "file"),
            IndexBackend::Memory => write!(f, "memory"),
            IndexBackend::Postgres => write!(f, "postgres"),
        }
    }
}

impl std::str::FromStr for IndexBackend {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(IndexBackend::File),
            "memory" | "in_memory" | "inmemory" => Ok(IndexBackend::Memory),
            "postgres" | "pgvector" => Ok(IndexBackend::Postgres),
            _ => Err(DomainError::configuration(format!(
                "Unknown index backend: {}. Valid backends: file, memory, postgres",
                s
            ))),
        }
    }
}

/// Similarity index configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: IndexBackend,
    /// Directory for the file backend
    #[serde(default = "default_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub postgres: PgvectorIndexConfig,
}

fn default_path() -> PathBuf {
    PathBuf::from("image_db")
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            path: default_path(),
            postgres: PgvectorIndexConfig::default(),
        }
    }
}

impl IndexConfig {
    pub fn memory() -> Self {
        Self {
            backend: IndexBackend::Memory,
            ..Default::default()
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: IndexBackend::File,
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Factory for creating similarity indexes
#[derive(Debug)]
pub struct SimilarityIndexFactory;

impl SimilarityIndexFactory {
    /// Open the configured backend pinned to `identity`
    pub async fn create(
        config: &IndexConfig,
        identity: EncoderIdentity,
    ) -> Result<Arc<dyn SimilarityIndex>, DomainError> {
        match config.backend {
            IndexBackend::File => Ok(Arc::new(
                FileSimilarityIndex::open(&config.path, identity).await?,
            )),
            IndexBackend::Memory => Ok(Arc::new(InMemorySimilarityIndex::new(identity))),
            IndexBackend::Postgres => Ok(Arc::new(
                PgvectorSimilarityIndex::connect(&config.postgres, identity).await?,
            )),
        }
    }
}
