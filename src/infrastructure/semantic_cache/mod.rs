//! Similarity index implementations

mod factory;
mod file;
mod in_memory;
mod pgvector;

pub use factory::{IndexBackend, IndexConfig, SimilarityIndexFactory};
pub use file::FileSimilarityIndex;
pub use in_memory::InMemorySimilarityIndex;
pub use pgvector::{PgvectorIndexConfig, PgvectorSimilarityIndex};
