//! Domain layer - Core business logic and entities

pub mod artifact;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod prompt;
pub mod semantic_cache;

pub use artifact::ArtifactStore;
pub use embedding::{Embedding, Encoder, EncoderIdentity};
pub use error::DomainError;
pub use generator::{GeneratedImage, ImageGenerator};
pub use prompt::Prompt;
pub use semantic_cache::{
    CacheEntry, CacheOutcome, CacheSource, EntryMetadata, NearestEntry, SemanticCacheConfig,
    SemanticCacheStats, SimilarityIndex,
};
