//! Semantic cache domain models and traits
//!
//! Matches prompts by embedding similarity rather than exact text, so a
//! near-duplicate prompt can reuse an image generated earlier.

mod config;
mod entry;
mod outcome;
mod repository;

pub use config::SemanticCacheConfig;
pub use entry::{CacheEntry, EntryMetadata, NearestEntry};
pub use outcome::{CacheOutcome, CacheSource, SemanticCacheStats};
pub use repository::{nearest, SimilarityIndex};

#[cfg(test)]
pub use repository::mock::FixedDistanceIndex;
