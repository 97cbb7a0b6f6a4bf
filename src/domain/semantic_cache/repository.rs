//! Similarity index trait

use std::fmt::Debug;

use async_trait::async_trait;
use uuid::Uuid;

use super::{CacheEntry, EntryMetadata, NearestEntry};
use crate::domain::embedding::{cosine_distance, EncoderIdentity};
use crate::domain::DomainError;

/// Persistent, append-only store of prompt embeddings
///
/// Nearest-neighbour ties resolve to the earliest inserted entry.
#[async_trait]
pub trait SimilarityIndex: Send + Sync + Debug {
    /// Encoder the index is pinned to
    fn encoder(&self) -> &EncoderIdentity;

    /// Find the single nearest entry by cosine distance, `None` when empty
    async fn query(&self, vector: &[f32]) -> Result<Option<NearestEntry>, DomainError>;

    /// Append a new entry; identical vectors are never de-duplicated
    async fn insert(
        &self,
        vector: Vec<f32>,
        metadata: EntryMetadata,
        id: Uuid,
    ) -> Result<(), DomainError>;

    /// Number of stored entries
    async fn len(&self) -> Result<usize, DomainError>;

    async fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.len().await? == 0)
    }
}

/// Linear scan for the nearest entry, keeping the first on exact ties
pub fn nearest<'a, I>(entries: I, vector: &[f32]) -> Option<NearestEntry>
where
    I: IntoIterator<Item = &'a CacheEntry>,
{
    let mut best: Option<(&CacheEntry, f32)> = None;

    for entry in entries {
        let distance = cosine_distance(vector, entry.embedding());

        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((entry, distance)),
        }
    }

    best.map(|(entry, distance)| NearestEntry::new(entry.clone(), distance))
}
