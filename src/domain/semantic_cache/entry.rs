//! Cache entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata stored with every cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// The original prompt text
    pub prompt: String,
    /// Filename of the generated artifact, relative to the artifact directory
    pub image_path: String,
}

impl EntryMetadata {
    pub fn new(prompt: impl Into<String>, image_path: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image_path: image_path.into(),
        }
    }
}

/// A persisted entry in the similarity index; created once, never mutated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    id: Uuid,
    embedding: Vec<f32>,
    metadata: EntryMetadata,
    created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create a new cache entry stamped with the current time
    pub fn new(id: Uuid, embedding: Vec<f32>, metadata: EntryMetadata) -> Self {
        Self::with_created_at(id, embedding, metadata, Utc::now())
    }

    pub fn with_created_at(
        id: Uuid,
        embedding: Vec<f32>,
        metadata: EntryMetadata,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            embedding,
            metadata,
            created_at,
        }
    }

    /// Get the entry ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the embedding vector
    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    /// Get creation timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Nearest stored entry for a query vector
#[derive(Debug, Clone)]
pub struct NearestEntry {
    /// The matching entry
    pub entry: CacheEntry,
    /// Cosine distance between the query and the entry (0 = identical)
    pub distance: f32,
}

impl NearestEntry {
    pub fn new(entry: CacheEntry, distance: f32) -> Self {
        Self { entry, distance }
    }

    /// Similarity as used by the threshold policy: `1 - distance`
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }

    pub fn metadata(&self) -> &EntryMetadata {
        self.entry.metadata()
    }
}
