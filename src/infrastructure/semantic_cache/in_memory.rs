//! In-memory similarity index

use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::embedding::EncoderIdentity;
use crate::domain::semantic_cache::{
    nearest, CacheEntry, EntryMetadata, NearestEntry, SimilarityIndex,
};
use crate::domain::DomainError;

/// In-memory similarity index using linear search
///
/// Entries are kept in insertion order. Suitable for development and tests,
/// and used as the query view of the file-backed index.
#[derive(Debug)]
pub struct InMemorySimilarityIndex {
    identity: EncoderIdentity,
    entries: RwLock<Vec<CacheEntry>>,
}

impl InMemorySimilarityIndex {
    /// Create an empty index pinned to an encoder
    pub fn new(identity: EncoderIdentity) -> Self {
        Self::from_entries(identity, Vec::new())
    }

    /// Create an index from entries already in insertion order
    pub fn from_entries(identity: EncoderIdentity, entries: Vec<CacheEntry>) -> Self {
        Self {
            identity,
            entries: RwLock::new(entries),
        }
    }

    /// Make an entry visible to queries
    pub fn publish(&self, entry: CacheEntry) -> Result<(), DomainError> {
        self.identity.ensure_dimensions(entry.embedding())?;

        let mut entries = self
            .entries
            .write()
            .map_err(|e| DomainError::internal(format!("Lock error: {}", e)))?;
        entries.push(entry);

        Ok(())
    }

    /// Snapshot of all entries in insertion order
    pub fn entries(&self) -> Result<Vec<CacheEntry>, DomainError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| DomainError::internal(format!("Lock error: {}", e)))?;

        Ok(entries.clone())
    }

    pub(crate) fn search(&self, vector: &[f32]) -> Result<Option<NearestEntry>, DomainError> {
        self.identity.ensure_dimensions(vector)?;

        let entries = self
            .entries
            .read()
            .map_err(|e| DomainError::internal(format!("Lock error: {}", e)))?;

        Ok(nearest(entries.iter(), vector))
    }

    pub(crate) fn count(&self) -> Result<usize, DomainError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| DomainError::internal(format!("Lock error: {}", e)))?;

        Ok(entries.len())
    }
}

#[async_trait]
impl SimilarityIndex for InMemorySimilarityIndex {
    fn encoder(&self) -> &EncoderIdentity {
        &self.identity
    }

    async fn query(&self, vector: &[f32]) -> Result<Option<NearestEntry>, DomainError> {
        self.search(vector)
    }

    async fn insert(
        &self,
        vector: Vec<f32>,
        metadata: EntryMetadata,
        id: Uuid,
    ) -> Result<(), DomainError> {
        self.publish(CacheEntry::new(id, vector, metadata))
    }

    async fn len(&self) -> Result<usize, DomainError> {
        self.count()
    }
}
