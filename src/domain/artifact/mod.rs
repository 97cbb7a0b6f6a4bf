//! Artifact storage trait
//!
//! Artifacts are written under freshly generated unique names, so distinct
//! writes never conflict.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Trait for storing generated artifacts
#[async_trait]
pub trait ArtifactStore: Send + Sync + Debug {
    /// Store bytes under a new unique filename and return that filename
    ///
    /// The artifact must be fully visible under the returned name once this
    /// resolves.
    async fn store(&self, bytes: &[u8], extension: &str) -> Result<String, DomainError>;

    /// Check whether an artifact exists
    async fn exists(&self, filename: &str) -> Result<bool, DomainError>;
}
