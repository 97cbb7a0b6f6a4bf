//! Filesystem artifact store

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{ArtifactStore, DomainError};

/// Stores artifacts as flat files in a single directory
#[derive(Debug, Clone)]
pub struct FilesystemArtifactStore {
    root: PathBuf,
}

impl FilesystemArtifactStore {
    /// Open the store, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let root = root.into();

        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            DomainError::storage(format!(
                "Failed to create artifact directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_plain_filename(filename: &str) -> bool {
        !filename.is_empty()
            && !filename.starts_with('.')
            && !filename.contains(['/', '\\'])
            && filename != ".."
    }

    async fn write_temp(&self, temp_path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(temp_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await
    }
}

#[async_trait]
impl ArtifactStore for FilesystemArtifactStore {
    async fn store(&self, bytes: &[u8], extension: &str) -> Result<String, DomainError> {
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::storage(format!(
                "Invalid artifact extension: {:?}",
                extension
            )));
        }

        let stem = Uuid::new_v4().simple().to_string();
        let filename = format!("{}.{}", stem, extension);
        let temp_path = self.root.join(format!(".{}.tmp", stem));
        let final_path = self.root.join(&filename);

        if let Err(e) = self.write_temp(&temp_path, bytes).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(DomainError::storage(format!(
                "Failed to write artifact {}: {}",
                filename, e
            )));
        }

        tokio::fs::rename(&temp_path, &final_path)
            .await
            .map_err(|e| {
                DomainError::storage(format!("Failed to publish artifact {}: {}", filename, e))
            })?;

        debug!(filename = %filename, size = bytes.len(), "Stored artifact");

        Ok(filename)
    }

    async fn exists(&self, filename: &str) -> Result<bool, DomainError> {
        if !Self::is_plain_filename(filename) {
            return Ok(false);
        }

        tokio::fs::try_exists(self.root.join(filename))
            .await
            .map_err(|e| DomainError::storage(format!("Failed to stat artifact: {}", e)))
    }
}
