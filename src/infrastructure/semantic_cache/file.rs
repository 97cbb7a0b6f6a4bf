//! File-backed similarity index
//!
//! Layout of the index directory:
//! - `manifest.json`: format version and the pinned encoder identity
//! - `entries.jsonl`: one serialized entry per line, in insertion order
//!
//! Every insert is appended, flushed and synced before it becomes visible to
//! queries. An unterminated trailing line can only come from an interrupted
//! append that was never acknowledged, so it is dropped on open. A failed
//! append is cut back to the last acknowledged byte before the writer is
//! released, and every append first checks that the file still ends there.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::in_memory::InMemorySimilarityIndex;
use crate::domain::embedding::EncoderIdentity;
use crate::domain::semantic_cache::{CacheEntry, EntryMetadata, NearestEntry, SimilarityIndex};
use crate::domain::DomainError;

const MANIFEST_FILE: &str = "manifest.json";
const ENTRIES_FILE: &str = "entries.jsonl";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    encoder: EncoderIdentity,
    created_at: DateTime<Utc>,
}

/// Append handle plus the length of the acknowledged prefix
#[derive(Debug)]
struct EntriesWriter {
    file: File,
    committed_len: u64,
}

impl EntriesWriter {
    /// Cut anything past the acknowledged prefix
    async fn truncate_to_committed(&mut self) -> Result<(), DomainError> {
        let len = self
            .file
            .metadata()
            .await
            .map_err(|e| DomainError::index_unavailable(format!("Failed to stat entries file: {}", e)))?
            .len();

        if len != self.committed_len {
            warn!(
                expected = self.committed_len,
                actual = len,
                "Truncating unacknowledged index bytes"
            );
            self.file.set_len(self.committed_len).await.map_err(|e| {
                DomainError::index_unavailable(format!("Failed to truncate entries file: {}", e))
            })?;
        }

        Ok(())
    }

    async fn write_line(&mut self, line: &[u8]) -> Result<(), DomainError> {
        self.file
            .write_all(line)
            .await
            .map_err(|e| DomainError::index_unavailable(format!("Failed to append entry: {}", e)))?;
        self.file
            .flush()
            .await
            .map_err(|e| DomainError::index_unavailable(format!("Failed to flush entry: {}", e)))?;
        self.file
            .sync_data()
            .await
            .map_err(|e| DomainError::index_unavailable(format!("Failed to sync entry: {}", e)))
    }

    /// Append one line; on failure the file is rolled back to the acknowledged prefix
    async fn append(&mut self, line: &[u8]) -> Result<(), DomainError> {
        self.truncate_to_committed().await?;

        match self.write_line(line).await {
            Ok(()) => {
                self.committed_len += line.len() as u64;
                Ok(())
            }
            Err(e) => {
                // If this also fails the next append retries it and refuses to write until it succeeds
                if let Err(rollback) = self.file.set_len(self.committed_len).await {
                    error!(error = %rollback, "Failed to roll back partial index entry");
                }
                Err(e)
            }
        }
    }
}

/// Durable append-only index stored as JSON lines
#[derive(Debug)]
pub struct FileSimilarityIndex {
    view: InMemorySimilarityIndex,
    writer: Mutex<EntriesWriter>,
}

impl FileSimilarityIndex {
    /// Open or create an index directory pinned to `identity`
    pub async fn open(dir: impl Into<PathBuf>, identity: EncoderIdentity) -> Result<Self, DomainError> {
        let dir = dir.into();

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            DomainError::index_unavailable(format!(
                "Failed to create index directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        Self::load_or_create_manifest(&dir, &identity).await?;

        let entries_path = dir.join(ENTRIES_FILE);
        let (entries, committed_len, torn) = Self::load_entries(&entries_path, &identity).await?;

        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&entries_path)
            .await
            .map_err(|e| DomainError::index_unavailable(format!("Failed to open entries file: {}", e)))?;

        if torn {
            writer.set_len(committed_len).await.map_err(|e| {
                DomainError::index_unavailable(format!("Failed to truncate torn entry: {}", e))
            })?;
        }

        info!(
            path = %dir.display(),
            encoder = %identity,
            entries = entries.len(),
            "Opened file similarity index"
        );

        Ok(Self {
            view: InMemorySimilarityIndex::from_entries(identity, entries),
            writer: Mutex::new(EntriesWriter {
                file: writer,
                committed_len,
            }),
        })
    }

    async fn load_or_create_manifest(dir: &Path, identity: &EncoderIdentity) -> Result<(), DomainError> {
        let path = dir.join(MANIFEST_FILE);

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let manifest: Manifest = serde_json::from_slice(&bytes).map_err(|e| {
                    DomainError::index_unavailable(format!("Corrupt index manifest: {}", e))
                })?;

                if manifest.format_version != FORMAT_VERSION {
                    return Err(DomainError::index_unavailable(format!(
                        "Unsupported index format version {}",
                        manifest.format_version
                    )));
                }

                manifest.encoder.ensure_matches(identity)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let manifest = Manifest {
                    format_version: FORMAT_VERSION,
                    encoder: identity.clone(),
                    created_at: Utc::now(),
                };
                let json = serde_json::to_vec_pretty(&manifest)
                    .map_err(|e| DomainError::internal(format!("Failed to encode manifest: {}", e)))?;

                let temp_path = dir.join(format!(".{}.tmp", MANIFEST_FILE));
                tokio::fs::write(&temp_path, json)
                    .await
                    .map_err(|e| DomainError::index_unavailable(format!("Failed to write manifest: {}", e)))?;
                tokio::fs::rename(&temp_path, &path)
                    .await
                    .map_err(|e| DomainError::index_unavailable(format!("Failed to write manifest: {}", e)))
            }
            Err(e) => Err(DomainError::index_unavailable(format!(
                "Failed to read index manifest: {}",
                e
            ))),
        }
    }

    /// Parse all complete lines; returns the entries, the length of the
    /// complete prefix and whether a torn tail follows it
    async fn load_entries(
        path: &Path,
        identity: &EncoderIdentity,
    ) -> Result<(Vec<CacheEntry>, u64, bool), DomainError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 0, false)),
            Err(e) => {
                return Err(DomainError::index_unavailable(format!(
                    "Failed to read entries file: {}",
                    e
                )))
            }
        };

        let mut entries = Vec::new();
        let mut offset = 0usize;
        let mut line_number = 0usize;

        while offset < bytes.len() {
            let Some(end) = bytes[offset..].iter().position(|b| *b == b'\n') else {
                warn!(
                    path = %path.display(),
                    bytes = bytes.len() - offset,
                    "Dropping torn trailing index entry"
                );
                return Ok((entries, offset as u64, true));
            };

            line_number += 1;
            let line = &bytes[offset..offset + end];
            offset += end + 1;

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let entry: CacheEntry = serde_json::from_slice(line).map_err(|e| {
                DomainError::index_unavailable(format!(
                    "Corrupt index entry at line {}: {}",
                    line_number, e
                ))
            })?;
            identity.ensure_dimensions(entry.embedding())?;

            entries.push(entry);
        }

        Ok((entries, bytes.len() as u64, false))
    }
}

#[async_trait]
impl SimilarityIndex for FileSimilarityIndex {
    fn encoder(&self) -> &EncoderIdentity {
        self.view.encoder()
    }

    async fn query(&self, vector: &[f32]) -> Result<Option<NearestEntry>, DomainError> {
        self.view.search(vector)
    }

    async fn insert(
        &self,
        vector: Vec<f32>,
        metadata: EntryMetadata,
        id: Uuid,
    ) -> Result<(), DomainError> {
        self.view.encoder().ensure_dimensions(&vector)?;

        let entry = CacheEntry::new(id, vector, metadata);
        let mut line = serde_json::to_vec(&entry)
            .map_err(|e| DomainError::internal(format!("Failed to encode entry: {}", e)))?;
        line.push(b'\n');

        // Held until published so file order matches query order
        let mut writer = self.writer.lock().await;
        writer.append(&line).await?;

        self.view.publish(entry)
    }

    async fn len(&self) -> Result<usize, DomainError> {
        self.view.count()
    }
}
