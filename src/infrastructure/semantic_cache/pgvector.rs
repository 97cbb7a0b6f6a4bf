//! pgvector similarity index

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::domain::embedding::EncoderIdentity;
use crate::domain::semantic_cache::{CacheEntry, EntryMetadata, NearestEntry, SimilarityIndex};
use crate::domain::DomainError;

/// Configuration for the pgvector index
#[derive(Debug, Clone, Deserialize)]
pub struct PgvectorIndexConfig {
    /// Database connection URL
    #[serde(default = "default_url")]
    pub url: String,
    /// Table holding the entries; the encoder identity lives in `<table>_meta`
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_url() -> String {
    "postgres://localhost/semantic_image_cache".to_string()
}

fn default_table_name() -> String {
    "image_embeddings".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for PgvectorIndexConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            table_name: default_table_name(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl PgvectorIndexConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Table names are interpolated into SQL, so only identifiers are allowed
    fn validate(&self) -> Result<(), DomainError> {
        let valid = !self.table_name.is_empty()
            && self
                .table_name
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && self
                .table_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');

        if !valid {
            return Err(DomainError::configuration(format!(
                "Invalid pgvector table name: {}",
                self.table_name
            )));
        }

        Ok(())
    }
}

/// Similarity index stored in PostgreSQL with the pgvector extension
pub struct PgvectorSimilarityIndex {
    pool: PgPool,
    table_name: String,
    identity: EncoderIdentity,
}

impl Debug for PgvectorSimilarityIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgvectorSimilarityIndex")
            .field("table_name", &self.table_name)
            .field("identity", &self.identity)
            .finish()
    }
}

impl PgvectorSimilarityIndex {
    /// Connect, create the schema if needed and verify the pinned encoder
    pub async fn connect(
        config: &PgvectorIndexConfig,
        identity: EncoderIdentity,
    ) -> Result<Self, DomainError> {
        config.validate()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| {
                DomainError::index_unavailable(format!("Failed to connect to PostgreSQL: {}", e))
            })?;

        let index = Self {
            pool,
            table_name: config.table_name.clone(),
            identity,
        };

        index.ensure_table().await?;
        index.ensure_identity().await?;

        info!(
            table = %index.table_name,
            encoder = %index.identity,
            "Connected pgvector similarity index"
        );

        Ok(index)
    }

    fn meta_table(&self) -> String {
        format!("{}_meta", self.table_name)
    }

    async fn ensure_table(&self) -> Result<(), DomainError> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::index_unavailable(format!("Failed to create vector extension: {}", e))
            })?;

        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                seq BIGSERIAL PRIMARY KEY,
                id UUID NOT NULL UNIQUE,
                prompt TEXT NOT NULL,
                image_path TEXT NOT NULL,
                embedding vector({}) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table_name,
            self.identity.dimensions()
        );

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::index_unavailable(format!("Failed to create table: {}", e)))?;

        let meta_query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                singleton BOOLEAN PRIMARY KEY DEFAULT TRUE CHECK (singleton),
                provider TEXT NOT NULL,
                model TEXT NOT NULL,
                dimensions INTEGER NOT NULL
            )
            "#,
            self.meta_table()
        );

        sqlx::query(&meta_query)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::index_unavailable(format!("Failed to create meta table: {}", e))
            })?;

        Ok(())
    }

    async fn ensure_identity(&self) -> Result<(), DomainError> {
        let insert = format!(
            "INSERT INTO {} (provider, model, dimensions) VALUES ($1, $2, $3) ON CONFLICT (singleton) DO NOTHING",
            self.meta_table()
        );

        sqlx::query(&insert)
            .bind(self.identity.provider())
            .bind(self.identity.model())
            .bind(self.identity.dimensions() as i32)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::index_unavailable(format!("Failed to pin encoder: {}", e)))?;

        let select = format!("SELECT provider, model, dimensions FROM {}", self.meta_table());
        let row = sqlx::query(&select)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::index_unavailable(format!("Failed to read encoder: {}", e)))?;

        let provider: String = row.try_get("provider").map_err(row_error)?;
        let model: String = row.try_get("model").map_err(row_error)?;
        let dimensions: i32 = row.try_get("dimensions").map_err(row_error)?;

        EncoderIdentity::new(provider, model, dimensions as usize).ensure_matches(&self.identity)
    }
}

fn row_error(e: sqlx::Error) -> DomainError {
    DomainError::index_unavailable(format!("Failed to decode row: {}", e))
}

/// Format a vector as a pgvector literal
pub(crate) fn embedding_to_pgvector(embedding: &[f32]) -> String {
    let values: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}

/// Parse a pgvector text literal like `[0.1,0.2]`
pub(crate) fn parse_pgvector(text: &str) -> Result<Vec<f32>, DomainError> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| DomainError::index_unavailable(format!("Invalid vector literal: {}", text)))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|v| {
            v.trim().parse::<f32>().map_err(|e| {
                DomainError::index_unavailable(format!("Invalid vector component {:?}: {}", v, e))
            })
        })
        .collect()
}

#[async_trait]
impl SimilarityIndex for PgvectorSimilarityIndex {
    fn encoder(&self) -> &EncoderIdentity {
        &self.identity
    }

    async fn query(&self, vector: &[f32]) -> Result<Option<NearestEntry>, DomainError> {
        self.identity.ensure_dimensions(vector)?;

        let query = format!(
            r#"
            SELECT id, prompt, image_path, embedding::text AS embedding, created_at,
                   (embedding <=> $1::vector)::float8 AS distance
            FROM {}
            ORDER BY embedding <=> $1::vector, seq
            LIMIT 1
            "#,
            self.table_name
        );

        let row = sqlx::query(&query)
            .bind(embedding_to_pgvector(vector))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::index_unavailable(format!("Similarity query failed: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: Uuid = row.try_get("id").map_err(row_error)?;
        let prompt: String = row.try_get("prompt").map_err(row_error)?;
        let image_path: String = row.try_get("image_path").map_err(row_error)?;
        let embedding: String = row.try_get("embedding").map_err(row_error)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(row_error)?;
        let distance: f64 = row.try_get("distance").map_err(row_error)?;

        let entry = CacheEntry::with_created_at(
            id,
            parse_pgvector(&embedding)?,
            EntryMetadata::new(prompt, image_path),
            created_at,
        );

        Ok(Some(NearestEntry::new(entry, distance as f32)))
    }

    async fn insert(
        &self,
        vector: Vec<f32>,
        metadata: EntryMetadata,
        id: Uuid,
    ) -> Result<(), DomainError> {
        self.identity.ensure_dimensions(&vector)?;

        let query = format!(
            "INSERT INTO {} (id, prompt, image_path, embedding) VALUES ($1, $2, $3, $4::vector)",
            self.table_name
        );

        sqlx::query(&query)
            .bind(id)
            .bind(&metadata.prompt)
            .bind(&metadata.image_path)
            .bind(embedding_to_pgvector(&vector))
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::index_unavailable(format!("Failed to insert entry: {}", e)))?;

        Ok(())
    }

    async fn len(&self) -> Result<usize, DomainError> {
        let query = format!("SELECT COUNT(*) AS count FROM {}", self.table_name);

        let row = sqlx::query(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::index_unavailable(format!("Failed to count entries: {}", e)))?;

        let count: i64 = row.try_get("count").map_err(row_error)?;

        Ok(count as usize)
    }
}
