//! Semantic image caching service
//!
//! Serves a previously generated image when a new prompt is close enough to
//! one already seen, otherwise calls the generator and records the result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::semantic_cache::{
    CacheOutcome, EntryMetadata, SemanticCacheConfig, SemanticCacheStats,
};
use crate::domain::{ArtifactStore, DomainError, Encoder, ImageGenerator, Prompt, SimilarityIndex};
use crate::infrastructure::observability::{record_cache_decision, record_generation};

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    generation_failures: AtomicU64,
}

type PromptLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Share of a per-prompt lock; the map entry goes away with the last lease,
/// including when the request future is dropped mid-flight
struct PromptLease<'a> {
    locks: &'a PromptLocks,
    key: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> PromptLease<'a> {
    fn acquire(locks: &'a PromptLocks, key: String) -> Result<Self, DomainError> {
        let lock = locks
            .lock()
            .map_err(|e| DomainError::internal(format!("Lock error: {}", e)))?
            .entry(key.clone())
            .or_default()
            .clone();

        Ok(Self { locks, key, lock })
    }

    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for PromptLease<'_> {
    fn drop(&mut self) {
        if let Ok(mut locks) = self.locks.lock() {
            // The map and this lease are the last holders
            if Arc::strong_count(&self.lock) == 2 {
                locks.remove(&self.key);
            }
        }
    }
}

/// Semantic image cache service that uses embeddings for similarity matching
#[derive(Debug)]
pub struct SemanticImageCacheService {
    encoder: Arc<dyn Encoder>,
    index: Arc<dyn SimilarityIndex>,
    generator: Arc<dyn ImageGenerator>,
    artifacts: Arc<dyn ArtifactStore>,
    config: SemanticCacheConfig,
    counters: CacheCounters,
    in_flight: PromptLocks,
}

impl SemanticImageCacheService {
    /// Create a new service with the default config
    pub fn new(
        encoder: Arc<dyn Encoder>,
        index: Arc<dyn SimilarityIndex>,
        generator: Arc<dyn ImageGenerator>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Result<Self, DomainError> {
        Self::with_config(encoder, index, generator, artifacts, SemanticCacheConfig::default())
    }

    /// Create a new service with custom config
    ///
    /// Fails if the config is out of range or the index was built with a
    /// different encoder.
    pub fn with_config(
        encoder: Arc<dyn Encoder>,
        index: Arc<dyn SimilarityIndex>,
        generator: Arc<dyn ImageGenerator>,
        artifacts: Arc<dyn ArtifactStore>,
        config: SemanticCacheConfig,
    ) -> Result<Self, DomainError> {
        config.validate()?;
        index.encoder().ensure_matches(encoder.identity())?;

        Ok(Self {
            encoder,
            index,
            generator,
            artifacts,
            config,
            counters: CacheCounters::default(),
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// Return a cached artifact for a similar prompt, or generate a new one
    pub async fn generate_or_fetch(&self, prompt: &str) -> Result<CacheOutcome, DomainError> {
        let result = self.run(prompt).await;

        match result {
            Ok(ref outcome) if outcome.cached() => record_cache_decision("hit", outcome.similarity),
            Ok(ref outcome) => record_cache_decision("miss", outcome.similarity),
            Err(_) => record_cache_decision("error", None),
        }

        result
    }

    async fn run(&self, prompt: &str) -> Result<CacheOutcome, DomainError> {
        let prompt = Prompt::with_max_chars(prompt, self.config.max_prompt_chars)?;

        let embedding = self.encoder.encode(&prompt).await?;
        self.encoder.identity().ensure_dimensions(embedding.vector())?;

        if !self.config.dedupe_in_flight {
            return self.resolve(&prompt, embedding.into_vector()).await;
        }

        let lease = PromptLease::acquire(&self.in_flight, prompt.dedupe_key())?;
        let _guard = lease.lock().await;

        self.resolve(&prompt, embedding.into_vector()).await
    }

    /// Query, decide and, on a miss, generate, store and index
    async fn resolve(&self, prompt: &Prompt, vector: Vec<f32>) -> Result<CacheOutcome, DomainError> {
        let nearest = self.index.query(&vector).await?;
        let similarity = nearest.as_ref().map(|n| n.similarity());
        let threshold = self.config.similarity_threshold;

        if let Some(nearest) = nearest {
            let similarity = nearest.similarity();

            if self.config.is_hit(similarity) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                info!(
                    decision = "hit",
                    similarity,
                    threshold,
                    entry_id = %nearest.entry.id(),
                    "Semantic cache hit"
                );

                return Ok(CacheOutcome::hit(&nearest.metadata().image_path, similarity));
            }

            info!(
                decision = "miss",
                similarity,
                threshold,
                entry_id = %nearest.entry.id(),
                "Semantic cache miss"
            );
        } else {
            info!(decision = "miss", threshold, "Semantic cache miss on empty index");
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let started = Instant::now();
        let image = match self.generator.generate(prompt).await {
            Ok(image) => image,
            Err(e) => {
                self.counters.generation_failures.fetch_add(1, Ordering::Relaxed);
                record_generation(false, started.elapsed());
                warn!(
                    provider = self.generator.provider_name(),
                    latency_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "Image generation failed"
                );

                return Err(match e {
                    DomainError::GenerationFailed { .. } => e,
                    other => DomainError::generation_failed(other.to_string()),
                });
            }
        };
        record_generation(true, started.elapsed());
        debug!(
            provider = self.generator.provider_name(),
            latency_ms = started.elapsed().as_millis() as u64,
            size = image.len(),
            "Image generated"
        );

        let filename = self.artifacts.store(image.bytes(), image.extension()).await?;

        let id = Uuid::new_v4();
        self.index
            .insert(vector, EntryMetadata::new(prompt.as_str(), &filename), id)
            .await?;

        debug!(entry_id = %id, filename = %filename, "Indexed generated image");

        Ok(CacheOutcome::generated(filename, similarity))
    }

    /// Number of entries in the index
    pub async fn entry_count(&self) -> Result<usize, DomainError> {
        self.index.len().await
    }

    /// Get cache statistics
    pub async fn stats(&self) -> Result<SemanticCacheStats, DomainError> {
        Ok(SemanticCacheStats {
            total_entries: self.index.len().await?,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            generation_failures: self.counters.generation_failures.load(Ordering::Relaxed),
        })
    }
}

/// Trait for semantic image cache service operations
#[async_trait::async_trait]
pub trait SemanticImageCacheServiceTrait: Send + Sync + std::fmt::Debug {
    /// Return a cached artifact for a similar prompt, or generate a new one
    async fn generate_or_fetch(&self, prompt: &str) -> Result<CacheOutcome, DomainError>;

    /// Number of entries in the index
    async fn entry_count(&self) -> Result<usize, DomainError>;

    /// Get cache statistics
    async fn stats(&self) -> Result<SemanticCacheStats, DomainError>;
}

#[async_trait::async_trait]
impl SemanticImageCacheServiceTrait for SemanticImageCacheService {
    async fn generate_or_fetch(&self, prompt: &str) -> Result<CacheOutcome, DomainError> {
        SemanticImageCacheService::generate_or_fetch(self, prompt).await
    }

    async fn entry_count(&self) -> Result<usize, DomainError> {
        SemanticImageCacheService::entry_count(self).await
    }

    async fn stats(&self) -> Result<SemanticCacheStats, DomainError> {
        SemanticImageCacheService::stats(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::mock::InMemoryArtifactStore;
    use crate::domain::embedding::{EncoderIdentity, MockEncoder};
    use crate::domain::generator::mock::MockImageGenerator;
    use crate::domain::semantic_cache::{CacheSource, FixedDistanceIndex};
    use crate::infrastructure::semantic_cache::InMemorySimilarityIndex;
    use std::time::Duration;

    const DIMS: usize = 3;

    struct Fixture {
        encoder: Arc<MockEncoder>,
        index: Arc<InMemorySimilarityIndex>,
        generator: Arc<MockImageGenerator>,
        artifacts: Arc<InMemoryArtifactStore>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_generator(MockImageGenerator::new())
        }

        fn with_generator(generator: MockImageGenerator) -> Self {
            let encoder = MockEncoder::new(DIMS)
                .with_vector("a red fox", vec![1.0, 0.0, 0.0])
                .with_vector("a red fox in the snow", vec![0.95, 0.1, 0.0])
                .with_vector("quarterly tax filing", vec![0.0, 0.0, 1.0]);

            Self {
                index: Arc::new(InMemorySimilarityIndex::new(encoder.identity().clone())),
                encoder: Arc::new(encoder),
                generator: Arc::new(generator),
                artifacts: Arc::new(InMemoryArtifactStore::new()),
            }
        }

        fn service(&self, config: SemanticCacheConfig) -> SemanticImageCacheService {
            SemanticImageCacheService::with_config(
                self.encoder.clone(),
                self.index.clone(),
                self.generator.clone(),
                self.artifacts.clone(),
                config,
            )
            .unwrap()
        }
    }

    fn fixed_service(
        index: FixedDistanceIndex,
        threshold: f32,
    ) -> (SemanticImageCacheService, Arc<MockImageGenerator>) {
        let generator = Arc::new(MockImageGenerator::new());
        let service = SemanticImageCacheService::with_config(
            Arc::new(MockEncoder::new(DIMS)),
            Arc::new(index),
            generator.clone(),
            Arc::new(InMemoryArtifactStore::new()),
            SemanticCacheConfig::new().with_similarity_threshold(threshold),
        )
        .unwrap();

        (service, generator)
    }

    fn mock_identity() -> EncoderIdentity {
        EncoderIdentity::new("mock", "mock-encoder", DIMS)
    }

    #[tokio::test]
    async fn test_first_request_generates() {
        let fixture = Fixture::new();
        let service = fixture.service(SemanticCacheConfig::default());

        let outcome = service.generate_or_fetch("a red fox").await.unwrap();

        assert_eq!(outcome.source, CacheSource::Api);
        assert!(!outcome.cached());
        assert_eq!(outcome.similarity, None);
        assert!(fixture.artifacts.get(&outcome.artifact_reference).is_some());
        assert_eq!(fixture.index.len().await.unwrap(), 1);
        assert_eq!(fixture.generator.calls(), 1);

        let entries = fixture.index.entries().unwrap();
        assert_eq!(entries[0].metadata().prompt, "a red fox");
        assert_eq!(entries[0].metadata().image_path, outcome.artifact_reference);
    }

    #[tokio::test]
    async fn test_repeat_prompt_is_idempotent_hit() {
        let fixture = Fixture::new();
        let service = fixture.service(SemanticCacheConfig::default());

        let first = service.generate_or_fetch("a red fox").await.unwrap();
        let second = service.generate_or_fetch("a red fox").await.unwrap();
        let third = service.generate_or_fetch("a red fox").await.unwrap();

        assert!(second.cached());
        assert_eq!(second.artifact_reference, first.artifact_reference);
        assert_eq!(third, second);
        assert!((second.similarity.unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(fixture.generator.calls(), 1);
        assert_eq!(fixture.index.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_similar_prompt_hits() {
        let fixture = Fixture::new();
        let service = fixture.service(SemanticCacheConfig::default());

        let first = service.generate_or_fetch("a red fox").await.unwrap();
        let similar = service.generate_or_fetch("a red fox in the snow").await.unwrap();

        assert!(similar.cached());
        assert_eq!(similar.artifact_reference, first.artifact_reference);
        assert!(similar.similarity.unwrap() > 0.80);
        assert_eq!(fixture.generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_unrelated_prompt_generates_with_similarity() {
        let fixture = Fixture::new();
        let service = fixture.service(SemanticCacheConfig::default());

        let first = service.generate_or_fetch("a red fox").await.unwrap();
        let unrelated = service.generate_or_fetch("quarterly tax filing").await.unwrap();

        assert_eq!(unrelated.source, CacheSource::Api);
        assert_ne!(unrelated.artifact_reference, first.artifact_reference);
        assert!(unrelated.similarity.unwrap().abs() < 1e-6);
        assert_eq!(fixture.index.len().await.unwrap(), 2);
        assert_eq!(fixture.generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_similarity_equal_to_threshold_is_miss() {
        let (service, generator) =
            fixed_service(FixedDistanceIndex::new(mock_identity()).with_distance(0.25), 0.75);

        let outcome = service.generate_or_fetch("anything").await.unwrap();

        assert_eq!(outcome.source, CacheSource::Api);
        assert_eq!(outcome.similarity, Some(0.75));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_similarity_above_threshold_is_hit() {
        let (service, generator) =
            fixed_service(FixedDistanceIndex::new(mock_identity()).with_distance(0.2499), 0.75);

        let outcome = service.generate_or_fetch("anything").await.unwrap();

        assert!(outcome.cached());
        assert_eq!(outcome.artifact_reference, "stored.webp");
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected_before_encoding() {
        let fixture = Fixture::new();
        let service = fixture.service(SemanticCacheConfig::default());

        let result = service.generate_or_fetch("").await;

        assert!(matches!(result, Err(DomainError::InvalidRequest { .. })));
        assert_eq!(fixture.encoder.calls(), 0);
        assert_eq!(fixture.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_overlong_prompt_rejected() {
        let fixture = Fixture::new();
        let service = fixture.service(SemanticCacheConfig::new().with_max_prompt_chars(5));

        let result = service.generate_or_fetch("a red fox").await;

        assert!(matches!(result, Err(DomainError::InvalidRequest { .. })));
        assert_eq!(fixture.encoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_writes_nothing() {
        let fixture = Fixture::with_generator(MockImageGenerator::new().with_error("HTTP 500"));
        let service = fixture.service(SemanticCacheConfig::default());

        let result = service.generate_or_fetch("a red fox").await;

        assert!(matches!(result, Err(DomainError::GenerationFailed { .. })));
        assert_eq!(fixture.index.len().await.unwrap(), 0);
        assert_eq!(fixture.artifacts.count(), 0);

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.generation_failures, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_encoder_failure_propagates() {
        let index = Arc::new(InMemorySimilarityIndex::new(mock_identity()));
        let generator = Arc::new(MockImageGenerator::new());
        let service = SemanticImageCacheService::new(
            Arc::new(MockEncoder::new(DIMS).with_error("connection refused")),
            index,
            generator.clone(),
            Arc::new(InMemoryArtifactStore::new()),
        )
        .unwrap();

        let result = service.generate_or_fetch("a red fox").await;

        assert!(matches!(result, Err(DomainError::Provider { .. })));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_index_query_failure_is_fatal() {
        let (service, generator) =
            fixed_service(FixedDistanceIndex::new(mock_identity()).failing_query(), 0.80);

        let result = service.generate_or_fetch("a red fox").await;

        assert!(matches!(result, Err(DomainError::IndexUnavailable { .. })));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_index_insert_failure_is_surfaced() {
        let (service, generator) =
            fixed_service(FixedDistanceIndex::new(mock_identity()).failing_insert(), 0.80);

        let result = service.generate_or_fetch("a red fox").await;

        assert!(matches!(result, Err(DomainError::IndexUnavailable { .. })));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_skips_index() {
        let index = Arc::new(FixedDistanceIndex::new(mock_identity()));
        let service = SemanticImageCacheService::new(
            Arc::new(MockEncoder::new(DIMS)),
            index.clone(),
            Arc::new(MockImageGenerator::new()),
            Arc::new(InMemoryArtifactStore::failing()),
        )
        .unwrap();

        let result = service.generate_or_fetch("a red fox").await;

        assert!(matches!(result, Err(DomainError::Storage { .. })));
        assert!(index.inserted().is_empty());
    }

    #[derive(Debug)]
    struct OrderCheckingStore {
        inner: InMemoryArtifactStore,
        index: Arc<InMemorySimilarityIndex>,
        entries_at_store: Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl ArtifactStore for OrderCheckingStore {
        async fn store(&self, bytes: &[u8], extension: &str) -> Result<String, DomainError> {
            let len = self.index.len().await?;
            self.entries_at_store.lock().unwrap().push(len);
            self.inner.store(bytes, extension).await
        }

        async fn exists(&self, filename: &str) -> Result<bool, DomainError> {
            self.inner.exists(filename).await
        }
    }

    #[tokio::test]
    async fn test_artifact_written_before_index_entry() {
        let index = Arc::new(InMemorySimilarityIndex::new(mock_identity()));
        let store = Arc::new(OrderCheckingStore {
            inner: InMemoryArtifactStore::new(),
            index: index.clone(),
            entries_at_store: Mutex::new(Vec::new()),
        });
        let service = SemanticImageCacheService::new(
            Arc::new(MockEncoder::new(DIMS)),
            index.clone(),
            Arc::new(MockImageGenerator::new()),
            store.clone(),
        )
        .unwrap();

        let outcome = service.generate_or_fetch("a red fox").await.unwrap();

        assert_eq!(*store.entries_at_store.lock().unwrap(), vec![0]);
        assert!(store.exists(&outcome.artifact_reference).await.unwrap());
        assert_eq!(index.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_encoder_mismatch_rejected_at_construction() {
        let index = Arc::new(InMemorySimilarityIndex::new(EncoderIdentity::new(
            "hashing",
            "feature-hash-v1",
            DIMS,
        )));

        let result = SemanticImageCacheService::new(
            Arc::new(MockEncoder::new(DIMS)),
            index,
            Arc::new(MockImageGenerator::new()),
            Arc::new(InMemoryArtifactStore::new()),
        );

        assert!(matches!(result, Err(DomainError::EncoderMismatch { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_misses_without_dedupe_both_generate() {
        let fixture = Fixture::with_generator(
            MockImageGenerator::new().with_delay(Duration::from_millis(50)),
        );
        let service = fixture.service(SemanticCacheConfig::default());

        let (a, b) = tokio::join!(
            service.generate_or_fetch("a red fox"),
            service.generate_or_fetch("a red fox")
        );

        assert_eq!(a.unwrap().source, CacheSource::Api);
        assert_eq!(b.unwrap().source, CacheSource::Api);
        assert_eq!(fixture.generator.calls(), 2);
        assert_eq!(fixture.index.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_with_dedupe_generate_once() {
        let fixture = Fixture::with_generator(
            MockImageGenerator::new().with_delay(Duration::from_millis(50)),
        );
        let service = fixture.service(SemanticCacheConfig::new().with_dedupe_in_flight(true));

        let (a, b) = tokio::join!(
            service.generate_or_fetch("a red fox"),
            service.generate_or_fetch("a red fox")
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(fixture.generator.calls(), 1);
        assert_eq!(fixture.index.len().await.unwrap(), 1);
        assert_eq!(a.artifact_reference, b.artifact_reference);
        assert!(a.cached() != b.cached());
        assert!(service.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_request_releases_prompt_lock() {
        let fixture = Fixture::with_generator(
            MockImageGenerator::new().with_delay(Duration::from_millis(200)),
        );
        let service = fixture.service(SemanticCacheConfig::new().with_dedupe_in_flight(true));

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            service.generate_or_fetch("a red fox"),
        )
        .await;

        assert!(result.is_err());
        assert!(service.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_threshold_rejected() {
        let fixture = Fixture::new();

        for threshold in [1.5, -0.1, f32::NAN] {
            let config = SemanticCacheConfig {
                similarity_threshold: threshold,
                ..SemanticCacheConfig::default()
            };
            let result = SemanticImageCacheService::with_config(
                fixture.encoder.clone(),
                fixture.index.clone(),
                fixture.generator.clone(),
                fixture.artifacts.clone(),
                config,
            );

            assert!(matches!(result, Err(DomainError::Configuration { .. })));
        }
    }

    #[tokio::test]
    async fn test_stats() {
        let fixture = Fixture::new();
        let service = fixture.service(SemanticCacheConfig::default());

        service.generate_or_fetch("a red fox").await.unwrap();
        service.generate_or_fetch("a red fox").await.unwrap();
        service.generate_or_fetch("quarterly tax filing").await.unwrap();

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.generation_failures, 0);
        assert_eq!(service.entry_count().await.unwrap(), 2);
    }
}
