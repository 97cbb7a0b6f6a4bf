//! Lexical feature-hashing encoder
//!
//! Projects lower-cased word unigrams and bigrams into a fixed number of
//! signed buckets. SHA-256 picks bucket and sign, so vectors are identical
//! across processes and builds.
//!
//! It measures word overlap only, not meaning: paraphrases with different
//! words score low. Use it for tests and offline runs where the fastembed
//! model cannot be downloaded.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::domain::embedding::{Embedding, Encoder, EncoderIdentity};
use crate::domain::{DomainError, Prompt};

pub const HASHING_PROVIDER: &str = "hashing";
pub const HASHING_MODEL: &str = "feature-hash-v1";

const UNIGRAM_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic encoder for tests and offline use
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    identity: EncoderIdentity,
}

impl HashingEncoder {
    pub fn new(dimensions: usize) -> Result<Self, DomainError> {
        if dimensions == 0 {
            return Err(DomainError::configuration(
                "Encoder dimensions must be greater than zero",
            ));
        }

        Ok(Self {
            identity: EncoderIdentity::new(HASHING_PROVIDER, HASHING_MODEL, dimensions),
        })
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect()
    }

    /// Bucket index and sign for a feature
    fn bucket(&self, feature: &str) -> (usize, f32) {
        let digest = Sha256::digest(feature.as_bytes());

        let mut index_bytes = [0u8; 8];
        index_bytes.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(index_bytes) % self.identity.dimensions() as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        (index, sign)
    }

    fn add(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let (index, sign) = self.bucket(feature);
        vector[index] += sign * weight;
    }

    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.identity.dimensions()];
        let tokens = Self::tokens(text);

        if tokens.is_empty() {
            // Punctuation-only prompts still get a non-zero direction
            self.add(&mut vector, text, UNIGRAM_WEIGHT);
            return Embedding::new(vector).normalized();
        }

        for token in &tokens {
            self.add(&mut vector, token, UNIGRAM_WEIGHT);
        }

        for pair in tokens.windows(2) {
            self.add(&mut vector, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }

        Embedding::new(vector).normalized()
    }
}

#[async_trait]
impl Encoder for HashingEncoder {
    async fn encode(&self, prompt: &Prompt) -> Result<Embedding, DomainError> {
        Ok(self.embed_text(prompt.as_str()))
    }

    fn identity(&self) -> &EncoderIdentity {
        &self.identity
    }
}
