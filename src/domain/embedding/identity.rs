//! Encoder identity pinned alongside every index

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Identifies the encoder (and therefore the vector space) an index was built with
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncoderIdentity {
    provider: String,
    model: String,
    dimensions: usize,
}

impl EncoderIdentity {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            dimensions,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Fail unless `other` describes the same vector space
    pub fn ensure_matches(&self, other: &EncoderIdentity) -> Result<(), DomainError> {
        if self != other {
            return Err(DomainError::encoder_mismatch(self.to_string(), other.to_string()));
        }

        Ok(())
    }

    /// Fail unless a vector has this identity's dimensionality
    pub fn ensure_dimensions(&self, vector: &[f32]) -> Result<(), DomainError> {
        if vector.len() != self.dimensions {
            return Err(DomainError::encoder_mismatch(
                format!("{} dimensions", self.dimensions),
                format!("{} dimensions", vector.len()),
            ));
        }

        Ok(())
    }
}

impl fmt::Display for EncoderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.provider, self.model, self.dimensions)
    }
}
