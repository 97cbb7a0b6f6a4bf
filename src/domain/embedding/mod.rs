//! Encoder domain models and traits

mod identity;
mod provider;
mod vector;

pub use identity::EncoderIdentity;
pub use provider::Encoder;
pub use vector::{cosine_distance, cosine_similarity, Embedding};

#[cfg(test)]
pub use provider::mock::MockEncoder;
