//! Encoder implementations

mod factory;
mod hashing;
mod local;
mod openai;

pub use factory::{EncoderBackend, EncoderConfig, EncoderFactory};
pub use hashing::{HASHING_MODEL, HASHING_PROVIDER, HashingEncoder};
pub use local::{fastembed_identity, FastEmbedEncoder};
pub use openai::{OpenAiEncoder, native_dimensions};
