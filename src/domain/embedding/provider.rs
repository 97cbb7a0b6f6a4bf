//! Encoder trait definition

use async_trait::async_trait;
use std::fmt::Debug;

use super::{Embedding, EncoderIdentity};
use crate::domain::{DomainError, Prompt};

/// Maps a prompt to a fixed-length embedding
///
/// Implementations must be deterministic for a fixed model version: the same
/// prompt yields the same vector within a process.
#[async_trait]
pub trait Encoder: Send + Sync + Debug {
    /// Encode a validated prompt
    async fn encode(&self, prompt: &Prompt) -> Result<Embedding, DomainError>;

    /// Identity of the vector space this encoder produces
    fn identity(&self) -> &EncoderIdentity;
}
