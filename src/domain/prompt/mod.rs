//! Prompt value object
//!
//! The unit of semantic comparison. Prompts are validated once at the
//! boundary and never normalized afterwards.

use std::fmt;

use serde::Serialize;

use crate::domain::DomainError;

/// Upper bound accepted by the image generator
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 10_000;

/// A validated, immutable prompt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Prompt(String);

impl Prompt {
    /// Validate a prompt with the default length bound
    pub fn new(text: impl Into<String>) -> Result<Self, DomainError> {
        Self::with_max_chars(text, DEFAULT_MAX_PROMPT_CHARS)
    }

    /// Validate a prompt against a custom length bound
    pub fn with_max_chars(text: impl Into<String>, max_chars: usize) -> Result<Self, DomainError> {
        let text = text.into();

        if text.is_empty() {
            return Err(DomainError::invalid_request("Prompt is required"));
        }

        let chars = text.chars().count();
        if chars > max_chars {
            return Err(DomainError::invalid_request(format!(
                "Prompt is too long: {} characters (max {})",
                chars, max_chars
            )));
        }

        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key used to group concurrent requests for the same prompt
    pub fn dedupe_key(&self) -> String {
        self.0.trim().to_lowercase()
    }
}

impl AsRef<str> for Prompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
