//! Stability AI image generator

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::generator::{GeneratedImage, ImageGenerator};
use crate::domain::{DomainError, Prompt};
use crate::infrastructure::http::HttpClientTrait;

const DEFAULT_STABILITY_ENDPOINT: &str =
    "https://api.stability.ai/v2beta/stable-image/generate/core";
const DEFAULT_OUTPUT_FORMAT: &str = "webp";

/// Stability generator settings
#[derive(Clone, Deserialize)]
pub struct StabilityConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for StabilityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StabilityConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("output_format", &self.output_format)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_endpoint() -> String {
    DEFAULT_STABILITY_ENDPOINT.to_string()
}

fn default_output_format() -> String {
    DEFAULT_OUTPUT_FORMAT.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            output_format: default_output_format(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StabilityConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// The configured key, rejecting missing or blank values
    pub fn require_api_key(&self) -> Result<&str, DomainError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                DomainError::configuration(
                    "Generator API key is not set (generator.api_key or STABILITY_API_KEY)",
                )
            })
    }
}

/// Generator backed by the Stability `stable-image/generate/core` endpoint
pub struct StabilityImageGenerator<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    endpoint: String,
    output_format: String,
}

impl<C: HttpClientTrait> std::fmt::Debug for StabilityImageGenerator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StabilityImageGenerator")
            .field("client", &self.client)
            .field("endpoint", &self.endpoint)
            .field("output_format", &self.output_format)
            .finish_non_exhaustive()
    }
}

impl<C: HttpClientTrait> StabilityImageGenerator<C> {
    pub fn new(client: C, config: &StabilityConfig) -> Result<Self, DomainError> {
        let api_key = config.require_api_key()?;

        Ok(Self {
            client,
            auth_header: format!("Bearer {}", api_key),
            endpoint: config.endpoint.clone(),
            output_format: config.output_format.clone(),
        })
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Accept", "image/*"),
        ]
    }

    fn fields(&self, prompt: &Prompt) -> Vec<(String, String)> {
        vec![
            ("prompt".to_string(), prompt.as_str().to_string()),
            ("output_format".to_string(), self.output_format.clone()),
        ]
    }
}

#[async_trait]
impl<C: HttpClientTrait> ImageGenerator for StabilityImageGenerator<C> {
    async fn generate(&self, prompt: &Prompt) -> Result<GeneratedImage, DomainError> {
        let started = Instant::now();

        let result = self
            .client
            .post_multipart(&self.endpoint, self.headers(), self.fields(prompt))
            .await;

        let latency_ms = started.elapsed().as_millis() as u64;

        let bytes = result.map_err(|e| {
            warn!(latency_ms, error = %e, "Image generation request failed");
            DomainError::generation_failed(e.to_string())
        })?;

        if bytes.is_empty() {
            warn!(latency_ms, "Image generation returned an empty body");
            return Err(DomainError::generation_failed("Generator returned no image data"));
        }

        debug!(latency_ms, size = bytes.len(), "Image generated");

        Ok(GeneratedImage::new(bytes, self.output_format.clone()))
    }

    fn provider_name(&self) -> &'static str {
        "stability"
    }
}
