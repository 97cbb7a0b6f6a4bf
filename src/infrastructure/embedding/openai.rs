//! OpenAI embeddings encoder

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::embedding::{Embedding, Encoder, EncoderIdentity};
use crate::domain::{DomainError, Prompt};
use crate::infrastructure::http::HttpClientTrait;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Known OpenAI embedding models and their native dimensions
const EMBEDDING_MODELS: &[(&str, usize)] = &[
    ("text-embedding-3-small", 1536),
    ("text-embedding-3-large", 3072),
    ("text-embedding-ada-002", 1536),
];

/// Native dimensions for a known model
pub fn native_dimensions(model: &str) -> Option<usize> {
    EMBEDDING_MODELS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, dims)| *dims)
}

/// Encoder backed by the OpenAI embeddings endpoint
pub struct OpenAiEncoder<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    identity: EncoderIdentity,
}

impl<C: HttpClientTrait> std::fmt::Debug for OpenAiEncoder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEncoder")
            .field("client", &self.client)
            .field("base_url", &self.base_url)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl<C: HttpClientTrait> OpenAiEncoder<C> {
    /// Create a new OpenAI encoder
    pub fn new(
        client: C,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self::with_base_url(client, api_key, model, dimensions, DEFAULT_OPENAI_BASE_URL)
    }

    /// Create a new encoder with custom base URL
    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        base_url: impl Into<String>,
    ) -> Self {
        let auth_header = format!("Bearer {}", api_key.into());
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            auth_header,
            base_url,
            identity: EncoderIdentity::new("openai", model, dimensions),
        }
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn build_request(&self, text: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.identity.model(),
            "input": text,
        });

        // Only the v3 models accept a reduced dimension
        if self.identity.model().starts_with("text-embedding-3")
            && native_dimensions(self.identity.model()) != Some(self.identity.dimensions())
        {
            body["dimensions"] = serde_json::json!(self.identity.dimensions());
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<Embedding, DomainError> {
        let response: OpenAiEmbeddingResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider("openai", format!("Failed to parse embedding response: {}", e))
        })?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| DomainError::provider("openai", "No embedding returned"))?;

        self.identity.ensure_dimensions(&vector)?;

        Ok(Embedding::new(vector))
    }
}

#[async_trait]
impl<C: HttpClientTrait> Encoder for OpenAiEncoder<C> {
    async fn encode(&self, prompt: &Prompt) -> Result<Embedding, DomainError> {
        let url = self.embeddings_url();
        let body = self.build_request(prompt.as_str());

        let response = self.client.post_json(&url, self.headers(), &body).await?;

        self.parse_response(response)
    }

    fn identity(&self) -> &EncoderIdentity {
        &self.identity
    }
}

// OpenAI API types for embeddings

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http::MockHttpClient;

    const TEST_URL: &str = "https://api.openai.com/v1/embeddings";

    fn create_mock_response(dimensions: usize) -> serde_json::Value {
        let embedding: Vec<f32> = (0..dimensions).map(|j| j as f32 * 0.001).collect();

        serde_json::json!({
            "model": "text-embedding-3-small",
            "data": [{ "index": 0, "embedding": embedding, "object": "embedding" }],
            "usage": { "prompt_tokens": 3, "total_tokens": 3 }
        })
    }

    #[tokio::test]
    async fn test_encode_single_prompt() {
        let client = MockHttpClient::new().with_response(TEST_URL, create_mock_response(1536));
        let encoder = OpenAiEncoder::new(client, "test-key", "text-embedding-3-small", 1536);

        let embedding = encoder
            .encode(&Prompt::new("a red fox").unwrap())
            .await
            .unwrap();

        assert_eq!(embedding.dimensions(), 1536);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let client = MockHttpClient::new().with_response(TEST_URL, create_mock_response(256));
        let encoder = OpenAiEncoder::new(client, "test-key", "text-embedding-3-small", 1536);

        let result = encoder.encode(&Prompt::new("a red fox").unwrap()).await;

        assert!(matches!(result, Err(DomainError::EncoderMismatch { .. })));
    }

    #[tokio::test]
    async fn test_encode_error() {
        let client = MockHttpClient::new().with_error(TEST_URL, "Rate limit exceeded");
        let encoder = OpenAiEncoder::new(client, "test-key", "text-embedding-3-small", 1536);

        let result = encoder.encode(&Prompt::new("a red fox").unwrap()).await;

        assert!(matches!(result, Err(DomainError::Provider { .. })));
    }

    #[tokio::test]
    async fn test_custom_base_url() {
        let custom_url = "http://localhost:8080/v1/embeddings";
        let client = MockHttpClient::new().with_response(custom_url, create_mock_response(384));
        let encoder = OpenAiEncoder::with_base_url(
            client,
            "test-key",
            "text-embedding-3-small",
            384,
            "http://localhost:8080/",
        );

        let embedding = encoder.encode(&Prompt::new("Test").unwrap()).await.unwrap();

        assert_eq!(embedding.dimensions(), 384);
    }

    #[test]
    fn test_request_includes_reduced_dimensions() {
        let encoder =
            OpenAiEncoder::new(MockHttpClient::new(), "k", "text-embedding-3-small", 384);
        let body = encoder.build_request("hello");

        assert_eq!(body["dimensions"], 384);
        assert_eq!(body["input"], "hello");
    }

    #[test]
    fn test_request_omits_native_dimensions() {
        let encoder =
            OpenAiEncoder::new(MockHttpClient::new(), "k", "text-embedding-ada-002", 1536);
        let body = encoder.build_request("hello");

        assert!(body.get("dimensions").is_none());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let encoder =
            OpenAiEncoder::new(MockHttpClient::new(), "sk-secret", "text-embedding-3-small", 1536);

        assert!(!format!("{:?}", encoder).contains("sk-secret"));
    }

    #[test]
    fn test_identity_and_native_dimensions() {
        let encoder =
            OpenAiEncoder::new(MockHttpClient::new(), "k", "text-embedding-3-small", 1536);

        assert_eq!(encoder.identity().provider(), "openai");
        assert_eq!(native_dimensions("text-embedding-3-large"), Some(3072));
        assert_eq!(native_dimensions("unknown-model"), None);
    }
}
