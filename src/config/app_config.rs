use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::SemanticCacheConfig;
use crate::infrastructure::embedding::{EncoderBackend, EncoderConfig};
use crate::infrastructure::generator::StabilityConfig;
use crate::infrastructure::observability::ObservabilityConfig;
use crate::infrastructure::semantic_cache::IndexConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cache: SemanticCacheConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub generator: StabilityConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where generated images are written and served from
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifacts_dir")]
    pub dir: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10000
}

fn default_level() -> String {
    "info".to_string()
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("images")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;

        Ok(config.with_env_fallbacks(|key| std::env::var(key).ok()))
    }

    /// Fill unset values from the conventional unprefixed variables
    pub fn with_env_fallbacks(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.generator.api_key.is_none() {
            self.generator.api_key = lookup("STABILITY_API_KEY");
        }

        if self.encoder.backend == EncoderBackend::Openai && self.encoder.api_key.is_none() {
            self.encoder.api_key = lookup("OPENAI_API_KEY");
        }

        if lookup("APP__SERVER__PORT").is_none() {
            if let Some(port) = lookup("PORT").and_then(|p| p.trim().parse().ok()) {
                self.server.port = port;
            }
        }

        self
    }
}
