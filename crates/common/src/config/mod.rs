//! Configuration management for FinSight services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM collaborator configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Conversation graph configuration
    #[serde(default)]
    pub graph: GraphConfig,

    /// Extraction pipeline configuration
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// API endpoint for the completion service
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key (empty key switches the client to mock responses)
    #[serde(default)]
    pub api_key: String,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Maximum output tokens per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-call deadline in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    /// Character budget per document when building the context bundle
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,

    /// Character budget for citation previews in the digest
    #[serde(default = "default_citation_preview_chars")]
    pub citation_preview_chars: usize,

    /// Character budget for document summaries in the digest
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    /// Character budget for structured re-extraction input
    #[serde(default = "default_structured_input_chars")]
    pub structured_input_chars: usize,

    /// Sampling temperature for structured re-extraction
    #[serde(default = "default_structured_temperature")]
    pub structured_temperature: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_max_upload_bytes() -> usize { 25 * 1024 * 1024 }
fn default_llm_endpoint() -> String { "https://api.anthropic.com/v1/messages".to_string() }
fn default_llm_model() -> String { "claude-3-5-sonnet-latest".to_string() }
fn default_max_tokens() -> usize { 4000 }
fn default_temperature() -> f32 { 0.2 }
fn default_llm_timeout() -> u64 { 30 }
fn default_max_document_chars() -> usize { crate::DEFAULT_MAX_DOCUMENT_CHARS }
fn default_citation_preview_chars() -> usize { 100 }
fn default_summary_chars() -> usize { 500 }
fn default_structured_input_chars() -> usize { 15_000 }
fn default_structured_temperature() -> f32 { 0.0 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "finsight".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__LLM__API_KEY=sk-...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get the per-call collaborator deadline as Duration
    pub fn llm_deadline(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }

    /// Get the request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            graph: GraphConfig::default(),
            extraction: ExtractionConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: String::new(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_document_chars: default_max_document_chars(),
            citation_preview_chars: default_citation_preview_chars(),
            summary_chars: default_summary_chars(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            structured_input_chars: default_structured_input_chars(),
            structured_temperature: default_structured_temperature(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.model, "claude-3-5-sonnet-latest");
        assert_eq!(config.llm_deadline(), Duration::from_secs(30));
    }

    #[test]
    fn test_mock_mode_on_empty_key() {
        let config = AppConfig::default();
        assert!(config.llm.api_key.is_empty());
    }
}
