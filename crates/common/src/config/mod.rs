//! Configuration management for framecheck services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values
//!
//! The model API key is never part of any file in the repository. It comes from
//! `APP__MODEL__API_KEY` or, failing that, `GEMINI_API_KEY`.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Fallback environment variable for the model API key
pub const API_KEY_ENV_FALLBACK: &str = "GEMINI_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Generative model configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Audit behaviour
    #[serde(default)]
    pub audit: AuditConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds (0 disables)
    #[serde(default)]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Model provider: gemini, mock
    #[serde(default = "default_model_provider")]
    pub provider: String,

    /// API key for the model service
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_model_name")]
    pub model: String,

    /// HTTP timeout in seconds (0 leaves cancellation to the caller)
    #[serde(default)]
    pub timeout_secs: u64,

    /// Let the model consult web search while answering
    #[serde(default = "default_true")]
    pub web_search: bool,

    /// Send the formal response schema as a decoding constraint
    #[serde(default)]
    pub constrained_decoding: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Maximum number of article URLs per audit
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,

    /// Log the raw model payload when normalization fails
    #[serde(default)]
    pub log_raw_payloads: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_true")]
    pub json_logging: bool,

    /// Serve Prometheus metrics at /metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_model_provider() -> String { "gemini".to_string() }
fn default_model_name() -> String { "gemini-2.5-flash".to_string() }
fn default_max_urls() -> usize { 10 }
fn default_log_level() -> String { "info".to_string() }
fn default_true() -> bool { true }
fn default_rate_limit() -> u32 { 2 }
fn default_burst() -> u32 { 5 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: 0,
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_model_provider(),
            api_key: None,
            api_base: None,
            model: default_model_name(),
            timeout_secs: 0,
            web_search: true,
            constrained_decoding: false,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_urls: default_max_urls(),
            log_raw_payloads: false,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: true,
            metrics_enabled: true,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            model: ModelConfig::default(),
            audit: AuditConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("web_search", &self.web_search)
            .field("constrained_decoding", &self.constrained_decoding)
            .finish()
    }
}

impl ModelConfig {
    /// Get the HTTP timeout, if one is configured
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

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
            // e.g., APP__MODEL__API_KEY=...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let mut config: Self = config.try_deserialize()?;
        config.apply_key_fallback(std::env::var(API_KEY_ENV_FALLBACK).ok());
        Ok(config)
    }

    /// Fill in the model API key from the fallback variable when unset
    fn apply_key_fallback(&mut self, fallback: Option<String>) {
        let missing = self
            .model
            .api_key
            .as_deref()
            .map_or(true, |k| k.trim().is_empty());
        if missing {
            self.model.api_key = fallback.filter(|k| !k.trim().is_empty());
        }
    }

    /// Get request timeout as Duration, if one is configured
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.server.request_timeout_secs > 0)
            .then(|| Duration::from_secs(self.server.request_timeout_secs))
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}
