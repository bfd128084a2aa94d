//! Generative model abstraction
//!
//! Provides a unified interface to the remote model service:
//! - Gemini (Generative Language API, with web search grounding)
//! - Mock (canned responses, for development and tests)
//!
//! Calls are whole-response, single attempt. Retrying is the caller's decision.

mod gemini;
mod mock;

pub use gemini::GeminiClient;
pub use mock::MockModel;

use crate::audit::CitationReference;
use crate::config::ModelConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// One call to the model service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    /// Model identifier, e.g. "gemini-2.5-flash"
    pub model: String,

    pub system_instruction: String,

    pub user_content: String,

    /// Allow the model to ground its answer with web search
    pub web_search: bool,

    /// Formal schema used as a decoding constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,

    /// Ask for a JSON response body
    pub structured_json: bool,
}

/// What the model service returned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationResponse {
    /// Answer text; `None` when the service produced none
    pub text: Option<String>,

    /// Grounding side channel, passed through unmodified
    pub citations: Vec<CitationReference>,

    /// Why generation stopped, e.g. "STOP", "SAFETY", "MAX_TOKENS"
    pub finish_reason: Option<String>,

    /// Set when the prompt itself was blocked
    pub block_reason: Option<String>,
}

impl GenerationResponse {
    /// Response carrying only text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Best explanation for a missing answer
    pub fn empty_reason(&self) -> Option<String> {
        self.block_reason
            .clone()
            .or_else(|| self.finish_reason.clone().filter(|r| r != "STOP"))
    }
}

/// Trait for the remote generative model
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Run one generation
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model identifier sent with requests
    fn model(&self) -> &str;
}

/// Create a model client based on configuration
pub fn create_model(config: &ModelConfig) -> Result<Arc<dyn GenerativeModel>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiClient::new(config)?)),
        "mock" => {
            tracing::warn!("Using mock model provider; audits return canned data");
            Ok(Arc::new(MockModel::sample()))
        }
        other => Err(AppError::Configuration {
            message: format!("unknown model provider: {other}"),
        }),
    }
}
