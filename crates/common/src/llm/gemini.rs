//! Gemini client via the Generative Language API
//!
//! The API key travels in the `x-goog-api-key` header only. It is never put
//! in the URL and never logged.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use super::{GenerationRequest, GenerationResponse, GenerativeModel};
use crate::audit::CitationReference;
use crate::config::ModelConfig;
use crate::errors::{AppError, Result};
use crate::metrics;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini client
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: SystemInstruction<'a>,
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Deserialize)]
struct WebChunk {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GeminiClient {
    /// Create a new Gemini client from configuration
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "model API key is not set (APP__MODEL__API_KEY or GEMINI_API_KEY)"
                    .to_string(),
            })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| AppError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
        })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Get the API endpoint URL
    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn build_body<'a>(request: &'a GenerationRequest) -> GenerateRequest<'a> {
        let tools = if request.web_search {
            vec![Tool {
                google_search: GoogleSearch {},
            }]
        } else {
            Vec::new()
        };

        let generation_config = (request.structured_json || request.response_schema.is_some())
            .then(|| GenerationConfig {
                response_mime_type: "application/json",
                response_schema: request.response_schema.as_ref(),
            });

        GenerateRequest {
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: &request.system_instruction,
                }],
            },
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: &request.user_content,
                }],
            }],
            tools,
            generation_config,
        }
    }

    async fn send(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(|e| AppError::Upstream {
                status: None,
                message: format!("Request failed: {}", e.without_url()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| AppError::Upstream {
            status: Some(status.as_u16()),
            message: format!("Failed to parse response: {}", e.without_url()),
        })?;

        Ok(into_generation_response(body))
    }
}

/// Map a non-success HTTP answer to the service error classes
fn classify_failure(status: StatusCode, body: &str) -> AppError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = envelope
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("API error {}", status));

    let exhausted = envelope
        .as_ref()
        .is_some_and(|e| e.error.status == "RESOURCE_EXHAUSTED");

    if status == StatusCode::TOO_MANY_REQUESTS || exhausted {
        AppError::ServiceOverloaded { message }
    } else {
        AppError::Upstream {
            status: Some(status.as_u16()),
            message,
        }
    }
}

/// Keep the first candidate's text and grounding chunks
fn into_generation_response(body: GenerateResponse) -> GenerationResponse {
    let block_reason = body.prompt_feedback.and_then(|f| f.block_reason);
    let Some(candidate) = body.candidates.into_iter().next() else {
        return GenerationResponse {
            block_reason,
            ..Default::default()
        };
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let citations = candidate
        .grounding_metadata
        .map(|g| {
            g.grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web)
                .map(|web| CitationReference::new(web.uri, web.title))
                .collect()
        })
        .unwrap_or_default();

    GenerationResponse {
        text: (!text.is_empty()).then_some(text),
        citations,
        finish_reason: candidate.finish_reason,
        block_reason,
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let start = Instant::now();
        let result = self.send(request).await;
        metrics::record_model_request(start.elapsed().as_secs_f64(), &request.model, result.is_ok());

        if let Err(e) = &result {
            tracing::warn!(model = %request.model, error = %e, "Model request failed");
        }
        result
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(web_search: bool, schema: Option<Value>) -> GenerationRequest {
        GenerationRequest {
            model: "gemini-2.5-flash".into(),
            system_instruction: "persona".into(),
            user_content: "task".into(),
            web_search,
            response_schema: schema,
            structured_json: false,
        }
    }

    #[test]
    fn test_request_body_with_search() {
        let req = request(true, None);
        let body = serde_json::to_value(GeminiClient::build_body(&req)).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "persona");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "task");
        assert!(body["tools"][0]["google_search"].is_object());
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_request_body_with_schema() {
        let req = request(false, Some(json!({ "type": "OBJECT" })));
        let body = serde_json::to_value(GeminiClient::build_body(&req)).unwrap();
        assert!(body.get("tools").is_none());
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn test_response_with_grounding() {
        let body: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"verified_facts\":" }, { "text": "[]}" }] },
                "finishReason": "STOP",
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://a.example/story", "title": "a.example" } },
                        { "web": { "uri": "https://b.example/story" } },
                        { "retrievedContext": {} }
                    ]
                }
            }]
        }))
        .unwrap();

        let response = into_generation_response(body);
        assert_eq!(response.text.as_deref(), Some("{\"verified_facts\":[]}"));
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(response.citations.len(), 2);
        assert_eq!(response.citations[0].title.as_deref(), Some("a.example"));
        assert!(response.citations[1].title.is_none());
    }

    #[test]
    fn test_response_without_candidates() {
        let body: GenerateResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        let response = into_generation_response(body);
        assert!(response.text.is_none());
        assert!(response.citations.is_empty());
        assert_eq!(response.block_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn test_classify_rate_limit() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        match classify_failure(StatusCode::TOO_MANY_REQUESTS, body) {
            AppError::ServiceOverloaded { message } => assert_eq!(message, "Quota exceeded"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_classify_generic_failure() {
        match classify_failure(StatusCode::UNAUTHORIZED, "not json") {
            AppError::Upstream { status, message } => {
                assert_eq!(status, Some(401));
                assert!(message.contains("401"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_new_trims_base_url() {
        let config = ModelConfig {
            api_key: Some("key".into()),
            api_base: Some("http://localhost:9000/v1beta/".into()),
            ..Default::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint("gemini-2.5-flash"),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
