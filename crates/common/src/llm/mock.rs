//! Mock model for development and testing

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{GenerationRequest, GenerationResponse, GenerativeModel};
use crate::audit::CitationReference;
use crate::errors::{AppError, Result};

const SAMPLE_RESPONSE: &str = r#"```json
{
  "verified_facts": [
    { "index": 1, "content": "A storm closed the coastal highway on Monday morning." },
    { "index": 2, "content": "State officials reported no fatalities." }
  ],
  "publications": [
    {
      "publisher": "Sample Outlet",
      "source_url": "https://news.example/storm",
      "political_alignment": "unclear",
      "narratives": [
        { "fact_id": 1, "framing_narrative": "Presents the closure as a routine precaution.", "pivotal_terms": ["precaution"] }
      ]
    }
  ],
  "synthesis": {
    "consensus_points": ["The highway was closed."],
    "divergent_perspectives": [],
    "analytical_meta_notes": ["Canned response from the mock model provider."]
  }
}
```"#;

/// Canned model response with a call counter
pub struct MockModel {
    outcome: Outcome,
    calls: AtomicUsize,
    last_request: Mutex<Option<GenerationRequest>>,
}

enum Outcome {
    Respond(GenerationResponse),
    Fail(fn() -> AppError),
}

impl MockModel {
    /// Always answer with `response`
    pub fn new(response: GenerationResponse) -> Self {
        Self {
            outcome: Outcome::Respond(response),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Always answer with `text` and no citations
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(GenerationResponse::text(text))
    }

    /// Always fail with the error built by `make_error`
    pub fn failing(make_error: fn() -> AppError) -> Self {
        Self {
            outcome: Outcome::Fail(make_error),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A well-formed fenced report with one citation
    pub fn sample() -> Self {
        Self::new(GenerationResponse {
            text: Some(SAMPLE_RESPONSE.to_string()),
            citations: vec![CitationReference::new(
                Some("https://news.example/storm".to_string()),
                Some("news.example".to_string()),
            )],
            finish_reason: Some("STOP".to_string()),
            block_reason: None,
        })
    }

    /// Number of `generate` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request, if any
    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl GenerativeModel for MockModel {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        match &self.outcome {
            Outcome::Respond(response) => Ok(response.clone()),
            Outcome::Fail(make_error) => Err(make_error()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
