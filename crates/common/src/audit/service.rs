//! Audit orchestration: prompt, one model call, normalization

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;

use super::{AuditReport, CitationReference};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::llm::{create_model, GenerationRequest, GenerativeModel};
use crate::metrics;
use crate::normalize::{NormalizationDiagnostics, Normalizer};
use crate::prompt::{PromptBuilder, PromptOptions};

/// Per-audit limits and logging switches
#[derive(Debug, Clone)]
pub struct AuditSettings {
    /// Maximum number of URLs in one audit
    pub max_urls: usize,

    /// Log the raw model payload when normalization fails
    pub log_raw_payloads: bool,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            max_urls: 10,
            log_raw_payloads: false,
        }
    }
}

/// Result of a successful audit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditOutcome {
    pub report: AuditReport,

    /// Grounding sources, exactly as the model service returned them
    pub citations: Vec<CitationReference>,

    pub diagnostics: NormalizationDiagnostics,
}

/// Runs audits against a generative model.
///
/// Holds no per-audit state; concurrent calls are independent.
pub struct Auditor {
    model: Arc<dyn GenerativeModel>,
    prompts: PromptBuilder,
    normalizer: Normalizer,
    settings: AuditSettings,
}

impl Auditor {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        prompts: PromptBuilder,
        normalizer: Normalizer,
        settings: AuditSettings,
    ) -> Self {
        Self {
            model,
            prompts,
            normalizer,
            settings,
        }
    }

    /// Build an auditor with the configured model and the default normalizer
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let model = create_model(&config.model)?;
        let prompts = PromptBuilder::new(PromptOptions {
            web_search: config.model.web_search,
            constrained_decoding: config.model.constrained_decoding,
        });
        let settings = AuditSettings {
            max_urls: config.audit.max_urls,
            log_raw_payloads: config.audit.log_raw_payloads,
        };
        // ModelConfig's Debug output redacts the API key
        tracing::info!(model = ?config.model, audit = ?config.audit, "Auditor configured");
        Ok(Self::new(model, prompts, Normalizer::default(), settings))
    }

    pub fn model(&self) -> &dyn GenerativeModel {
        self.model.as_ref()
    }

    pub fn settings(&self) -> &AuditSettings {
        &self.settings
    }

    /// Audit the coverage behind `urls`.
    ///
    /// Input problems are reported before the model is contacted. The
    /// model is called exactly once; there are no retries.
    pub async fn perform_audit<S: AsRef<str>>(&self, urls: &[S]) -> Result<AuditOutcome> {
        let start = Instant::now();
        let result = self.run(urls).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind().as_str(),
        };
        metrics::record_audit(start.elapsed().as_secs_f64(), outcome);

        result
    }

    async fn run<S: AsRef<str>>(&self, urls: &[S]) -> Result<AuditOutcome> {
        let prompt = self.prompts.build(urls)?;
        if prompt.urls.len() > self.settings.max_urls {
            return Err(AppError::Validation {
                message: format!(
                    "At most {} article URLs can be audited at once",
                    self.settings.max_urls
                ),
                field: Some("urls".to_string()),
            });
        }

        let request = GenerationRequest {
            model: self.model.model().to_string(),
            system_instruction: prompt.system_instruction,
            user_content: prompt.user_content,
            web_search: self.prompts.options().web_search,
            structured_json: prompt.response_schema.is_some(),
            response_schema: prompt.response_schema,
        };

        tracing::info!(
            provider = self.model.name(),
            model = %request.model,
            urls = prompt.urls.len(),
            web_search = request.web_search,
            "Starting audit"
        );

        let response = self.model.generate(&request).await?;

        let text = match response.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => {
                let reason = response.empty_reason();
                tracing::warn!(reason = ?reason, "Model returned no text");
                return Err(AppError::EmptyResponse { reason });
            }
        };

        let normalized = match self.normalizer.normalize(Some(text)) {
            Ok(normalized) => normalized,
            Err(e) => {
                self.log_rejected_payload(text, &e);
                return Err(e);
            }
        };

        metrics::record_normalization(
            normalized.diagnostics.repaired_by,
            normalized.diagnostics.dangling_references,
        );
        if normalized.diagnostics.dangling_references > 0 {
            tracing::warn!(
                dangling = normalized.diagnostics.dangling_references,
                "Framing entries reference unknown claims"
            );
        }

        tracing::info!(
            claims = normalized.report.claims.len(),
            publications = normalized.report.publications.len(),
            citations = response.citations.len(),
            stages = ?normalized.diagnostics.stages_applied,
            "Audit complete"
        );

        Ok(AuditOutcome {
            report: normalized.report,
            citations: response.citations,
            diagnostics: normalized.diagnostics,
        })
    }

    fn log_rejected_payload(&self, text: &str, error: &AppError) {
        let fingerprint = payload_fingerprint(text);
        if self.settings.log_raw_payloads {
            tracing::warn!(
                error = %error,
                payload_len = text.len(),
                fingerprint = %fingerprint,
                payload = text,
                "Model output rejected"
            );
        } else {
            tracing::warn!(
                error = %error,
                payload_len = text.len(),
                fingerprint = %fingerprint,
                "Model output rejected"
            );
        }
    }
}

/// Short SHA-256 fingerprint for correlating rejected payloads
fn payload_fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(&digest[..8])
}
