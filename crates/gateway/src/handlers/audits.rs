//! Coverage audit handlers

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use framecheck_common::{
    audit::{AuditReport, CitationReference},
    errors::{AppError, Result},
    normalize::NormalizationDiagnostics,
};

/// Length of the baseline quote shown next to a framing entry
const BASELINE_EXCERPT_CHARS: usize = 60;

/// Request to audit the coverage behind a set of articles
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAuditRequest {
    /// Article URLs, in the order they should be listed
    #[validate(length(max = 20))]
    pub urls: Vec<String>,
}

/// A citation that can be rendered as a link
#[derive(Debug, Serialize)]
pub struct SourceLink {
    pub uri: String,
    pub title: String,
}

/// One framing entry joined with the claim it interprets
#[derive(Debug, Serialize)]
pub struct FramingView {
    pub publisher_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<i64>,
    /// Shortened claim statement; absent when the claim id is missing or unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,
    pub framing_narrative: String,
}

/// Completed audit
#[derive(Debug, Serialize)]
pub struct AuditResponse {
    pub audit_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub report: AuditReport,
    /// Grounding citations exactly as returned by the model service
    pub citations: Vec<CitationReference>,
    pub sources: Vec<SourceLink>,
    pub framing: Vec<FramingView>,
    pub diagnostics: NormalizationDiagnostics,
}

/// Run one audit and return the normalized report
pub async fn create_audit(
    State(state): State<AppState>,
    Json(request): Json<CreateAuditRequest>,
) -> Result<Json<AuditResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("urls".to_string()),
    })?;

    let audit_id = Uuid::new_v4();
    let outcome = state.auditor.perform_audit(request.urls.as_slice()).await?;

    tracing::info!(
        audit_id = %audit_id,
        claims = outcome.report.claims.len(),
        dangling = outcome.diagnostics.dangling_references,
        "Audit served"
    );

    let sources = outcome
        .citations
        .iter()
        .filter(|c| c.is_displayable())
        .filter_map(|c| {
            Some(SourceLink {
                uri: c.uri.clone()?,
                title: c.display_title().to_string(),
            })
        })
        .collect();

    let framing = outcome
        .report
        .resolve_framing()
        .into_iter()
        .map(|resolved| FramingView {
            publisher_name: resolved.publication.publisher_name.clone(),
            claim_id: resolved.entry.referenced_claim_id,
            baseline: resolved
                .baseline
                .map(|claim| claim.excerpt(BASELINE_EXCERPT_CHARS).into_owned()),
            framing_narrative: resolved.entry.framing_narrative.clone(),
        })
        .collect();

    Ok(Json(AuditResponse {
        audit_id,
        generated_at: Utc::now(),
        report: outcome.report,
        citations: outcome.citations,
        sources,
        framing,
        diagnostics: outcome.diagnostics,
    }))
}
