//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub model: ModelCheck,
}

#[derive(Serialize)]
pub struct ModelCheck {
    pub provider: String,
    pub model: String,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: framecheck_common::VERSION.to_string(),
    })
}

/// Readiness probe - reports the model the audits will use.
///
/// The model client is built at startup, so a running server is ready.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let model = state.auditor.model();
    Json(ReadyResponse {
        status: "ready".to_string(),
        model: ModelCheck {
            provider: model.name().to_string(),
            model: model.model().to_string(),
        },
    })
}
