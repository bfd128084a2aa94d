//! Framecheck API Gateway
//!
//! The HTTP entry point for coverage audits.
//! Handles:
//! - Request validation and routing
//! - Rate limiting
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use framecheck_common::{
    audit::Auditor,
    config::{AppConfig, ObservabilityConfig},
    metrics::{self, AUDIT_BUCKETS},
};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::middleware::{
    metrics::track_metrics,
    rate_limit::{create_rate_limiter, rate_limit_middleware},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auditor: Arc<Auditor>,
    pub metrics: Option<PrometheusHandle>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    init_tracing(&config.observability);

    info!("Starting framecheck API Gateway v{}", framecheck_common::VERSION);
    info!(env = ?std::env::var("APP_ENV").ok(), "Configuration loaded");

    // Initialize metrics
    let metrics = if config.observability.metrics_enabled {
        Some(init_metrics()?)
    } else {
        None
    };

    // Initialize the model client and the auditor
    let auditor = Auditor::from_config(&config).map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize auditor");
        e
    })?;

    let config = Arc::new(config);
    let state = AppState {
        config: config.clone(),
        auditor: Arc::new(auditor),
        metrics,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let shutdown = async move {
        shutdown_signal().await;
        let _ = signalled_tx.send(());
    };
    let grace = config.shutdown_timeout();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .into_future();

    tokio::select! {
        result = server => result?,
        _ = async {
            let _ = signalled_rx.await;
            tokio::time::sleep(grace).await;
        } => warn!(timeout_secs = grace.as_secs(), "Graceful shutdown timed out"),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Set up the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Install the Prometheus recorder and describe all metrics
fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            AUDIT_BUCKETS,
        )?
        .install_recorder()?;

    metrics::register_metrics();
    Ok(handle)
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let mut api_routes = Router::new()
        .route("/audits", post(handlers::audits::create_audit));

    if config.rate_limit.enabled {
        let limiter = create_rate_limiter(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        );
        api_routes = api_routes.route_layer(from_fn_with_state(limiter, rate_limit_middleware));
    }

    let mut router = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .route_layer(from_fn(track_metrics));

    // Added after the metrics layer so scrapes are not counted
    if let Some(handle) = state.metrics.clone() {
        router = router.route("/metrics", get(move || std::future::ready(handle.render())));
    }

    if let Some(timeout) = config.request_timeout() {
        router = router.layer(TimeoutLayer::new(timeout));
    }

    // Compose the app
    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use framecheck_common::{
        audit::AuditSettings,
        errors::AppError,
        llm::{GenerationResponse, MockModel},
        normalize::Normalizer,
        prompt::PromptBuilder,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const SCENARIO_RESPONSE: &str = "```json\n{\"verified_facts\":[{\"index\":1,\"content\":\"X happened\"}],\"publications\":[],\"synthesis\":{\"consensus_points\":[],\"divergent_perspectives\":[],\"analytical_meta_notes\":[]}}\n```";

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;
        config
    }

    fn app(model: Arc<MockModel>, config: AppConfig) -> Router {
        let auditor = Auditor::new(
            model,
            PromptBuilder::default(),
            Normalizer::default(),
            AuditSettings::default(),
        );
        create_router(AppState {
            config: Arc::new(config),
            auditor: Arc::new(auditor),
            metrics: None,
        })
    }

    fn audit_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/audits")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(Arc::new(MockModel::sample()), test_config());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_reports_model() {
        let app = app(Arc::new(MockModel::sample()), test_config());
        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["model"]["provider"], "mock");
        assert_eq!(body["model"]["model"], "mock-model");
    }

    #[tokio::test]
    async fn test_create_audit() {
        let model = Arc::new(MockModel::new(GenerationResponse {
            text: Some(SCENARIO_RESPONSE.to_string()),
            citations: vec![
                framecheck_common::CitationReference::new(
                    Some("https://a.example/story".into()),
                    None,
                ),
                framecheck_common::CitationReference::new(None, Some("orphan".into())),
            ],
            ..Default::default()
        }));
        let app = app(model.clone(), test_config());

        let response = app
            .oneshot(audit_request(json!({
                "urls": ["https://a.example/story", "https://b.example/story"]
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["report"]["verified_facts"][0]["index"], 1);
        assert_eq!(body["report"]["verified_facts"][0]["content"], "X happened");
        assert_eq!(body["report"]["publications"], json!([]));
        assert_eq!(body["citations"].as_array().unwrap().len(), 2);
        assert_eq!(body["sources"], json!([
            { "uri": "https://a.example/story", "title": "External Source" }
        ]));
        assert_eq!(body["audit_id"].as_str().unwrap().len(), 36);
        assert!(body["generated_at"].is_string());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_framing_view_resolves_baselines() {
        let text = json!({
            "verified_facts": [
                { "index": 1, "content": "The council approved a budget that raises transit spending by twelve percent" }
            ],
            "publications": [{
                "publisher": "Metro Post",
                "source_url": "https://a.example/story",
                "political_alignment": "center",
                "narratives": [
                    { "fact_id": 1, "framing_narrative": "A win for commuters" },
                    { "fact_id": 9, "framing_narrative": "Refers to nothing" }
                ]
            }],
            "synthesis": {}
        })
        .to_string();
        let app = app(Arc::new(MockModel::with_text(text)), test_config());

        let response = app
            .oneshot(audit_request(json!({ "urls": ["https://a.example/story"] })))
            .await
            .unwrap();

        let body = body_json(response).await;
        let framing = body["framing"].as_array().unwrap();
        assert_eq!(framing.len(), 2);
        let baseline = framing[0]["baseline"].as_str().unwrap();
        assert_eq!(baseline.chars().count(), 60);
        assert!(baseline.ends_with("..."));
        assert!(framing[1].get("baseline").is_none());
        assert_eq!(body["diagnostics"]["dangling_references"], 1);
    }

    #[tokio::test]
    async fn test_empty_urls_is_input_error() {
        let model = Arc::new(MockModel::sample());
        let app = app(model.clone(), test_config());

        let response = app
            .oneshot(audit_request(json!({ "urls": [] })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NO_URLS");
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_too_many_urls_rejected() {
        let model = Arc::new(MockModel::sample());
        let app = app(model.clone(), test_config());
        let urls: Vec<String> = (0..21).map(|i| format!("https://a.example/{i}")).collect();

        let response = app
            .oneshot(audit_request(json!({ "urls": urls })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_overloaded_model_maps_to_503() {
        let model = Arc::new(MockModel::failing(|| AppError::ServiceOverloaded {
            message: "Quota exceeded".into(),
        }));
        let app = app(model, test_config());

        let response = app
            .oneshot(audit_request(json!({ "urls": ["https://a.example/story"] })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "SERVICE_OVERLOADED");
        assert!(!body["error"]["message"].as_str().unwrap().contains("Quota"));
    }

    #[tokio::test]
    async fn test_format_error_hides_diagnostic() {
        let model = Arc::new(MockModel::with_text("{\"verified_facts\": [ {\"index\": 1 \"content\": \"x\"} ]}"));
        let app = app(model, test_config());

        let response = app
            .oneshot(audit_request(json!({ "urls": ["https://a.example/story"] })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_FORMAT");
        assert!(!body["error"]["message"].as_str().unwrap().contains("column"));
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let mut config = test_config();
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        let app = app(Arc::new(MockModel::sample()), config);

        let body = json!({ "urls": ["https://a.example/story"] });
        let first = app.clone().oneshot(audit_request(body.clone())).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(audit_request(body)).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
