use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{
    completion::{CompletionCall, CompletionService},
    config::AppConfig,
    error::ServiceError,
    metrics::{MetricsRegistry, render_metrics},
    model::{CompletionResponse, catalog},
    timing::TimingSimulator,
};

/// Header a caller can use to pick an adapter.
pub const LORA_HEADER: &str = "x-lora-module";

/// Content type of the Prometheus text exposition format.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Clone)]
pub struct AppState {
    pub completions: CompletionService,
}

pub fn build_router(config: &AppConfig, registry: Arc<MetricsRegistry>) -> Router {
    let simulator = TimingSimulator::from_config(config);
    build_router_with(CompletionService::new(registry, simulator))
}

/// Router over an already assembled service, e.g. one with a custom delay.
pub fn build_router_with(completions: CompletionService) -> Router {
    let state = AppState { completions };

    Router::new()
        .route("/v1/completions", post(completions_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn completions_handler(
    State(state): State<AppState>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CompletionResponse>, ServiceError> {
    // repeated `?lora=` parameters are tolerated; the first one counts
    let query_lora = query
        .iter()
        .find(|(key, _)| key == "lora")
        .map(|(_, value)| value.as_str());

    let call = CompletionCall {
        query_lora,
        header_lora: headers.get(LORA_HEADER).and_then(|v| v.to_str().ok()),
        body: &body,
    };

    let response = state.completions.handle(call).await.inspect_err(|err| {
        warn!(%err, "rejected completion request");
    })?;

    Ok(Json(response))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.completions.registry().snapshot();
    let body = render_metrics(
        &snapshot,
        catalog::max_lora(),
        chrono::Utc::now().timestamp(),
    );

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
        body,
    )
}
