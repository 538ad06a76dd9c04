/// Liveness and metrics endpoints
use crate::{context::AppContext, metrics};
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/test", get(liveness))
        .route("/metrics", get(prometheus_metrics))
}

/// Liveness only, no dependency checks
pub async fn liveness() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}

/// Prometheus text exposition
pub async fn prometheus_metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}
