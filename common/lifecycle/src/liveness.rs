//! Liveness probe handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// K8s liveness probe handler. Always returns 200: liveness means "the process is
/// reachable", independent of readiness.
#[derive(Clone, Default)]
pub struct LivenessHandler;

impl LivenessHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self) -> LivenessStatus {
        LivenessStatus
    }
}

/// Always-healthy liveness status. Implements [`IntoResponse`] for axum.
pub struct LivenessStatus;

impl IntoResponse for LivenessStatus {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
    }
}
