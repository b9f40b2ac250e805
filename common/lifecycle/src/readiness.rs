//! K8s readiness probe handler.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::state::ServiceState;

/// Axum-compatible readiness probe; returns 200 while the service is ready, 503 otherwise.
#[derive(Clone)]
pub struct ReadinessHandler {
    state: Arc<ServiceState>,
}

impl ReadinessHandler {
    pub fn new(state: Arc<ServiceState>) -> Self {
        Self { state }
    }

    /// Reads the readiness flag; no I/O.
    pub fn check(&self) -> ReadinessStatus {
        ReadinessStatus {
            ready: self.state.is_ready(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadinessStatus {
    pub ready: bool,
}

impl IntoResponse for ReadinessStatus {
    fn into_response(self) -> Response {
        match self.ready {
            true => (StatusCode::OK, Json(json!({"status": "ready"}))),
            false => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "not_ready"})),
            ),
        }
        .into_response()
    }
}
