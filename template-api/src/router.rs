use std::future::ready;
use std::sync::Arc;

use axum::{routing::get, Router};
use common_metrics::setup_metrics_routes;
use lifecycle::{LivenessHandler, ReadinessHandler};
use tower_http::trace::TraceLayer;

use crate::app_context::AppContext;

pub fn app(context: Arc<AppContext>) -> Router {
    let index = format!("{} v{}", context.config.app_name, env!("CARGO_PKG_VERSION"));
    let liveness = LivenessHandler::new();
    let readiness = ReadinessHandler::new(context.state.clone());

    let router = Router::new()
        .route("/", get(move || ready(index.clone())))
        .route("/health", get(move || ready(liveness.check())))
        .route("/ready", get(move || ready(readiness.check())));

    setup_metrics_routes(router, context.sink.clone()).layer(TraceLayer::new_for_http())
}
