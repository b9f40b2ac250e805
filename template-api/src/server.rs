use std::sync::Arc;

use eyre::{Result, WrapErr};
use lifecycle::{Manager, ShutdownReport};
use tokio::net::TcpListener;
use tracing::info;

use crate::app_context::AppContext;
use crate::router;

/// Run the service on `listener` until the manager's shutdown signal fires, then shut
/// the lifecycle down. The listener is bound by the caller so tests can use port 0.
pub async fn serve(
    context: Arc<AppContext>,
    listener: TcpListener,
    mut manager: Manager,
) -> Result<ShutdownReport> {
    let config = &context.config;
    info!(
        event = "service_startup",
        app_name = %config.app_name,
        db_host = %config.db_host,
        "service starting"
    );
    info!(
        event = "settings_loaded",
        app_name = %config.app_name,
        db_host = %config.db_host,
        host = %config.host,
        port = config.port,
        database_url = %config.redacted_database_url(),
        log_level = config.log_level.as_filter(),
        "settings loaded"
    );

    manager
        .startup()
        .await
        .wrap_err("failed to start the service lifecycle")?;

    let app = router::app(context.clone());
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(manager.shutdown_signal())
        .await;

    // Stop the tasks even if the server failed
    let report = manager.shutdown().await;
    served.wrap_err("http server failed")?;

    info!(
        app_name = %context.config.app_name,
        clean = report.is_clean(),
        "server stopped"
    );
    Ok(report)
}
