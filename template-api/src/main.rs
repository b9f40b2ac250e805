use std::sync::Arc;

use common_metrics::PrometheusSink;
use envconfig::Envconfig;
use eyre::{Result, WrapErr};
use tokio::net::TcpListener;
use tracing::{error, info};

use template_api::app_context::AppContext;
use template_api::config::Config;
use template_api::{logging, server};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine, the environment alone is enough
    dotenvy::dotenv().ok();

    let config = Config::init_from_env().wrap_err("invalid configuration")?;
    logging::init(&config);

    let sink = PrometheusSink::install().wrap_err("failed to set up metrics")?;
    let context = Arc::new(AppContext::new(config, Arc::new(sink)));
    let manager = context.manager(true);

    let bind = context.config.bind();
    let listener = TcpListener::bind(&bind)
        .await
        .wrap_err_with(|| format!("failed to bind {bind}"))?;
    info!(address = %bind, "listening");

    let report = server::serve(context, listener, manager).await?;
    if let Err(e) = report.into_result() {
        error!(error = %e, "shutdown was not clean");
        return Err(e).wrap_err("shutdown was not clean");
    }

    info!("exiting");
    Ok(())
}
