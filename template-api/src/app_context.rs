use std::sync::Arc;

use common_metrics::MetricsSink;
use lifecycle::{Manager, ServiceState, TaskSpec, TcpCheck};

use crate::config::Config;
use crate::heartbeat::{Heartbeat, HEARTBEAT_TASK};

/// Everything the HTTP handlers and the lifecycle share, built once in `main`.
pub struct AppContext {
    pub config: Config,
    pub state: Arc<ServiceState>,
    pub sink: Arc<dyn MetricsSink>,
}

impl AppContext {
    pub fn new(config: Config, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            config,
            state: Arc::new(ServiceState::new()),
            sink,
        }
    }

    /// Lifecycle manager wired to this context's state and sink, with the heartbeat
    /// task declared and, when enabled, a TCP probe of the database.
    pub fn manager(&self, trap_signals: bool) -> Manager {
        let config = &self.config;
        let mut builder = Manager::builder(&config.app_name)
            .with_sink(self.sink.clone())
            .with_state(self.state.clone())
            .with_metric_names(config.metric_names())
            .with_build_info("app_name", config.app_name.as_str())
            .with_build_info("version", env!("CARGO_PKG_VERSION"))
            .with_task(TaskSpec::new(
                HEARTBEAT_TASK,
                config.heartbeat_interval(),
                Heartbeat::new(config.app_name.as_str()),
            ))
            .with_task_shutdown_timeout(config.task_shutdown_timeout())
            .with_trap_signals(trap_signals);

        if let Some(sha) = &config.build_sha {
            builder = builder.with_build_info("build_sha", sha.as_str());
        }
        if let Some(date) = &config.build_date {
            builder = builder.with_build_info("build_date", date.as_str());
        }
        if *config.dependency_check_enabled {
            builder = builder.with_dependency_check(TcpCheck::new(
                "database",
                config.database_address(),
                config.dependency_check_timeout(),
            ));
        }

        builder.build()
    }
}
