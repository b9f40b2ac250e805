//! Lifecycle manager: startup sequencing, background task ownership, graceful shutdown.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common_metrics::{MetricsSink, NoopSink};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::checks::DependencyCheck;
use crate::error::LifecycleError;
use crate::liveness::LivenessHandler;
use crate::metrics::{emit_flag, MetricNames};
use crate::readiness::ReadinessHandler;
use crate::signals;
use crate::state::ServiceState;
use crate::task::{BackgroundTask, TaskOutcome, TaskSpec};

/// Options for creating a lifecycle manager.
#[derive(Clone, Debug)]
pub struct ManagerOptions {
    pub name: String,
    /// Per-task ceiling on the shutdown wait. `None` waits for as long as it takes.
    pub task_shutdown_timeout: Option<Duration>,
    /// Install SIGINT/SIGTERM handlers on startup (default: true).
    pub trap_signals: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            task_shutdown_timeout: None,
            trap_signals: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Created,
    Running,
    Stopped,
}

/// Builder for [`Manager`]; see [`Manager::builder`].
pub struct ManagerBuilder {
    options: ManagerOptions,
    sink: Arc<dyn MetricsSink>,
    state: Arc<ServiceState>,
    names: MetricNames,
    checks: Vec<Arc<dyn DependencyCheck>>,
    build_info: BTreeMap<String, String>,
    tasks: Vec<TaskSpec>,
}

impl ManagerBuilder {
    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Share the flags with whoever serves the probes.
    pub fn with_state(mut self, state: Arc<ServiceState>) -> Self {
        self.state = state;
        self
    }

    pub fn with_metric_names(mut self, names: MetricNames) -> Self {
        self.names = names;
        self
    }

    pub fn with_dependency_check(mut self, check: impl DependencyCheck + 'static) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    pub fn with_build_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.build_info.insert(key.into(), value.into());
        self
    }

    pub fn with_task(mut self, task: TaskSpec) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_task_shutdown_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.task_shutdown_timeout = timeout;
        self
    }

    pub fn with_trap_signals(mut self, trap: bool) -> Self {
        self.options.trap_signals = trap;
        self
    }

    pub fn build(self) -> Manager {
        Manager {
            name: self.options.name.clone(),
            options: self.options,
            sink: self.sink,
            state: self.state,
            names: self.names,
            checks: self.checks,
            build_info: self.build_info,
            specs: self.tasks,
            tasks: Vec::new(),
            phase: Phase::Created,
            shutdown_token: CancellationToken::new(),
        }
    }
}

/// Result of [`Manager::shutdown`]: how each background task terminated.
#[derive(Clone, Debug, Default)]
pub struct ShutdownReport {
    pub outcomes: Vec<(String, TaskOutcome)>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// True when every task was cancelled or completed.
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_clean())
    }

    pub fn outcome(&self, task: &str) -> Option<&TaskOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == task)
            .map(|(_, outcome)| outcome)
    }

    /// The first failed task wins; abandoned tasks are reported together.
    pub fn into_result(self) -> Result<(), LifecycleError> {
        let mut abandoned = Vec::new();
        for (tag, outcome) in self.outcomes {
            match outcome {
                TaskOutcome::Failed(reason) => {
                    return Err(LifecycleError::TaskFailed { tag, reason });
                }
                TaskOutcome::Abandoned => abandoned.push(tag),
                TaskOutcome::Cancelled | TaskOutcome::Completed => {}
            }
        }
        if abandoned.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::ShutdownTimeout {
                elapsed: self.elapsed,
                remaining: abandoned,
            })
        }
    }
}

/// Lifecycle manager: sole writer of the `up`/`ready` flags, owner of the periodic tasks.
///
/// `startup` raises liveness, validates dependencies, raises readiness, publishes build
/// info and launches the declared tasks. `shutdown` cancels the tasks, waits for them to
/// terminate, then drops readiness before liveness.
pub struct Manager {
    name: String,
    options: ManagerOptions,
    sink: Arc<dyn MetricsSink>,
    state: Arc<ServiceState>,
    names: MetricNames,
    checks: Vec<Arc<dyn DependencyCheck>>,
    build_info: BTreeMap<String, String>,
    specs: Vec<TaskSpec>,
    tasks: Vec<BackgroundTask>,
    phase: Phase,
    shutdown_token: CancellationToken,
}

impl Manager {
    pub fn builder(name: &str) -> ManagerBuilder {
        ManagerBuilder {
            options: ManagerOptions {
                name: name.to_string(),
                ..Default::default()
            },
            sink: Arc::new(NoopSink),
            state: Arc::new(ServiceState::new()),
            names: MetricNames::default(),
            checks: Vec::new(),
            build_info: BTreeMap::new(),
            tasks: Vec::new(),
        }
    }

    pub fn state(&self) -> Arc<ServiceState> {
        self.state.clone()
    }

    pub fn metric_names(&self) -> &MetricNames {
        &self.names
    }

    /// Names of the tasks currently running.
    pub fn running_tasks(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|task| !task.is_finished())
            .map(BackgroundTask::name)
            .collect()
    }

    /// Axum-compatible handler for `/ready`; 200 while ready, 503 otherwise.
    pub fn readiness_handler(&self) -> ReadinessHandler {
        ReadinessHandler::new(self.state.clone())
    }

    /// Axum-compatible handler for `/health`; always 200.
    pub fn liveness_handler(&self) -> LivenessHandler {
        LivenessHandler::new()
    }

    /// Cancelling this token requests shutdown, exactly like a trapped signal.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Future that resolves when shutdown is requested; pass to
    /// `axum::serve(...).with_graceful_shutdown(...)`.
    pub fn shutdown_signal(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let token = self.shutdown_token.clone();
        async move {
            token.cancelled().await;
        }
    }

    /// Bring the service up. Must run before the server accepts traffic. A failing
    /// dependency check is logged and leaves the service up but not ready.
    pub async fn startup(&mut self) -> Result<(), LifecycleError> {
        if self.phase != Phase::Created {
            return Err(LifecycleError::AlreadyStarted);
        }
        self.phase = Phase::Running;

        self.names.describe(self.sink.as_ref());
        self.state.set_up(true);
        emit_flag(self.sink.as_ref(), &self.names.up, true);
        emit_flag(self.sink.as_ref(), &self.names.ready, false);

        let mut validated = true;
        for check in &self.checks {
            if let Err(e) = check.check().await {
                validated = false;
                warn!(
                    event = "dependency_check_failed",
                    app_name = %self.name,
                    check = %check.name(),
                    error = %e,
                    "Lifecycle: dependency check failed, service stays not ready"
                );
            }
        }

        if validated && self.state.set_ready(true) {
            emit_flag(self.sink.as_ref(), &self.names.ready, true);
        }

        if self.state.publish_build_info(self.build_info.clone()) {
            let labels: Vec<(String, String)> = self
                .build_info
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            self.sink.set_info(&self.names.build_info, &labels);
        }

        for spec in &self.specs {
            let task = BackgroundTask::spawn(
                spec,
                self.sink.clone(),
                &self.names.heartbeat_total,
                &self.name,
            );
            info!(
                task = %task.name(),
                interval_secs = task.interval().as_secs_f64(),
                "Lifecycle: task started"
            );
            self.tasks.push(task);
        }

        if self.options.trap_signals {
            let token = self.shutdown_token.clone();
            tokio::spawn(async move {
                signals::wait_for_shutdown_signal().await;
                info!(trigger_reason = "signal", "Lifecycle: shutdown requested");
                token.cancel();
            });
        }

        info!(
            app_name = %self.name,
            ready = self.state.is_ready(),
            tasks = self.tasks.len(),
            "Lifecycle: startup complete"
        );
        Ok(())
    }

    /// Cancel every task, wait for each to terminate, then clear readiness and liveness.
    /// Safe to call more than once; later calls return an empty report.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        match self.phase {
            Phase::Stopped => {
                debug!(app_name = %self.name, "Lifecycle: already shut down");
                return ShutdownReport::default();
            }
            Phase::Created => {
                self.phase = Phase::Stopped;
                self.shutdown_token.cancel();
                return ShutdownReport::default();
            }
            Phase::Running => {}
        }
        self.phase = Phase::Stopped;
        self.shutdown_token.cancel();

        let clock = Instant::now();
        let tasks = std::mem::take(&mut self.tasks);
        for task in &tasks {
            task.cancel();
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in tasks {
            let name = task.name().to_string();
            let outcome = task.join(self.options.task_shutdown_timeout).await;
            match &outcome {
                TaskOutcome::Failed(reason) => warn!(
                    event = "task_failed",
                    app_name = %self.name,
                    task = %name,
                    error = %reason,
                    result = outcome.as_str(),
                    "Lifecycle: task failed during shutdown"
                ),
                _ => info!(task = %name, result = outcome.as_str(), "Lifecycle: task stopped"),
            }
            outcomes.push((name, outcome));
        }

        // Readiness must drop before liveness
        if self.state.set_ready(false) {
            emit_flag(self.sink.as_ref(), &self.names.ready, false);
        }
        if self.state.set_up(false) {
            emit_flag(self.sink.as_ref(), &self.names.up, false);
        }

        let report = ShutdownReport {
            outcomes,
            elapsed: clock.elapsed(),
        };
        if report.is_clean() {
            info!(
                event = "service_shutdown",
                app_name = %self.name,
                clean = true,
                total_duration_secs = report.elapsed.as_secs_f64(),
                "Lifecycle: shutdown complete"
            );
        } else {
            warn!(
                event = "service_shutdown",
                app_name = %self.name,
                clean = false,
                total_duration_secs = report.elapsed.as_secs_f64(),
                "Lifecycle: shutdown complete with failures"
            );
        }
        report
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.cancel();
        }
    }
}
