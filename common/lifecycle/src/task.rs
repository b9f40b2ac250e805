//! Cancellable periodic background tasks.

use std::fmt;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common_metrics::MetricsSink;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::WorkError;
use crate::metrics::task_labels;

/// One repeating unit of work. Return `ControlFlow::Break(())` to finish the task after
/// this iteration; errors are logged and the task keeps going.
#[async_trait]
pub trait Work: Send + Sync {
    async fn run(&self) -> Result<ControlFlow<()>, WorkError>;
}

#[async_trait]
impl<F, Fut> Work for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<ControlFlow<()>, WorkError>> + Send + 'static,
{
    async fn run(&self) -> Result<ControlFlow<()>, WorkError> {
        (self)().await
    }
}

/// How a background task terminated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Observed its cancellation token; the normal shutdown path.
    Cancelled,
    /// The work reported it was finished.
    Completed,
    /// Panicked.
    Failed(String),
    /// Did not terminate within the shutdown timeout and was aborted.
    Abandoned,
}

impl TaskOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, TaskOutcome::Cancelled | TaskOutcome::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Cancelled => "cancelled",
            TaskOutcome::Completed => "completed",
            TaskOutcome::Failed(_) => "failed",
            TaskOutcome::Abandoned => "abandoned",
        }
    }
}

/// A periodic job declared on the manager, launched at startup.
#[derive(Clone)]
pub struct TaskSpec {
    pub name: String,
    pub interval: Duration,
    pub work: Arc<dyn Work>,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, interval: Duration, work: impl Work + 'static) -> Self {
        Self {
            name: name.into(),
            interval,
            work: Arc::new(work),
        }
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// A running periodic task and the token used to stop it.
pub struct BackgroundTask {
    name: String,
    app_name: String,
    interval: Duration,
    token: CancellationToken,
    // Set before an abort so an in-flight iteration cannot record after shutdown
    abandoned: CancellationToken,
    handle: JoinHandle<TaskOutcome>,
}

impl BackgroundTask {
    /// Spawn `spec` on the runtime with a fresh cancellation token. Each completed
    /// iteration increments `counter` labelled with the task name; the counter is
    /// registered at zero before the first iteration. `app_name` tags the task's logs.
    pub fn spawn(
        spec: &TaskSpec,
        sink: Arc<dyn MetricsSink>,
        counter: &str,
        app_name: &str,
    ) -> Self {
        let token = CancellationToken::new();
        let abandoned = CancellationToken::new();
        let labels = task_labels(&spec.name);
        sink.register_counter(counter, &labels);

        let handle = tokio::spawn(run_periodic(
            Periodic {
                name: spec.name.clone(),
                app_name: app_name.to_string(),
                interval: spec.interval,
                token: token.clone(),
                abandoned: abandoned.clone(),
                counter: counter.to_string(),
                labels,
            },
            spec.work.clone(),
            sink,
        ));

        Self {
            name: spec.name.clone(),
            app_name: app_name.to_string(),
            interval: spec.interval,
            token,
            abandoned,
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to terminate. With a timeout, a task still running when it
    /// elapses is aborted and reported as [`TaskOutcome::Abandoned`].
    pub async fn join(self, timeout: Option<Duration>) -> TaskOutcome {
        let mut handle = self.handle;
        let joined = match timeout {
            None => (&mut handle).await,
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    self.abandoned.cancel();
                    handle.abort();
                    warn!(
                        event = "task_abandoned",
                        app_name = %self.app_name,
                        task = %self.name,
                        timeout_secs = limit.as_secs_f64(),
                        "Lifecycle: task ignored cancellation, abandoning it"
                    );
                    return TaskOutcome::Abandoned;
                }
            },
        };

        match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => TaskOutcome::Cancelled,
            Err(e) => TaskOutcome::Failed(e.to_string()),
        }
    }
}

struct Periodic {
    name: String,
    app_name: String,
    interval: Duration,
    token: CancellationToken,
    abandoned: CancellationToken,
    counter: String,
    labels: Vec<(String, String)>,
}

async fn run_periodic(
    task: Periodic,
    work: Arc<dyn Work>,
    sink: Arc<dyn MetricsSink>,
) -> TaskOutcome {
    let name = &task.name;

    loop {
        if task.token.is_cancelled() {
            debug!(task = %name, "Lifecycle: task observed cancellation");
            return TaskOutcome::Cancelled;
        }

        let result = work.run().await;
        if task.abandoned.is_cancelled() {
            return TaskOutcome::Abandoned;
        }

        match result {
            Ok(ControlFlow::Continue(())) => sink.increment_counter(&task.counter, &task.labels),
            Ok(ControlFlow::Break(())) => {
                sink.increment_counter(&task.counter, &task.labels);
                debug!(task = %name, "Lifecycle: task completed its work");
                return TaskOutcome::Completed;
            }
            Err(e) => warn!(
                event = "task_iteration_failed",
                app_name = %task.app_name,
                task = %name,
                error = %e,
                "Lifecycle: task iteration failed"
            ),
        }

        tokio::select! {
            biased;

            _ = task.token.cancelled() => {
                debug!(task = %name, "Lifecycle: task cancelled while waiting");
                return TaskOutcome::Cancelled;
            }
            _ = tokio::time::sleep(task.interval) => {}
        }
    }
}
