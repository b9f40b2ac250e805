//! Service lifecycle: liveness/readiness state, startup sequencing with dependency
//! checks, cancellable periodic background tasks, signal trapping and ordered graceful
//! shutdown. State changes are mirrored to a [`MetricsSink`](common_metrics::MetricsSink)
//! as `<ns>_up`, `<ns>_ready`, `<ns>_heartbeat_total` and `<ns>_build_info`.

mod checks;
mod error;
mod liveness;
mod manager;
mod metrics;
mod readiness;
mod signals;
mod state;
mod task;

pub use checks::{AlwaysReady, DependencyCheck, TcpCheck};
pub use error::{LifecycleError, WorkError};
pub use liveness::{LivenessHandler, LivenessStatus};
pub use manager::{Manager, ManagerBuilder, ManagerOptions, ShutdownReport};
pub use metrics::{MetricNames, DEFAULT_NAMESPACE, TASK_LABEL};
pub use readiness::{ReadinessHandler, ReadinessStatus};
pub use state::ServiceState;
pub use task::{BackgroundTask, TaskOutcome, TaskSpec, Work};
