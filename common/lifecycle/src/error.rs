//! Lifecycle error types.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`Manager`](crate::Manager) operations and dependency checks.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// [`Manager::startup`](crate::Manager::startup) was called more than once.
    #[error("lifecycle manager already started")]
    AlreadyStarted,

    /// A dependency check failed; the process stays up but not ready.
    #[error("dependency '{check}' unavailable: {reason}")]
    DependencyUnavailable { check: String, reason: String },

    /// A background task terminated abnormally (panic) while being joined.
    #[error("background task '{tag}' failed: {reason}")]
    TaskFailed { tag: String, reason: String },

    /// Bounded shutdown wait elapsed with tasks still running; they were aborted.
    #[error("shutdown timed out after {elapsed:?}, tasks abandoned: {remaining:?}")]
    ShutdownTimeout {
        elapsed: Duration,
        remaining: Vec<String>,
    },
}

/// Error returned by one iteration of a [`Work`](crate::Work) unit.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct WorkError(pub String);

impl WorkError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
