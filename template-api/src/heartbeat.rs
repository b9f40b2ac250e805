use std::ops::ControlFlow;

use async_trait::async_trait;
use lifecycle::{Work, WorkError};
use tracing::info;

pub const HEARTBEAT_TASK: &str = "heartbeat";

/// Example periodic job: logs a heartbeat on every run. Replace the body with real work.
pub struct Heartbeat {
    app_name: String,
}

impl Heartbeat {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

#[async_trait]
impl Work for Heartbeat {
    async fn run(&self) -> Result<ControlFlow<()>, WorkError> {
        info!(event = "heartbeat", app_name = %self.app_name, "heartbeat");
        Ok(ControlFlow::Continue(()))
    }
}
