use common_metrics::{MetricKind, MetricsSink};

pub const DEFAULT_NAMESPACE: &str = "template_api";

/// Label carrying the task name on the heartbeat counter.
pub const TASK_LABEL: &str = "task";

/// Names of the lifecycle series, all sharing one namespace prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricNames {
    pub up: String,
    pub ready: String,
    pub heartbeat_total: String,
    pub build_info: String,
}

impl MetricNames {
    pub fn with_namespace(namespace: &str) -> Self {
        Self {
            up: format!("{namespace}_up"),
            ready: format!("{namespace}_ready"),
            heartbeat_total: format!("{namespace}_heartbeat_total"),
            build_info: format!("{namespace}_build_info"),
        }
    }

    pub(crate) fn describe(&self, sink: &dyn MetricsSink) {
        sink.describe(MetricKind::Gauge, &self.up, "Service up (1), down (0)");
        sink.describe(
            MetricKind::Gauge,
            &self.ready,
            "Readiness (1=ready, 0=not ready)",
        );
        sink.describe(
            MetricKind::Counter,
            &self.heartbeat_total,
            "Background heartbeat iterations",
        );
        sink.describe(
            MetricKind::Gauge,
            &self.build_info,
            "Build/version info for the running service",
        );
    }
}

impl Default for MetricNames {
    fn default() -> Self {
        Self::with_namespace(DEFAULT_NAMESPACE)
    }
}

pub(crate) fn task_labels(task: &str) -> Vec<(String, String)> {
    vec![(TASK_LABEL.to_string(), task.to_string())]
}

pub(crate) fn emit_flag(sink: &dyn MetricsSink, name: &str, value: bool) {
    sink.set_gauge(name, if value { 1.0 } else { 0.0 });
}
