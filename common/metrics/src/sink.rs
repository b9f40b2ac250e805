use std::sync::Arc;

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusRecorder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to build prometheus recorder: {0}")]
    Build(#[from] BuildError),
    #[error("a global metrics recorder is already installed")]
    AlreadyInstalled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// Process-wide named gauges and counters, plus a pull-based text rendering of them.
///
/// Labels follow the `&[(String, String)]` shape used across the crate. Implementations
/// must tolerate concurrent writers and readers: gauges are updated by the lifecycle
/// while `/metrics` renders.
pub trait MetricsSink: Send + Sync {
    fn set_gauge(&self, name: &str, value: f64);

    fn increment_counter(&self, name: &str, labels: &[(String, String)]);

    /// Create the counter at zero so it renders before its first increment.
    fn register_counter(&self, name: &str, labels: &[(String, String)]);

    /// Info series: a gauge fixed at 1 whose labels carry the payload.
    fn set_info(&self, name: &str, labels: &[(String, String)]);

    fn describe(&self, _kind: MetricKind, _name: &str, _help: &str) {}

    fn render(&self) -> String;
}

/// Discards everything; renders nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn set_gauge(&self, _name: &str, _value: f64) {}

    fn increment_counter(&self, _name: &str, _labels: &[(String, String)]) {}

    fn register_counter(&self, _name: &str, _labels: &[(String, String)]) {}

    fn set_info(&self, _name: &str, _labels: &[(String, String)]) {}

    fn render(&self) -> String {
        String::new()
    }
}

const EXPONENTIAL_SECONDS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// [`MetricsSink`] backed by a prometheus recorder. Each sink owns its recorder, so
/// several can live in one process (tests); [`PrometheusSink::install`] additionally
/// routes the global `metrics` macros into it.
#[derive(Clone)]
pub struct PrometheusSink {
    recorder: Arc<PrometheusRecorder>,
}

impl PrometheusSink {
    pub fn new() -> Result<Self, MetricsError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full("http_requests_duration_seconds".to_string()),
                EXPONENTIAL_SECONDS,
            )?
            .build_recorder();

        Ok(Self {
            recorder: Arc::new(recorder),
        })
    }

    /// Build a sink and install it as the global recorder, so that `metrics::counter!`
    /// and friends (e.g. the HTTP middleware) render alongside the sink's own series.
    /// Can only succeed once per process.
    pub fn install() -> Result<Self, MetricsError> {
        let sink = Self::new()?;
        metrics::set_global_recorder(SharedRecorder(sink.recorder.clone()))
            .map_err(|_| MetricsError::AlreadyInstalled)?;
        Ok(sink)
    }

    fn with_recorder<T>(&self, f: impl FnOnce() -> T) -> T {
        metrics::with_local_recorder(self.recorder.as_ref(), f)
    }
}

impl MetricsSink for PrometheusSink {
    fn set_gauge(&self, name: &str, value: f64) {
        self.with_recorder(|| metrics::gauge!(name.to_owned()).set(value));
    }

    fn increment_counter(&self, name: &str, labels: &[(String, String)]) {
        self.with_recorder(|| metrics::counter!(name.to_owned(), labels).increment(1));
    }

    fn register_counter(&self, name: &str, labels: &[(String, String)]) {
        self.with_recorder(|| metrics::counter!(name.to_owned(), labels).increment(0));
    }

    fn set_info(&self, name: &str, labels: &[(String, String)]) {
        self.with_recorder(|| metrics::gauge!(name.to_owned(), labels).set(1.0));
    }

    fn describe(&self, kind: MetricKind, name: &str, help: &str) {
        let (name, help) = (name.to_owned(), help.to_owned());
        self.with_recorder(|| match kind {
            MetricKind::Counter => metrics::describe_counter!(name, help),
            MetricKind::Gauge => metrics::describe_gauge!(name, help),
        });
    }

    fn render(&self) -> String {
        self.recorder.handle().render()
    }
}

/// Lets the global recorder and a [`PrometheusSink`] share one prometheus registry.
struct SharedRecorder(Arc<PrometheusRecorder>);

impl Recorder for SharedRecorder {
    fn describe_counter(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        self.0.describe_counter(key, unit, description)
    }

    fn describe_gauge(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        self.0.describe_gauge(key, unit, description)
    }

    fn describe_histogram(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        self.0.describe_histogram(key, unit, description)
    }

    fn register_counter(&self, key: &Key, metadata: &Metadata<'_>) -> Counter {
        self.0.register_counter(key, metadata)
    }

    fn register_gauge(&self, key: &Key, metadata: &Metadata<'_>) -> Gauge {
        self.0.register_gauge(key, metadata)
    }

    fn register_histogram(&self, key: &Key, metadata: &Metadata<'_>) -> Histogram {
        self.0.register_histogram(key, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_gauges_counters_and_info() {
        let sink = PrometheusSink::new().unwrap();
        sink.set_gauge("svc_up", 1.0);
        sink.set_gauge("svc_ready", 0.0);
        sink.increment_counter("svc_heartbeat_total", &labels(&[("task", "heartbeat")]));
        sink.increment_counter("svc_heartbeat_total", &labels(&[("task", "heartbeat")]));
        sink.set_info(
            "svc_build_info",
            &labels(&[("app_name", "svc"), ("version", "1.2.3")]),
        );

        let body = sink.render();
        assert!(body.contains("svc_up 1"), "{body}");
        assert!(body.contains("svc_ready 0"), "{body}");
        assert!(body.contains("svc_heartbeat_total{task=\"heartbeat\"} 2"), "{body}");
        assert!(body.contains("svc_build_info{app_name=\"svc\",version=\"1.2.3\"} 1"), "{body}");
    }

    #[test]
    fn registered_counter_renders_at_zero() {
        let sink = PrometheusSink::new().unwrap();
        sink.register_counter("svc_heartbeat_total", &labels(&[("task", "t")]));

        let body = sink.render();
        assert!(body.contains("svc_heartbeat_total{task=\"t\"} 0"), "{body}");
    }

    #[test]
    fn describe_adds_help_text() {
        let sink = PrometheusSink::new().unwrap();
        sink.describe(MetricKind::Gauge, "svc_up", "Service up (1), down (0)");
        sink.set_gauge("svc_up", 1.0);

        let body = sink.render();
        assert!(body.contains("# HELP svc_up Service up (1), down (0)"), "{body}");
        assert!(body.contains("# TYPE svc_up gauge"), "{body}");
    }

    #[test]
    fn sinks_do_not_share_state() {
        let a = PrometheusSink::new().unwrap();
        let b = PrometheusSink::new().unwrap();
        a.set_gauge("only_in_a", 1.0);

        assert!(a.render().contains("only_in_a"));
        assert!(!b.render().contains("only_in_a"));
    }
}
