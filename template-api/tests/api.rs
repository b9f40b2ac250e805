use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use assert_json_diff::assert_json_eq;
use common_metrics::PrometheusSink;
use envconfig::Envconfig;
use lifecycle::{ShutdownReport, TaskOutcome};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use template_api::app_context::AppContext;
use template_api::config::Config;
use template_api::heartbeat::HEARTBEAT_TASK;
use template_api::server::serve;

struct ServerHandle {
    addr: SocketAddr,
    context: Arc<AppContext>,
    server: JoinHandle<eyre::Result<ShutdownReport>>,
    shutdown: CancellationToken,
}

impl ServerHandle {
    async fn start(env: &[(&str, &str)]) -> ServerHandle {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Config::init_from_hashmap(&env).unwrap();
        let sink = PrometheusSink::new().unwrap();
        let context = Arc::new(AppContext::new(config, Arc::new(sink)));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let manager = context.manager(false);
        let shutdown = manager.shutdown_token();

        let server = tokio::spawn(serve(context.clone(), listener, manager));
        ServerHandle {
            addr,
            context,
            server,
            shutdown,
        }
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("http://{}{}", self.addr, path))
            .send()
            .await
            .expect("failed to send request")
    }

    async fn stop(self) -> ShutdownReport {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(10), self.server)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap()
    }
}

#[tokio::test]
async fn serves_probes_and_metrics_then_shuts_down_cleanly() {
    let server = ServerHandle::start(&[("APP_NAME", "e2e"), ("METRICS_NAMESPACE", "e2e")]).await;

    let res = server.get("/health").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_json_eq!(res.json::<Value>().await.unwrap(), json!({"status": "ok"}));

    let res = server.get("/ready").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_json_eq!(res.json::<Value>().await.unwrap(), json!({"status": "ready"}));

    let res = server.get("/metrics").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.text().await.unwrap();
    assert!(body.contains("e2e_up 1"), "{body}");
    assert!(body.contains("e2e_ready 1"), "{body}");
    assert!(body.contains("e2e_heartbeat_total{task=\"heartbeat\"}"), "{body}");
    assert!(body.contains("e2e_build_info{app_name=\"e2e\""), "{body}");

    let state = server.context.state.clone();
    let report = server.stop().await;

    assert!(report.is_clean());
    assert_eq!(report.outcome(HEARTBEAT_TASK), Some(&TaskOutcome::Cancelled));
    assert!(!state.is_ready());
    assert!(!state.is_up());
}

#[tokio::test]
async fn unreachable_database_leaves_service_live_but_not_ready() {
    // Bind then drop to get a port nothing listens on
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port().to_string()
    };
    let server = ServerHandle::start(&[
        ("DB_HOST", "127.0.0.1"),
        ("DB_PORT", port.as_str()),
        ("DEPENDENCY_CHECK_ENABLED", "true"),
        ("DEPENDENCY_CHECK_TIMEOUT_MS", "200"),
    ])
    .await;

    assert_eq!(server.get("/health").await.status(), StatusCode::OK);

    let res = server.get("/ready").await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_json_eq!(
        res.json::<Value>().await.unwrap(),
        json!({"status": "not_ready"})
    );

    let body = server.get("/metrics").await.text().await.unwrap();
    assert!(body.contains("template_api_up 1"), "{body}");
    assert!(body.contains("template_api_ready 0"), "{body}");

    let report = server.stop().await;
    assert!(report.is_clean());
}
